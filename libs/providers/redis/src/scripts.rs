//! The five named server-side scripts this provider relies on, compiled
//! once at provider configure time and held for the provider's lifetime.
//! Embedded at build time rather than loaded from a runtime-configurable
//! `lua_path`, per the "global script/path constants" redesign note.

use redis::Script;

pub struct ScriptCatalog {
    pub pop_and_lock: Script,
    pub confirm: Script,
    pub keep_alive: Script,
    pub get_orphan: Script,
    pub get_by_fuzzy_key: Script,
}

impl ScriptCatalog {
    pub fn load() -> Self {
        Self {
            pop_and_lock: Script::new(include_str!("../lua/popAndLock.lua")),
            confirm: Script::new(include_str!("../lua/confirm.lua")),
            keep_alive: Script::new(include_str!("../lua/keepAlive.lua")),
            get_orphan: Script::new(include_str!("../lua/getOrphan.lua")),
            get_by_fuzzy_key: Script::new(include_str!("../lua/getByFuzzyKey.lua")),
        }
    }
}

impl Default for ScriptCatalog {
    fn default() -> Self {
        Self::load()
    }
}
