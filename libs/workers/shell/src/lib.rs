//! CLI-exec worker: a thin side-effect shell that runs a job's params as a
//! child process. Out of scope for deep engineering per the system's
//! design — kept minimal, just enough to drive the redis happy-path
//! end-to-end scenario.

pub mod error;
pub mod params;
pub mod worker;

pub use error::ShellWorkerError;
pub use params::ShellParams;
pub use worker::ShellWorker;
