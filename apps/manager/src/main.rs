//! Manager service — entry point.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    manager_service::run().await
}
