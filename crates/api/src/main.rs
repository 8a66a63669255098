//! Fleet Monitor - Main Entry Point

use api::{init_logging, run, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let settings = Settings::load(Some(config_path.as_deref().unwrap_or("fleet-monitor.toml")))?;
    init_logging(&settings.logging)?;

    info!("=== Fleet Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    run(settings).await
}
