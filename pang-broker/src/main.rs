//! Pang Broker - Main entry point.

use anyhow::Result;
use pang_common::config::Config;
use pang_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_with_env()?;

    // Initialize logging
    init_logging(&config.observability.log_level, &config.observability.log_format);

    tracing::info!("Pang Broker v{}", env!("CARGO_PKG_VERSION"));

    pang_broker::start_server(&config).await
}
