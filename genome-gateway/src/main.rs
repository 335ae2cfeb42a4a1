//! GenomeGPT Gateway - Main entry point.

use anyhow::Result;
use genome_common::config::Config;
use genome_common::config_loader::check_modular_files;
use genome_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_and_validate()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("GenomeGPT Gateway v{}", env!("CARGO_PKG_VERSION"));

    for (file, present) in check_modular_files(None) {
        tracing::debug!(file = %file, present, "Config file");
    }

    genome_gateway::start_server(&config).await
}
