use clap::Parser;
use color_eyre::{
    eyre::WrapErr,
    Result,
};
use ingester_config::Config;
use prom_parquet_ingester::{
    init_errors,
    init_logging,
    Args,
};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    init_errors()?;
    let args = Args::parse();
    let config = Config::load_with(&args.config, args.overrides())
        .wrap_err_with(|| format!("Failed to load configuration from {}", args.config.display()))?;
    init_logging(config.debug)?;
    debug!(?config, "Loaded configuration");
    prom_parquet_ingester::run(&args, config).await
}
