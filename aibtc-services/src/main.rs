use std::path::PathBuf;

use aibtc_services::ServiceConfig;
use clap::Parser;
use log::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "aibtc-services", version, about = "aibtcdev auth service")]
pub struct Cli {
    #[clap(long, short = 'c', help = "JSON config file; replaces the flags below when given")]
    config: Option<PathBuf>,
    #[clap(flatten)]
    service: ServiceConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The logger admits everything and `log`'s max level does the filtering,
    // so the level can be narrowed once a config file has been read
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Trace)
        .init()?;
    log::set_max_level(cli.service.log_level().unwrap_or(LevelFilter::Info));

    let config = match &cli.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None => cli.service,
    };
    config.validate()?;
    log::set_max_level(config.log_level()?);

    aibtc_services::serve(config).await?;

    Ok(())
}
