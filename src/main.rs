mod and_filter;
mod catalog;
mod cli;
mod dataset_id;
mod error;
mod esgf;
mod export;
mod facet;
mod finder;
mod latest;
mod path;
mod period;
mod reconcile;
mod settings;
mod stats;
mod vocabulary;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands, CommonArgs};
use facet::FacetConstraints;
use settings::Settings;
use tracing_subscriber::EnvFilter;
use vocabulary::Vocabularies;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(());
        }
    };
    init_logging(&cli, &settings);

    let result = match &cli.command {
        Commands::InitCatalog => command::init_catalog(&settings)
            .map(|path| format!("Catalog initialised at `{}`", path)),
        Commands::Cmip5(args) => run_search(&cli, args.constraints(), &args.common, &settings).await,
        Commands::Cmip6(args) => run_search(&cli, args.constraints(), &args.common, &settings).await,
    };

    match result {
        Ok(output) => print!("{}", terminated(output)),
        Err(e) => eprintln!("Error: {}", e),
    }

    Ok(())
}

async fn run_search(
    cli: &Cli,
    constraints: error::Result<FacetConstraints>,
    args: &CommonArgs,
    settings: &Settings,
) -> Result<String> {
    let constraints = constraints?;
    let vocabularies = Vocabularies::load()?;

    command::search(cli.flow.flow(), &constraints, args, settings, &vocabularies).await
}

/// `RUST_LOG` wins, then `--debug`, then the configured level.
fn init_logging(cli: &Cli, settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cli.debug { "debug" } else { settings.log.level.as_str() };
        EnvFilter::new(format!("cmipfind={level}"))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn terminated(mut output: String) -> String {
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output
}

// -- Tests -------------------------------------------------------------------
