//! Media Symlinker CLI
//!
//! A command-line tool that mirrors torrent and debrid downloads into a
//! catalog-named symlink library.

use clap::Parser;
use media_symlinker::cli::{
    args::{Cli, Commands},
    commands::{catalog, pending, run, status},
};
use media_symlinker::models::config::{load_config, Config};
use media_symlinker::preflight;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;

    // Run the appropriate command
    match cli.command {
        Commands::Run { pass } => {
            pass.apply(&mut config);
            if !cli.skip_preflight {
                run_preflight_checks(&config).await?;
            }
            run::run(&config).await?;
        }

        Commands::Watch { pass, debounce_ms } => {
            pass.apply(&mut config);
            if let Some(ms) = debounce_ms {
                config.watch.debounce_ms = ms;
            }
            if !cli.skip_preflight {
                run_preflight_checks(&config).await?;
            }
            run::watch(&config).await?;
        }

        Commands::Catalog { action } => {
            catalog::execute_catalog(action, &config).await?;
        }

        Commands::Status => {
            status::show_status(&config).await?;
        }

        Commands::Pending { action } => {
            pending::execute_pending(action, &config).await?;
        }

        Commands::Preflight => {
            run_preflight_checks(&config).await?;
        }
    }

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("media_symlinker=debug")
    } else {
        EnvFilter::new("media_symlinker=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

/// Run preflight checks and exit if any required one fails.
async fn run_preflight_checks(config: &Config) -> anyhow::Result<()> {
    use colored::Colorize;

    println!("{}", "Running preflight checks...".bold());
    println!();

    let results = preflight::run_preflight_checks(config).await;
    preflight::print_results(&results);

    println!();

    if !preflight::all_passed(&results) {
        anyhow::bail!("Preflight checks failed. Fix the issues above and try again.");
    }

    Ok(())
}
