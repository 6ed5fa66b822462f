mod input;
mod results;
mod run;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use igscrape_core::BackendId;
use tracing_subscriber::EnvFilter;

use crate::run::RunOptions;

#[derive(Debug, Parser)]
#[command(name = "igscrape")]
#[command(about = "Scrape profiles and posts listed in a CSV file")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Process every row of the input file and checkpoint results as JSON
    Run {
        /// Input CSV (defaults to `IGSCRAPE_INPUT_PATH`)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output JSON file (defaults to `IGSCRAPE_OUTPUT_PATH`)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Most recent posts to collect per profile (defaults to `IGSCRAPE_POST_LIMIT`)
        #[arg(long)]
        post_limit: Option<usize>,

        /// Print the classified request queue without logging in or writing output
        #[arg(long)]
        dry_run: bool,
    },
    /// Log in and cache sessions without scraping anything
    Login {
        /// Only log in to this backend (`mobile` or `web`)
        #[arg(long)]
        backend: Option<BackendId>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = igscrape_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "configuration loaded");

    match command {
        Commands::Run {
            input,
            output,
            post_limit,
            dry_run,
        } => {
            let options = RunOptions {
                input,
                output,
                post_limit,
                dry_run,
            };
            run::run_scrape(&config, options).await?;
        }
        Commands::Login { backend } => run::run_login(&config, backend).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
