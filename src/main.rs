// ghpick entry point.
// Pick any GitHub repository you can access and jump to its ghq clone.

mod app;
mod cache;
mod config;
mod error;
mod external;
mod github;
mod merge;
mod owners;
mod repository;
mod shutdown;
mod sync;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::config::Config;
use crate::error::Result;
use crate::external::{CommandSelector, Ghq};

#[derive(Parser)]
#[command(name = "ghpick")]
#[command(version)]
#[command(about = "Pick any GitHub repository you can access and clone it with ghq")]
#[command(after_long_help = r#"EXAMPLES
    Pick a repository and cd into it:
        $ cd "$(ghpick)"

    Refresh the repository cache first:
        $ ghpick --sync

CONFIGURATION
    ghpick reads ~/.config/ghpick/config.toml and GHPICK_* environment
    variables (e.g. GHPICK_SELECTOR=fzf, GHPICK_STALE_AFTER_SECS=600).
    Without configured [[hosts]], GITHUB_TOKEN or GH_TOKEN authenticates github.com.
"#)]
struct Cli {
    /// Refresh the cache synchronously before selecting
    #[arg(long, visible_alias = "cache")]
    sync: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the repository cache and exit
    Sync,
    /// Remove the repository cache
    Clear,
    /// Print the ranked repository list without selecting
    List,
}

fn init_tracing(verbose: bool) {
    let debug = verbose || std::env::var("GHPICK_DEBUG").is_ok_and(|v| v == "1");
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(if debug { "ghpick=debug" } else { "ghpick=info" }),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<()> {
    let config = Config::load()?;
    let app = App::from_config(&config)?;

    match cli.command {
        Some(Commands::Sync) => {
            app.sync(cancel).await?;
        }
        Some(Commands::Clear) => app.clear()?,
        Some(Commands::List) => {
            for line in app.list(cli.sync, cancel).await? {
                println!("{}", line);
            }
        }
        None => {
            let selector = CommandSelector::detect(config.selector.as_deref())?;
            let path = app.pick(&selector, &Ghq::default(), cli.sync, cancel).await?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    shutdown::install_handler(cancel.clone());

    match run(cli, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_silent_exit() => {
            tracing::debug!("{}", e);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
