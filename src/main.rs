mod action;
mod browser;
mod category;
mod checkout;
mod config;
mod entry;
mod fetch;
mod gh;
mod logger;
mod session;
mod tui;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Pick a pull request you are involved in, then open it or check it out.
#[derive(Parser, Debug)]
#[command(name = "gh-rr", version = env!("GH_RR_VERSION_STRING"), about)]
struct Cli {
    /// Directory repositories are cloned into (overrides BASE_DIR)
    #[arg(long)]
    base_dir: Option<String>,

    /// Seconds between automatic refreshes
    #[arg(long)]
    refresh_secs: Option<u64>,

    /// Leave the picker when a PR is opened in the browser
    #[arg(long, default_value_t = false)]
    exit_on_open: bool,

    /// Maximum number of PRs fetched per category
    #[arg(long)]
    limit: Option<u32>,

    /// Write logs here instead of the cache directory
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = logger::init(cli.log_file.as_deref())?;
    log::info!("gh-rr {} starting", env!("GH_RR_VERSION_STRING"));

    let cfg = config::load_config();
    let home = dirs::home_dir();
    let base_dir = config::resolve_base_dir(
        cli.base_dir.as_deref(),
        std::env::var("BASE_DIR").ok().as_deref(),
        &cfg,
        home.as_deref(),
    );
    let interval = config::refresh_interval(cli.refresh_secs, &cfg);
    let exit_on_open = cli.exit_on_open || cfg.exit_on_open.unwrap_or(false);
    log::info!(
        "base dir {}, refresh every {:?}, exit on open {}",
        base_dir.display(),
        interval,
        exit_on_open
    );

    let session = session::Session::new(category::default_categories(), interval, Instant::now())?
        .with_exit_on_open(exit_on_open);
    let searcher: Arc<dyn gh::PrSearch> = Arc::new(gh::GhCli::new(cli.limit.or(cfg.limit)));

    let session = match tui::run(session, searcher, tui::Theme::default()) {
        Ok(session) => session,
        Err(err) => {
            log::error!("{:#}", err);
            eprintln!("See {} for details.", log_path.display());
            return Err(err);
        }
    };

    let action = action::resolve(&session);
    action::perform(action, &action::SystemHandoff::new(base_dir))
}
