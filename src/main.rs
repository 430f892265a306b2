//! Headless CLI for the omnic watch-reward tracker.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use omnic::checker::PageChecker;
use omnic::history::{HistoryLog, RecordKeeper};
use omnic::tracker::Controller;
use omnic::viewer::SentinelViewer;
use omnic::{http, Lane, Settings, TrackerEvent, TrackerHandle};

/// Seconds to wait before retrying automatically after a severe failure.
const RECOVERY_DELAY_SECS: u64 = 60;

/// Omnic: headless esports watch-reward tracker.
#[derive(Parser)]
#[command(name = "omnic", version, about)]
struct Cli {
    /// Path to the JSON settings file (defaults to the user config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the watch-history CSV file.
    #[arg(long)]
    history: Option<PathBuf>,

    /// Also write logs to this file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (overrides RUST_LOG).
    #[arg(short, long)]
    verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Poll for live broadcasts and accrue rewards (default).
    Run,

    /// Check the enabled lanes once and print the result.
    Check,

    /// Print per-lane minute totals from the watch history.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    let settings_path = cli
        .config
        .clone()
        .or_else(Settings::default_path)
        .ok_or_else(|| anyhow::anyhow!("cannot determine a settings path; pass --config"))?;
    let history_path = cli
        .history
        .clone()
        .or_else(default_history_path)
        .ok_or_else(|| anyhow::anyhow!("cannot determine a history path; pass --history"))?;

    let settings = Settings::load(&settings_path)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_tracker(settings, &settings_path, history_path).await,
        Command::Check => run_check(settings).await,
        Command::Stats => run_stats(settings, history_path),
    }
}

/// Poll-and-watch main loop.
async fn run_tracker(
    settings: Settings,
    settings_path: &Path,
    history_path: PathBuf,
) -> anyhow::Result<()> {
    if !settings.has_account() {
        anyhow::bail!(
            "no account configured; set \"account\" in {}",
            settings_path.display()
        );
    }
    println!("omnic v{}", env!("CARGO_PKG_VERSION"));

    let client = http::build_client()?;
    let provider = Arc::new(PageChecker::new(client.clone()));
    let pinger = Arc::new(SentinelViewer::new(client));

    let (controller, handle, events) = Controller::new(&settings, provider, pinger);
    let tracker = tokio::spawn(controller.run());

    // Ctrl+C drains outstanding progress before stopping.
    let exit_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down");
            exit_handle.prepare_to_exit(true);
        }
    });

    let keeper = RecordKeeper::new(HistoryLog::new(history_path), settings.account.clone());
    consume_events(events, keeper, handle).await;

    tracker.await?;
    Ok(())
}

/// Render tracker events as log lines and keep the history log current.
async fn consume_events(
    mut events: mpsc::UnboundedReceiver<TrackerEvent>,
    mut keeper: RecordKeeper,
    handle: TrackerHandle,
) {
    while let Some(event) = events.recv().await {
        keeper.observe(&event);
        match event {
            TrackerEvent::IdleProgress { minutes_remaining } => {
                if minutes_remaining > 0 {
                    info!("not live, next check in {minutes_remaining} min");
                }
            }
            TrackerEvent::Checking => info!("checking for live broadcasts"),
            TrackerEvent::Watching {
                lane,
                minutes_watched,
                title,
                ended,
            } => {
                if ended {
                    info!("watched {minutes_watched} min of {lane} - {title}");
                } else {
                    info!("watching {lane} for {minutes_watched} min - {title}");
                }
            }
            TrackerEvent::FalseTracking { lane } => {
                warn!("{lane} tracked for 0 minutes, ignoring session");
            }
            TrackerEvent::Error { message, severe } => {
                if severe {
                    warn!("{message}; retrying in {RECOVERY_DELAY_SECS}s");
                    let recover = handle.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_secs(RECOVERY_DELAY_SECS)).await;
                        recover.force_check();
                    });
                } else {
                    warn!("{message}");
                }
            }
        }
    }
    // Channel closed: the tracker stopped. Write what we know.
    keeper.flush();
}

/// One-shot live-check of the enabled lanes.
async fn run_check(settings: Settings) -> anyhow::Result<()> {
    use omnic::checker::LiveStatusProvider;

    let checker = PageChecker::new(http::build_client()?);
    for lane in Lane::ALL {
        if !settings.lane_enabled(lane) {
            println!("{lane}: disabled");
            continue;
        }
        match checker.check_live(lane).await {
            Ok(Some(session)) => println!("{lane}: LIVE - {}", session.title),
            Ok(None) => println!("{lane}: not live"),
            Err(err) => println!("{lane}: check failed - {err}"),
        }
    }
    Ok(())
}

/// Print history totals for the configured account.
fn run_stats(settings: Settings, history_path: PathBuf) -> anyhow::Result<()> {
    let log = HistoryLog::new(history_path);
    let (league, contenders) = log.summarize(&settings.account, chrono::Local::now())?;

    println!("history for account {}", settings.account);
    for (name, stats) in [("league", league), ("contenders", contenders)] {
        println!(
            "  {name:<11} last 24h: {:>5} min   last 7d: {:>5} min   this month: {:>5} min",
            stats.last_day, stats.last_week, stats.this_month
        );
    }
    Ok(())
}

/// Default history location next to the settings file.
fn default_history_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("omnic").join("history.csv"))
}

/// Initialize stdout logging plus the optional log file.
///
/// Returns the appender guard that must stay alive for the file writer to
/// flush.
fn init_logging(
    verbose: bool,
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let default_filter = if verbose { "omnic=debug" } else { "omnic=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stdout_layer = tracing_subscriber::fmt::layer();
    let registry = tracing_subscriber::registry().with(filter).with(stdout_layer);

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}
