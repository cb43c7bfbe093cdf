use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use jobtrack_analytics::config::{get_config, Config};
use jobtrack_analytics::display::{status_line, DisplayManager};
use jobtrack_analytics::export::ExportDocument;
use jobtrack_analytics::logging::init_logging;
use jobtrack_analytics::mode::AuthState;
use jobtrack_analytics::models::TimeRange;
use jobtrack_analytics::refresh::{RefreshCoordinator, RefreshSettings};
use jobtrack_analytics::source::{DataSource, InMemorySource, JsonDirSource};

#[derive(Parser)]
#[command(name = "jobtrack-analytics")]
#[command(about = "Analytics aggregation and refresh coordination for the job tracker dashboard")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct SourceArgs {
    /// Directory holding users.json, applications.json, goals.json, events.json
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Time range in days (7, 30, 90 or 365)
    #[arg(long)]
    range: Option<u32>,
    /// Signed-in user id
    #[arg(long, default_value = "operator")]
    user_id: String,
    /// Signed-in user email
    #[arg(long)]
    email: Option<String>,
    /// Compute local analytics only, as if disconnected
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh once and print the report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Refresh once and write an export document
    Export {
        #[command(flatten)]
        source: SourceArgs,
        /// Output file or directory (defaults to the configured export directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Auto-refresh and print every status change until Ctrl+C
    Watch {
        #[command(flatten)]
        source: SourceArgs,
        /// Auto-refresh interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = get_config();
    config.ensure_log_directory()?;
    let _log_guard = init_logging(config);

    match cli.command {
        Commands::Report { source, json } => {
            let coordinator = build_coordinator(config, &source, None)?;
            match coordinator.request_refresh().await {
                Ok(report) => {
                    DisplayManager::new().display_report(&report, &coordinator.status(), json);
                    Ok(())
                }
                Err(e) => handle_error(anyhow!(e), json),
            }
        }
        Commands::Export { source, output } => {
            let coordinator = build_coordinator(config, &source, None)?;
            if let Err(e) = coordinator.request_refresh().await {
                // the document still records the failure in its refresh status
                eprintln!("Warning: refresh failed: {}", e);
            }

            let target = output.unwrap_or_else(|| config.paths.export_directory.clone());
            let document = ExportDocument::capture(&coordinator);
            let path = document.write_to_file(&target, config.output.json_pretty)?;
            println!("Exported analytics to {}", path.display());
            Ok(())
        }
        Commands::Watch { source, interval } => {
            // --interval turns the timer on even when the config leaves it off
            let auto_refresh = match interval {
                Some(secs) => Some(secs),
                None if config.refresh.auto_refresh_enabled => Some(config.refresh.interval_seconds),
                None => None,
            };
            let coordinator = build_coordinator(config, &source, auto_refresh)?;
            watch(coordinator).await
        }
    }
}

/// `auto_refresh` is the timer interval when the coordinator should tick on
/// its own; report and export pass `None` and refresh once.
fn build_coordinator(
    config: &Config,
    args: &SourceArgs,
    auto_refresh: Option<u64>,
) -> Result<RefreshCoordinator> {
    let mut settings = RefreshSettings::from_config(config);
    settings.auto_refresh = auto_refresh.is_some();
    if let Some(secs) = auto_refresh {
        settings.auto_refresh_interval_seconds = secs;
    }
    if let Some(days) = args.range {
        settings.time_range = TimeRange::from_days(days)
            .ok_or_else(|| anyhow!("Unsupported range {}, use 7, 30, 90 or 365", days))?;
    }

    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| config.paths.data_directory.clone());
    let timeout = Duration::from_secs(config.refresh.fetch_timeout_seconds);
    let platform_dir = JsonDirSource::new(data_dir).with_timeout(timeout);
    let data_path = platform_dir.directory().display().to_string();
    let platform: Arc<dyn DataSource> = Arc::new(platform_dir);

    let local_dir = &config.paths.local_data_directory;
    let local: Arc<dyn DataSource> = if local_dir.is_dir() {
        debug!(path = %local_dir.display(), "Using local record directory");
        Arc::new(JsonDirSource::new(local_dir).with_timeout(timeout))
    } else {
        Arc::new(InMemorySource::default())
    };

    let mut auth = AuthState::signed_in(args.user_id.clone(), args.email.clone());
    if args.offline {
        auth = auth.offline();
    }

    info!(
        range = settings.time_range.label(),
        data_dir = %data_path,
        offline = args.offline,
        auto_refresh = settings.auto_refresh,
        "Coordinator ready"
    );
    Ok(RefreshCoordinator::new(platform, local, auth, settings))
}

async fn watch(coordinator: RefreshCoordinator) -> Result<()> {
    let mut changes = coordinator.subscribe();
    let started = coordinator.start().context("Failed to start auto-refresh")?;
    if !started {
        return Err(anyhow!(
            "Auto-refresh is disabled; pass --interval or set JOBTRACK_AUTO_REFRESH=true"
        ));
    }

    let display = DisplayManager::new();
    let interval = coordinator.status().auto_refresh_interval_seconds;
    println!("Watching every {}s, press Ctrl+C to stop", interval);

    // first refresh immediately; later ones come from the timer
    let initial = coordinator.clone();
    tokio::spawn(async move {
        let _ = initial.request_refresh().await;
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                coordinator.shutdown();
                println!("\nStopped watching");
                return Ok(());
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let status = changes.borrow_and_update().clone();
                if status.is_refreshing {
                    println!("{}", status_line(&status));
                } else {
                    display.display_status(&status);
                }
            }
        }
    }
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::json!({ "error": e.to_string() }));
    } else {
        eprintln!("Error: {}", e);
    }
    process::exit(1);
}
