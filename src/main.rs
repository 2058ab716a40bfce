use anyhow::Context;
use clap::{Parser, Subcommand};
use quicksnap::capture::{DisplaySource, NativeScreen};
use quicksnap::config::AppConfig;
use quicksnap::orchestrator::{CaptureMode, CaptureRequest, CaptureResult};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quicksnap", version, about = "Full-screen captures saved as timestamped PNGs")]
struct Cli {
    /// Config file (defaults to <config dir>/quicksnap/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a screenshot now
    Capture {
        /// Save here instead of the configured directory
        #[arg(long)]
        dir: Option<PathBuf>,

        /// One file per display
        #[arg(long)]
        all_displays: bool,
    },
    /// Probe permissions and print the status snapshot
    Status,
    /// List capturable displays
    Displays,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    quicksnap::init_tracing("quicksnap=info");

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    match cli.command {
        Commands::Capture { dir, all_displays } => {
            let coordinator = quicksnap::build_coordinator(&config);
            let request = CaptureRequest {
                preferred_dir: dir,
                mode: all_displays.then_some(CaptureMode::AllDisplays),
            };

            let result = coordinator.capture_with(request).await;
            coordinator.flush_notifications().await;

            match result {
                CaptureResult::Success { paths } => {
                    for path in paths {
                        println!("{}", path.display());
                    }
                }
                CaptureResult::Cancelled => anyhow::bail!("capture cancelled"),
                CaptureResult::Failed { stage, kind, detail } => {
                    let blocking = coordinator.status().blocking_remediation();
                    if let Some(url) = blocking.and_then(|r| r.target.settings_url()) {
                        eprintln!("Open {} to grant access", url);
                    }
                    anyhow::bail!("{} during {:?}: {}", kind.code(), stage, detail);
                }
            }
        }
        Commands::Status => {
            let coordinator = quicksnap::build_coordinator(&config);
            coordinator
                .recheck()
                .await
                .context("failed to probe permissions")?;
            println!("{}", serde_json::to_string_pretty(&coordinator.status())?);
        }
        Commands::Displays => {
            let displays = NativeScreen.list().await?;
            println!("{}", serde_json::to_string_pretty(&displays)?);
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
