use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use tokio::sync::mpsc;

use climb_sync::{
    error::{Error, Result},
    logln, logsl,
    processors::elevation_sync::{SyncEvent, SyncProgress},
    util::{
        config::Settings,
        logging::{self, LogLevel},
    },
    App,
};

/// Total climb of a GPX track, from the file and from the elevation API.
#[derive(Parser, Debug)]
#[command(name = "climb-sync", version)]
struct Cli {
    /// GPX track to analyse
    file: PathBuf,

    /// Settings file (defaults to ./climb-sync.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Only report the climb recorded in the file
    #[arg(long)]
    no_sync: bool,

    /// Print every track point
    #[arg(long)]
    table: bool,

    /// Write the elevation/climb time series as JSON
    #[arg(long, value_name = "PATH")]
    chart: Option<PathBuf>,

    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,

    /// Verbose output for one component only (e.g. Climb, ElevationSync)
    #[arg(long, value_name = "COMPONENT")]
    trace: Vec<String>,

    /// Silence one component
    #[arg(long, value_name = "COMPONENT")]
    mute: Vec<String>,
}

struct Runner;

impl Runner {
    const CC: &'static str = "climb-sync";

    async fn run(cli: Cli) -> Result<ExitCode> {
        let config_path = cli.config.clone().unwrap_or_else(Settings::default_path);
        let settings = Settings::load(&config_path)?;

        let mut app = App::new(settings);
        app.load_gpx_file(&cli.file)?;

        let recorded = app.recorded_climb();
        println!("Climb (file): {:.1} m", recorded.total);

        if !recorded.noisy_steps.is_empty() {
            logln!(
                "{} steps above {} m look like noise (still counted)",
                recorded.noisy_steps.len(),
                app.settings().climb.noise_threshold_m
            );
        }

        let mut code = ExitCode::SUCCESS;

        if cli.no_sync {
            logln!("Elevation sync skipped");
        } else if !app.can_sync() {
            logln!("{}, skipping elevation sync", Error::MissingApiKey);
        } else {
            code = Runner::sync(&mut app).await?;
        }

        if cli.table {
            print!("{}", app.table());
        }

        if let Some(path) = &cli.chart {
            let json = app.chart().to_json().map_err(|e| Error::Io(e.into()))?;
            std::fs::write(path, json)?;

            logln!("Chart data written to {}", path.display());
        }

        Ok(code)
    }

    async fn sync(app: &mut App) -> Result<ExitCode> {
        let interrupt = app.cancel_handle().cancel_when(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        });

        let (tx, mut rx) = mpsc::unbounded_channel();

        let progress = tokio::spawn(async move {
            let mut shown = false;

            while let Some(event) = rx.recv().await {
                match event {
                    SyncEvent::Progress(progress) => {
                        Runner::show_progress(&progress);
                        shown = true;
                    }
                    SyncEvent::Finished(_) => break,
                }
            }

            if shown && logging::is_enabled(Runner::CC) {
                println!();
            }
        });

        let report = app.sync_elevations(Some(tx)).await;

        // Ctrl-C after the sync falls back to the default handler
        interrupt.abort();
        let _ = progress.await;

        let report = report?;

        match report.result() {
            Ok(()) => {
                if let Some(gain) = app.service_climb() {
                    println!("Climb (API): {:.1} m", gain.total);
                }

                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("{}", Error::Sync(e));
                Ok(ExitCode::FAILURE)
            }
        }
    }

    fn show_progress(progress: &SyncProgress) {
        logsl!(
            "Fetched page {}/{} ({}/{} points)",
            progress.pages_sent,
            progress.pages_total,
            progress.points_done,
            progress.points_total
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        logging::set_global_level(LogLevel::VERBOSE);
    }

    if cli.quiet {
        logging::set_global_logging(false);
    }

    for cc in &cli.trace {
        logging::enable_cc(cc, LogLevel::VERBOSE);
    }

    for cc in &cli.mute {
        logging::disable_cc(cc);
    }

    match Runner::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
