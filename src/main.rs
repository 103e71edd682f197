use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::{fs::File, io::BufWriter};
use tokio_util::sync::CancellationToken;
use trialscope::{
    compute_ideal_tier, compute_tier, export::export_csv, import::read_samples_from_path,
    init_logging, Database, SensorRecorder, SettingsStore,
};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// SQLite file holding the readings
    #[arg(long, default_value = "trialscope.sqlite3")]
    db: PathBuf,
    /// JSON settings file; defaults apply when it does not exist
    #[arg(long, default_value = "trialscope.json")]
    settings: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a `timestamp_ms,value` CSV file as one sensor of a trial
    Import {
        #[arg(long)]
        sensor: String,
        /// Trial to record into; a fresh id is generated when omitted
        #[arg(long)]
        trial: Option<String>,
        /// The file has no `timestamp_ms,value` header row
        #[arg(long)]
        no_header: bool,
        file: PathBuf,
    },
    /// Dump a sensor's full-resolution readings as CSV
    Export {
        #[arg(long)]
        trial: String,
        #[arg(long)]
        sensor: String,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the zoom stats of a sensor
    Stats {
        #[arg(long)]
        trial: String,
        #[arg(long)]
        sensor: String,
    },
    /// Show which tier a chart spanning `span_ms` would read
    Tier {
        #[arg(long)]
        trial: String,
        #[arg(long)]
        sensor: String,
        #[arg(long)]
        span_ms: i64,
        #[arg(long, default_value_t = 0)]
        current: i32,
        /// Overrides the configured desired point count
        #[arg(long)]
        points: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let settings = SettingsStore::new(cli.settings.clone())?.settings();
    let db = Database::new(cli.db.clone())?;

    match cli.command {
        Command::Import {
            sensor,
            trial,
            no_header,
            file,
        } => {
            let trial = trial.unwrap_or_else(|| Uuid::new_v4().to_string());
            let samples = read_samples_from_path(&file, !no_header)?;

            let mut recorder = SensorRecorder::new(db, &trial, &sensor, settings.recording)?;
            for (timestamp_ms, value) in samples {
                recorder.record(timestamp_ms, value).await?;
            }
            let stats = recorder.finish().await?;

            println!("trial {trial}");
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Export {
            trial,
            sensor,
            out,
        } => {
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                let _drop = ctrl_c.drop_guard();
                tokio::signal::ctrl_c().await
            });

            let page_size = settings.export_page_size;
            let summary = match out {
                Some(path) => {
                    let file = File::create(&path)
                        .await
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    let mut writer = BufWriter::new(file);
                    export_csv(&db, &trial, &sensor, page_size, &mut writer, &cancel).await?
                }
                None => {
                    let mut writer = BufWriter::new(tokio::io::stdout());
                    export_csv(&db, &trial, &sensor, page_size, &mut writer, &cancel).await?
                }
            };
            if summary.cancelled {
                bail!("export interrupted after {} rows", summary.rows);
            }
        }
        Command::Stats { trial, sensor } => {
            let fallback = i32::try_from(settings.recording.decimation_factor)?;
            let stats = db.zoom_stats_for(&trial, &sensor, fallback).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Tier {
            trial,
            sensor,
            span_ms,
            current,
            points,
        } => {
            let fallback = i32::try_from(settings.recording.decimation_factor)?;
            let stats = db.zoom_stats_for(&trial, &sensor, fallback).await?;
            let desired = points.unwrap_or(settings.chart.desired_point_count);

            let ideal = compute_ideal_tier(desired, &stats, span_ms);
            let tier = compute_tier(current, desired, &stats, span_ms);
            println!("ideal {ideal:.3} -> tier {tier} of {}", stats.tier_count);
        }
    }

    Ok(())
}
