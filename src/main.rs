use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use tooltip_harvest::config::AppConfig;
use tooltip_harvest::pipeline::Pipeline;
use tooltip_harvest::sink::CsvSink;
use tooltip_harvest::surface::chrome::ChromeSurface;
use tooltip_harvest::utils::{self, Timer};

#[derive(Parser)]
#[command(
    name = "tooltip-harvest",
    about = "Harvest chart and table data through their tooltips",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Run a harvest job and write its records as CSV
    Harvest {
        /// Job file (TOML)
        #[arg(short, long, env = "HARVEST_JOB")]
        job: PathBuf,

        /// Output CSV path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a job file and print the effective configuration
    Check {
        #[arg(short, long, env = "HARVEST_JOB")]
        job: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "tooltip_harvest=info,warn",
        1 => "tooltip_harvest=debug,info",
        _ => "trace",
    };

    // stdout may carry the CSV, so logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Command::Harvest { job, output } => {
            let config = AppConfig::load(&job)?;
            let _t = Timer::start(format!("harvest of {:?}", job));

            let surface = ChromeSurface::launch(&config.browser)?;
            let mut sink = CsvSink::new(utils::output_writer(output.as_deref())?);
            let stats = Pipeline::new(config).run(surface, &mut sink).await?;
            sink.into_inner()?.flush()?;

            info!(
                "Done: {} records ({}) after {} attempt(s)",
                stats.records, stats.kind, stats.attempts
            );
        }

        Command::Check { job } => {
            let config = AppConfig::load(&job)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            eprintln!("{:?}: {} job is valid", job, config.job.plan.kind());
        }
    }

    Ok(())
}
