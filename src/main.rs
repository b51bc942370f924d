/// `Logwarden` - Access-log anomaly scoring
///
/// Copyright (C) 2025 The Logwarden Contributors
///
/// This program is free software: you can redistribute it and/or modify
/// it under the terms of the GNU General Public License as published by
/// the Free Software Foundation, either version 3 of the License, or
/// (at your option) any later version.
///
/// This program is distributed in the hope that it will be useful,
/// but WITHOUT ANY WARRANTY; without even the implied warranty of
/// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
/// GNU General Public License for more details.
///
/// You should have received a copy of the GNU General Public License
/// along with this program.  If not, see <https://www.gnu.org/licenses/>.
use anyhow::Context;
use clap::{Parser, ValueEnum};
use logwarden::config::{EngineConfig, ReconstructionMode};
use logwarden::{report, Pipeline};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "logwarden")]
#[command(author = "The Logwarden Contributors")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
#[command(about = "Score an access log against a known-normal baseline and flag anomalous requests", long_about = None)]
struct Args {
    /// Access log of known-normal traffic used for training
    #[arg(value_name = "NORMAL_LOG")]
    normal: PathBuf,

    /// Access log to score
    #[arg(value_name = "CANDIDATE_LOG")]
    candidate: PathBuf,

    /// Z-score threshold for flagging; invalid values fall back to 1.5
    #[arg(long = "threshold-z", env = "ANOMALY_THRESHOLD_Z", value_name = "Z")]
    threshold_z: Option<String>,

    /// JSON config file (defaults to the user config directory)
    #[arg(long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Skip the reconstruction-error model
    #[arg(long)]
    no_autoencoder: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Write results here instead of stdout
    #[arg(short, long, value_name = "OUTPUT_FILE")]
    output: Option<PathBuf>,
}

/// Read a corpus eagerly, replacing invalid UTF-8 rather than failing
fn read_corpus(path: &Path) -> anyhow::Result<Vec<String>> {
    let bytes = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(ToString::to_string)
        .collect())
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG to override (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(
        "Logwarden starting up (version {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let mut config = args
        .config
        .clone()
        .or_else(EngineConfig::config_path)
        .map_or_else(EngineConfig::default, |path| EngineConfig::load(&path));
    if args.no_autoencoder {
        config.reconstruction = ReconstructionMode::Disabled;
    }

    let normal = read_corpus(&args.normal).unwrap_or_else(|e| {
        tracing::warn!("{e:#}; continuing without a normal corpus");
        Vec::new()
    });
    let candidate = read_corpus(&args.candidate)?;

    let pipeline = Pipeline::new(config).with_threshold_override(args.threshold_z.as_deref());
    let run = pipeline.run(&normal, &candidate)?;

    for warning in &run.warnings {
        tracing::warn!("{warning}");
    }

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    match args.format {
        OutputFormat::Csv => report::write_csv(&run.rows, writer),
        OutputFormat::Json => report::write_json(&run, writer),
    }
    .context("Failed to write results")?;

    if let Some(path) = &args.output {
        tracing::info!("Wrote results to {}", path.display());
    }
    tracing::info!("{}", report::summary(&run));

    Ok(())
}
