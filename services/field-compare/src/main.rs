//! field-compare CLI: align forecast sources and export verification records.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use field_compare::{Bundle, ComparisonReport, ResultsReport};
use field_engine::EngineConfig;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "field-compare")]
#[command(about = "Align gridded forecasts and export verification records", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "FIELD_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare forecast sources against each other and a reference
    Compare {
        /// Path to bundle YAML or JSON file
        #[arg(short, long)]
        bundle: PathBuf,

        /// Output format: table (default), json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Align forecasts onto a regular grid of this spacing (degrees) when
        /// the bundle has no reference
        #[arg(long)]
        resolution: Option<f64>,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Flatten a comparison into verification records
    Verify {
        /// Path to bundle YAML or JSON file
        #[arg(short, long)]
        bundle: PathBuf,

        /// Output format: csv (default), json
        #[arg(short, long, default_value = "csv")]
        output: String,

        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Align forecasts onto a regular grid of this spacing (degrees) when
        /// the bundle has no reference
        #[arg(long)]
        resolution: Option<f64>,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Align and summarize the bundle's loss curves
    Curves {
        /// Path to bundle YAML or JSON file
        #[arg(short, long)]
        bundle: PathBuf,

        /// Trailing moving-average window; 1 disables smoothing
        #[arg(short, long, default_value = "1")]
        window: usize,

        /// Output format: table (default), csv, json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}

#[derive(Args)]
struct ConfigOverrides {
    /// Fail alignment when more than this fraction of target points is uncovered
    #[arg(long)]
    max_missing_fraction: Option<f64>,

    /// Snap lookups outside an irregular grid to the nearest point
    #[arg(long)]
    nearest_fallback: bool,

    /// Any uncovered target point fails alignment
    #[arg(long, conflicts_with = "max_missing_fraction")]
    strict: bool,

    /// Keep values in source units
    #[arg(long)]
    no_unit_conversion: bool,
}

impl ConfigOverrides {
    fn apply(&self, mut config: EngineConfig) -> anyhow::Result<EngineConfig> {
        if let Some(fraction) = self.max_missing_fraction {
            config.max_missing_fraction = fraction;
        }
        if self.strict {
            config.max_missing_fraction = 0.0;
        }
        if self.nearest_fallback {
            config.nearest_fallback = true;
        }
        if self.no_unit_conversion {
            config.convert_units = false;
        }
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    match cli.command {
        Commands::Compare {
            bundle,
            output,
            resolution,
            overrides,
        } => {
            info!(bundle = %bundle.display(), "Loading bundle");
            let loaded = Bundle::from_file(&bundle)?.with_resolution(resolution);
            let config = overrides.apply(loaded.engine_config())?;
            let comparison = field_compare::run_compare(&loaded, &config)?;
            let report = ComparisonReport::from(&comparison);

            match output.as_str() {
                "json" => println!("{}", ResultsReport::format_json(&report)?),
                _ => println!("{}", ResultsReport::format_table(&report)),
            }
            Ok(())
        }
        Commands::Verify {
            bundle,
            output,
            out,
            resolution,
            overrides,
        } => {
            info!(bundle = %bundle.display(), "Loading bundle");
            let loaded = Bundle::from_file(&bundle)?.with_resolution(resolution);
            let config = overrides.apply(loaded.engine_config())?;
            let records = field_compare::run_verify(&loaded, &config)?;
            info!(records = records.len(), "Verification records ready");

            let text = match output.as_str() {
                "json" => ResultsReport::format_json(&records)?,
                _ => ResultsReport::records_csv(&records),
            };
            match out {
                Some(path) => std::fs::write(&path, text)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{}", text),
            }
            Ok(())
        }
        Commands::Curves {
            bundle,
            window,
            output,
        } => {
            let loaded = Bundle::from_file(&bundle)?;
            if loaded.curves.is_empty() {
                anyhow::bail!("bundle {} has no curves", bundle.display());
            }
            let mut aligned = field_engine::align_curves(&loaded.curves);
            if window > 1 {
                for run in aligned.values.iter_mut() {
                    *run = field_engine::moving_average(run, window);
                }
            }

            match output.as_str() {
                "json" => println!("{}", ResultsReport::format_json(&aligned)?),
                "csv" => print!("{}", ResultsReport::curves_csv(&aligned)),
                _ => {
                    let summaries: Vec<_> = loaded.curves.iter().map(field_engine::summarize).collect();
                    println!("{}", ResultsReport::format_curves_table(&summaries));
                }
            }
            Ok(())
        }
    }
}
