use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use serde::Serialize;

use handgrid::{
    ActiveConfig, CalibrationReport, Calibrator, ClassifierConfig, GridError, GridPipeline, HandMap, MarkerColor, MarkerGrid,
    PatternCatalog, PatternScorer, Photo, ScoringConfig, SeverityBands,
};

#[derive(Parser)]
#[command(name = "handgrid")]
#[command(about = "Read hand-assessment grid photographs and score them against known patterns")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Classifier configuration (JSON); defaults are used when omitted
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Pattern catalog (JSON); the built-in catalog is used when omitted
    #[arg(long, value_name = "FILE", global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read each photograph into a grid
    Read {
        #[command(flatten)]
        photos: PhotoArgs,

        /// Include per-cell diagnostics
        #[arg(long)]
        details: bool,
    },
    /// Read, merge and score the photographs of one examination
    Analyze {
        #[command(flatten)]
        photos: PhotoArgs,

        #[command(flatten)]
        hands: HandArgs,
    },
    /// Score a grid given as JSON (`grid_color` and `grid_size`)
    Score {
        /// Grid file
        #[arg(value_name = "GRID")]
        grid: PathBuf,

        #[command(flatten)]
        hands: HandArgs,
    },
    /// Score a bare list of 81 sizes against every pattern
    Simulate {
        /// 81 comma-separated sizes, row-major
        #[arg(value_name = "SIZES")]
        sizes: String,

        #[arg(long, default_value_t = 4)]
        light_min: u32,

        #[arg(long, default_value_t = 8)]
        light_max: u32,

        #[arg(long, default_value_t = 18)]
        mild_max: u32,
    },
    /// Derive size thresholds from sample photographs
    Calibrate {
        #[command(flatten)]
        photos: PhotoArgs,

        /// Write the calibrated configuration here
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
    /// Print the diameter ratio of every marker
    Measure {
        #[command(flatten)]
        photos: PhotoArgs,
    },
    /// List the pattern catalog
    Patterns,
}

#[derive(Args)]
struct PhotoArgs {
    /// Photographs of the same sheet
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,
}

#[derive(Args)]
struct HandArgs {
    /// Marker color of the left hand
    #[arg(long, default_value = "CYAN")]
    left: MarkerColor,

    /// Marker color of the right hand
    #[arg(long, default_value = "GREEN")]
    right: MarkerColor,
}

impl HandArgs {
    fn hand_map(&self) -> anyhow::Result<HandMap> {
        Ok(HandMap::new(self.left, self.right)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let config = match &cli.config {
        Some(path) => ClassifierConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ClassifierConfig::default(),
    };
    let loaded;
    let catalog = match &cli.catalog {
        Some(path) => {
            loaded = PatternCatalog::from_path(path)
                .with_context(|| format!("failed to load catalog {}", path.display()))?;
            &loaded
        }
        None => PatternCatalog::builtin()?,
    };
    let scorer = PatternScorer::new(catalog, ScoringConfig::default());

    match cli.command {
        Command::Read { photos, details } => {
            let pipeline = build_pipeline(&photos, config, cli.verbose)?;
            let readings = pipeline.read_batch(load(&photos)).await;
            if !readings.iter().any(|r| r.success()) {
                bail!(GridError::NoUsableInput { total: readings.len() });
            }
            let readings: Vec<_> = if details {
                readings
            } else {
                readings.into_iter().map(|r| r.without_details()).collect()
            };
            print_json(&readings)?;
        }
        Command::Analyze { photos, hands } => {
            let pipeline = build_pipeline(&photos, config, cli.verbose)?;
            let report = pipeline.analyze(load(&photos), &scorer, &hands.hand_map()?).await?;
            print_json(&report)?;
        }
        Command::Score { grid, hands } => {
            let text = std::fs::read_to_string(&grid).with_context(|| format!("failed to read {}", grid.display()))?;
            let grid: MarkerGrid = serde_json::from_str(&text)?;
            print_json(&scorer.score(&grid, &hands.hand_map()?))?;
        }
        Command::Simulate {
            sizes,
            light_min,
            light_max,
            mild_max,
        } => {
            let sizes = sizes
                .split(',')
                .map(|s| s.trim().parse::<u32>())
                .collect::<Result<Vec<_>, _>>()
                .context("sizes must be comma-separated integers")?;
            let bands = SeverityBands::new(light_min, light_max, mild_max)?;
            print_json(&scorer.simulate(&sizes, &bands)?)?;
        }
        Command::Calibrate { photos, save } => {
            let pipeline = build_pipeline(&photos, config, cli.verbose)?;
            let calibrator = Calibrator::new(Arc::clone(&pipeline));
            let report = calibrator.calibrate_and_apply(load(&photos)).await?;
            if let Some(path) = save {
                pipeline.config().snapshot().to_path(&path)?;
            }
            print_json(&report)?;
        }
        Command::Measure { photos } => {
            let pipeline = build_pipeline(&photos, config, cli.verbose)?;
            let calibrator = Calibrator::new(pipeline);
            let total = photos.images.len();
            let (samples, used) = calibrator.collect(load(&photos)).await;
            if used == 0 {
                bail!(GridError::NoUsableInput { total });
            }
            print_measurements(&CalibrationReport::from_samples(samples, used, total)?);
        }
        Command::Patterns => {
            print_json(&catalog.patterns())?;
        }
    }

    Ok(())
}

fn build_pipeline(photos: &PhotoArgs, config: ClassifierConfig, verbose: bool) -> anyhow::Result<Arc<GridPipeline>> {
    let mut pipeline = GridPipeline::new()
        .with_verbose(verbose)
        .with_config(Arc::new(ActiveConfig::new(config)));
    if let Some(dir) = &photos.debug_out {
        pipeline = pipeline.with_debug(dir.clone())?;
    }
    Ok(Arc::new(pipeline))
}

fn load(photos: &PhotoArgs) -> Vec<Photo> {
    photos.images.iter().map(Photo::from_path).collect()
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_measurements(report: &CalibrationReport) {
    println!("{:<24} {:>5} {:<8} {:>8}", "image", "cell", "color", "ratio");
    for s in &report.samples {
        println!("{:<24} {:>5} {:<8} {:>8.3}", s.image, s.index, s.color, s.ratio);
    }
    println!();
    println!(
        "{} markers: min {:.3}, max {:.3}, median {:.3}",
        report.count, report.min, report.max, report.median
    );
    let [t1, t2, t3, t4] = report.thresholds.as_array();
    println!("suggested thresholds: {t1:.3} {t2:.3} {t3:.3} {t4:.3}");
    for bin in &report.histogram {
        println!("  {:>9}  {}", bin.range, "#".repeat(bin.count));
    }
}
