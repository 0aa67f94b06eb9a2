//! bead_sorter CLI: dry-run the sorting loop or replay captures through the classifier.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use bead_sorter::core_modules::pixel_buffer::PixelBuffer;
use bead_sorter::hardware::{DirectoryCamera, LoggingActuators, capture_files};
use bead_sorter::pipeline::AssignmentOutcome;
use bead_sorter::{BeadClassifier, MotionSequencer, SorterConfig};

#[derive(Parser)]
#[command(name = "bead_sorter")]
#[command(about = "Sort beads by color into dynamically allocated tubes")]
#[command(version)]
struct Cli {
    /// TOML config file. Built-in calibration is used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full sorting loop against recorded captures, logging servo commands.
    Run {
        /// Directory of raw RGB565 captures, replayed in name order.
        #[arg(long)]
        captures: PathBuf,

        /// Stop after this many beads.
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Classify recorded captures without moving anything and print the tubes.
    Classify {
        /// Directory of raw RGB565 captures.
        captures: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SorterConfig> {
    match path {
        Some(path) => SorterConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(SorterConfig::default()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { captures, cycles } => run(&config, &captures, cycles).await,
        Commands::Classify { captures } => classify(&config, &captures),
    }
}

async fn run(config: &SorterConfig, captures: &Path, cycles: Option<u64>) -> anyhow::Result<()> {
    let camera = DirectoryCamera::open(captures, config.image.width, config.image.height)?;
    let actuators = LoggingActuators::new(config.motion.servos);
    let mut sequencer = MotionSequencer::new(config, camera, actuators)?;

    match sequencer.run(cycles).await {
        Ok(sorted) => tracing::info!(sorted, "cycle limit reached"),
        Err(e) if e.is_capture_exhausted() => {
            tracing::info!(sorted = sequencer.cycles().saturating_sub(1), "no captures left")
        }
        Err(e) => {
            let file = sequencer.camera().current_file().map(|p| p.display().to_string());
            return Err(e).with_context(|| format!("bead cycle {} failed (last capture {file:?})", sequencer.cycles()));
        }
    }

    print_tubes(sequencer.classifier());
    Ok(())
}

fn classify(config: &SorterConfig, captures: &Path) -> anyhow::Result<()> {
    let mut classifier = BeadClassifier::new(config)?;

    for path in capture_files(captures)? {
        let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let buffer = PixelBuffer::from_rgb565_bytes(config.image.width, config.image.height, &bytes)
            .with_context(|| format!("decoding {}", path.display()))?;
        let result = classifier.classify(&buffer)?;

        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let distance = result
            .assignment
            .nearest_distance
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        let verb = match result.assignment.outcome {
            AssignmentOutcome::Matched => "assigning",
            AssignmentOutcome::Created => "allocating",
            AssignmentOutcome::Overflow => "overflow assigning",
        };
        println!(
            "{name} {} is {distance} from nearest tube; {verb} to tube {}",
            result.color(),
            result.tube()
        );
    }

    print_tubes(&classifier);
    Ok(())
}

fn print_tubes(classifier: &BeadClassifier) {
    let store = classifier.store();
    println!(
        "{} beads in {} of {} tubes",
        store.bead_count(),
        store.tubes().len(),
        store.capacity()
    );
    println!("{:>4} {:>3} {:>5} {:>6}  colors", "tube", "row", "slice", "count");
    for tube in classifier.tubes() {
        let colors: Vec<String> = tube.colors().iter().map(ToString::to_string).collect();
        println!(
            "{:>4} {:>3} {:>5} {:>6}  {}",
            tube.index(),
            tube.row(),
            tube.slice(),
            tube.count(),
            colors.join(" ")
        );
    }
}
