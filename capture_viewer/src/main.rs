use anyhow::Context;
use std::env;
use std::path::Path;

use bead_sorter::core_modules::pixel_buffer::PixelBuffer;
use bead_sorter::core_modules::utils::image_helper::image_helper;
use bead_sorter::hardware::capture_files;
use bead_sorter::{BeadClassifier, SorterConfig};

const SCALE: u32 = 8;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: capture_viewer <capture_dir> <output_dir> [config.toml]");
        return Ok(());
    }
    let input_dir = Path::new(&args[1]);
    let output_dir = Path::new(&args[2]);
    let config = match args.get(3) {
        Some(path) => SorterConfig::load(Path::new(path)).with_context(|| format!("loading {path}"))?,
        None => SorterConfig::default(),
    };

    std::fs::create_dir_all(output_dir).with_context(|| format!("creating {}", output_dir.display()))?;

    // --- 2. Classifier Initialization ---
    // Tubes are assigned too so the output names say where each bead went.
    let mut classifier = BeadClassifier::new(&config)?;

    // --- 3. Main Processing Loop ---
    let mut rendered = 0usize;
    for path in capture_files(input_dir)? {
        let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let buffer = match PixelBuffer::from_rgb565_bytes(config.image.width, config.image.height, &bytes) {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping capture");
                continue;
            }
        };

        let result = classifier.classify(&buffer)?;
        let image = image_helper::render(&buffer, &result.sample);

        // --- 4. Output ---
        let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        let out = output_dir.join(format!("{stem}_tube{:02}.png", result.tube()));
        image_helper::save(&out, &image, SCALE).with_context(|| format!("writing {}", out.display()))?;

        tracing::info!(
            capture = %path.display(),
            color = %result.color(),
            tube = result.tube(),
            score = result.sample.arc.score,
            "rendered"
        );
        rendered += 1;
    }

    println!(
        "Rendered {rendered} captures into {} ({} tubes).",
        output_dir.display(),
        classifier.tubes().len()
    );
    Ok(())
}
