use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use shapeseq::frame::BoundingBox;
use shapeseq::render::{render_overlay, render_table};
use shapeseq::{bitmap, codec, dataset, PipelineConfig, SegmentKind, ThresholdMethod};

#[derive(Parser)]
#[command(name = "shapeseq", about = "Raster masks to typed Bezier segment sequences")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit one mask and report its segment table
    Fit {
        /// Input mask path (PNG, JPEG, BMP)
        #[arg(short, long)]
        input: PathBuf,

        /// JSON pipeline config; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Polygon simplification tolerance as a fraction of the perimeter
        #[arg(long)]
        epsilon: Option<f64>,

        /// Maximum deviation (pixels) a single quadratic may absorb
        #[arg(long)]
        dev: Option<f64>,

        /// Rows per segment table
        #[arg(long)]
        max_segments: Option<usize>,

        /// Fixed brightness threshold (0-255); use Otsu with --otsu
        #[arg(long)]
        threshold: Option<u8>,

        /// Pick the threshold with Otsu's method
        #[arg(long, conflicts_with = "threshold")]
        otsu: bool,

        /// Write an overlay PNG of the fitted outline
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Write the segment table as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Build training samples from a scene dataset
    Dataset {
        /// Dataset root holding json/, masks/ and images/
        #[arg(short, long)]
        root: PathBuf,

        /// Output file, one JSON sample per line
        #[arg(short, long)]
        output: PathBuf,

        /// Stop after this many samples
        #[arg(long)]
        max_samples: Option<usize>,

        /// JSON pipeline config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig, shapeseq::ShapeError> {
    match path {
        Some(path) => PipelineConfig::load(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Fit {
            input,
            config,
            epsilon,
            dev,
            max_segments,
            threshold,
            otsu,
            overlay,
            json,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(epsilon) = epsilon {
                config.epsilon_ratio = epsilon;
            }
            if let Some(dev) = dev {
                config.fit.threshold_dev = dev;
            }
            if let Some(max_segments) = max_segments {
                config.max_segments = max_segments;
            }
            if let Some(t) = threshold {
                config.threshold = ThresholdMethod::Fixed(t);
            }
            if otsu {
                config.threshold = ThresholdMethod::Otsu;
            }
            config.validate()?;

            eprintln!();
            eprintln!("  shapeseq \u{00b7} {}", input.display());
            eprintln!();

            let t_start = Instant::now();
            let mask = bitmap::load_mask(&input, config.threshold)?;
            let (w, h) = mask.dimensions();
            let threshold_name = match config.threshold {
                ThresholdMethod::Otsu => "Otsu".to_string(),
                ThresholdMethod::Fixed(t) => format!("fixed {}", t),
            };
            eprintln!(
                "  Load        {}x{} px, {} threshold, {} foreground px",
                w, h, threshold_name, bitmap::foreground_count(&mask)
            );

            let result = shapeseq::fit_mask(&mask, &config)?;
            eprintln!(
                "  Contour     {} points \u{2192} {} vertices  (epsilon {})",
                result.contour_points,
                result.polygon.len(),
                config.epsilon_ratio
            );

            let kinds = result.table.kinds();
            let count = |k: SegmentKind| kinds.iter().filter(|x| **x == k).count();
            eprintln!(
                "  Fit         {} segments: {} lines + {} quadratics + {} cubics",
                result.segments.len(),
                count(SegmentKind::Line),
                count(SegmentKind::Quadratic),
                count(SegmentKind::Cubic),
            );
            eprintln!(
                "  Encode      {} of {} rows used  (normalizer {})  ({}ms)",
                result.table.len(),
                result.table.capacity(),
                result.normalizer,
                t_start.elapsed().as_millis()
            );

            if let Some(path) = &json {
                let mut out = BufWriter::new(File::create(path)?);
                serde_json::to_writer_pretty(&mut out, &result.table)?;
                out.flush()?;
                eprintln!("  Table       {}", path.display());
            }

            if let Some(path) = &overlay {
                let rendered = render_table(&result.table, None, 20);
                let frame = BoundingBox::of_mask(&mask, codec::normalizer(w, h));
                render_overlay(&rendered, None, Some(&frame), path, 512)?;
                eprintln!("  Overlay     {}", path.display());
            }
            eprintln!();
        }
        Command::Dataset {
            root,
            output,
            max_samples,
            config,
        } => {
            let config = load_config(config.as_ref())?;
            let t_start = Instant::now();
            let samples = dataset::build_dataset(&root, max_samples, &config)?;

            let mut out = BufWriter::new(File::create(&output)?);
            for sample in &samples {
                serde_json::to_writer(&mut out, sample)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;

            eprintln!();
            eprintln!(
                "  \u{2713} {} samples \u{2192} {}  ({}ms)",
                samples.len(),
                output.display(),
                t_start.elapsed().as_millis()
            );
            eprintln!();
        }
    }

    Ok(())
}
