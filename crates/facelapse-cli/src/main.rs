use anyhow::{Context, Result};
use clap::Parser;
use facelapse_core::detector::FaceLandmarker;
use facelapse_core::landmarks::FIVE_POINT_TOPOLOGY;
use facelapse_core::pipeline::Pipeline;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod overlay;
mod sink;
mod source;

#[derive(Parser)]
#[command(
    name = "facelapse",
    about = "Align a folder of timestamped face photos into a stabilized timelapse video"
)]
struct Cli {
    /// Directory of input photos (Telegram-style `photo_<n>@DD-MM-YYYY_HH-MM-SS.jpg` names)
    input: PathBuf,

    /// Output video path
    #[arg(short, long, default_value = "timelapse.mp4")]
    output: PathBuf,

    /// Frame rate of the output video
    #[arg(long, default_value_t = 15)]
    fps: u32,

    /// Path to the SCRFD face detection model (ONNX)
    #[arg(long, env = "FACELAPSE_MODEL")]
    model: PathBuf,

    /// TTF font for the day-label overlay; omit to disable labels
    #[arg(long)]
    font: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let entries = source::discover(&cli.input)?;
    anyhow::ensure!(
        !entries.is_empty(),
        "no timestamped .jpg photos found in {}",
        cli.input.display()
    );
    tracing::info!(count = entries.len(), "photos discovered");

    let labeler = cli
        .font
        .as_deref()
        .map(overlay::DayLabeler::load)
        .transpose()?;
    let mut photos = source::PhotoSequence::open(entries, labeler)?;

    let detector = FaceLandmarker::load(&cli.model.to_string_lossy())
        .context("loading face detection model")?;
    let mut encoder = sink::FfmpegSink::spawn(&cli.output, photos.resolution(), cli.fps)?;

    let mut pipeline = Pipeline::new(detector, FIVE_POINT_TOPOLOGY);
    match pipeline.run(&mut photos, &mut encoder) {
        Ok(report) => {
            println!(
                "Rendered {} of {} frames to {} ({} skipped: no face found)",
                report.frames_written,
                report.frames_total,
                cli.output.display(),
                report.frames_skipped
            );
            Ok(())
        }
        Err(err) => {
            // Leave no half-written video behind on a fatal failure.
            encoder.discard();
            Err(err).context("alignment pipeline failed")
        }
    }
}
