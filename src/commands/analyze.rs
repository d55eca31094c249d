use crate::config::RecognitionConfig;
use crate::pipeline::{Context, Pipeline};
use crate::progress::{ProgressEvent, ProgressKind};
use anyhow::{bail, Context as _, Result};
use clap::Parser;
use replay_capture::{FrameCursor, ImageDirSource};
use replay_data::GameData;
use replay_state::EventLog;
use replay_vision::ScriptedPerception;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Reconstruct the action log of a recorded battle
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "combat-replay")]
#[command(about = "Reconstruct the action log of a recorded battle")]
pub struct AnalyzeArgs {
    /// Video file, or a directory of extracted frames
    pub video: PathBuf,

    /// Stage name; skips reading it from the briefing screen
    #[arg(long)]
    pub stage: Option<String>,

    /// Directory holding units.json and tiles.json
    #[arg(long = "data")]
    pub data_dir: Option<PathBuf>,

    /// Recognition settings file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Where the action document is written
    #[arg(long = "cache", default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Recorded recognizer readings to replay
    #[arg(long)]
    pub transcript: Option<PathBuf>,

    /// Frame rate of a directory of extracted frames
    #[arg(long)]
    pub fps: Option<f64>,
}

/// Resolve the data directory for stage and unit files
fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()));
    if let Some(dir) = exe_dir {
        let project_root = dir.parent().and_then(|p| p.parent());
        if let Some(root) = project_root {
            let data = root.join("data");
            if data.exists() {
                return data;
            }
        }
    }
    PathBuf::from("data")
}

/// Analyze a recording and write its action document. Returns the document path.
pub async fn analyze(args: AnalyzeArgs) -> Result<PathBuf> {
    if !args.video.exists() {
        bail!("Recording not found: {}", args.video.display());
    }
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

    let reporter = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event.kind {
                ProgressKind::Error => error!("{:?} failed", event.task),
                ProgressKind::Start => info!("{:?} started", event.task),
                _ => info!("{:?} {:?}: {}", event.task, event.kind, event.details),
            }
        }
    });

    let result = tokio::task::spawn_blocking(move || run_blocking(args, tx))
        .await
        .context("Analysis task panicked")?;

    // The sender is gone once the blocking task returns, so this finishes
    let _ = reporter.await;
    result
}

fn run_blocking(args: AnalyzeArgs, tx: mpsc::UnboundedSender<ProgressEvent>) -> Result<PathBuf> {
    let data_dir = resolve_data_dir(args.data_dir);
    info!("Data directory: {}", data_dir.display());
    let data = GameData::load(&data_dir)?;

    let config = match &args.config {
        Some(path) => RecognitionConfig::load(path)?,
        None => RecognitionConfig::default(),
    };

    let Some(transcript) = &args.transcript else {
        bail!("No recognizer available for raw frames; pass --transcript <file.json>");
    };
    let perception = ScriptedPerception::from_transcript(transcript)?;

    let pipeline = Pipeline::new(Context {
        perception: &perception,
        data: &data,
        config: &config,
        progress: &tx,
    });

    info!("Starting analysis: {}", args.video.display());
    let log = run_source(&pipeline, &args.video, args.fps, args.stage.as_deref())?;
    Ok(pipeline.save(log, &args.cache_dir, &args.video)?)
}

fn run_source(pipeline: &Pipeline<'_>, video: &Path, fps: Option<f64>, stage: Option<&str>) -> Result<EventLog> {
    if video.is_dir() {
        let fps = fps.context("--fps is required for a directory of frames")?;
        let mut cursor = FrameCursor::new(ImageDirSource::open(video, fps)?);
        return Ok(pipeline.run(&mut cursor, stage)?);
    }
    run_video(pipeline, video, stage)
}

#[cfg(feature = "video")]
fn run_video(pipeline: &Pipeline<'_>, video: &Path, stage: Option<&str>) -> Result<EventLog> {
    let source = replay_capture::video::VideoSource::open(video)?;
    let mut cursor = FrameCursor::new(source);
    Ok(pipeline.run(&mut cursor, stage)?)
}

#[cfg(not(feature = "video"))]
fn run_video(_pipeline: &Pipeline<'_>, video: &Path, _stage: Option<&str>) -> Result<EventLog> {
    bail!(
        "{} is not a frame directory and video decoding is disabled (build with --features video)",
        video.display()
    )
}
