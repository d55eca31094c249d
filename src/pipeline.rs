use crate::clip_analyzer::ClipAnalyzer;
use crate::config::RecognitionConfig;
use crate::error::{ReplayError, Result};
use crate::phases::PhaseSegmenter;
use crate::progress::{ProgressSink, SubTask};
use crate::reconstruct::ChangeReconstructor;
use crate::slicer::{prune_clips, ClipSegmenter};
use chrono::Local;
use replay_capture::{FrameCursor, FrameSource};
use replay_data::GameData;
use replay_state::{Clip, EventLog};
use replay_vision::Perception;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

/// Collaborators shared by every stage of a run
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub perception: &'a dyn Perception,
    pub data: &'a GameData,
    pub config: &'a RecognitionConfig,
    pub progress: &'a dyn ProgressSink,
}

/// Manages the phases → clips → votes → events pipeline for one recording
pub struct Pipeline<'a> {
    ctx: Context<'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// Walk the whole recording once and reconstruct its action log.
    /// Any failure aborts the run and nothing is returned.
    pub fn run<S: FrameSource>(&self, cursor: &mut FrameCursor<S>, stage: Option<&str>) -> Result<EventLog> {
        let briefing = PhaseSegmenter::new(self.ctx, stage).run(cursor)?;
        let tiles = self
            .ctx
            .data
            .tiles(&briefing.stage_name)
            .ok_or_else(|| ReplayError::UnknownStage(briefing.stage_name.clone()))?;

        let clips = ClipSegmenter::new(self.ctx).run(cursor, briefing.battle_start_frame)?;
        let clips = prune_clips(clips);
        info!("{} clips to analyze", clips.len());

        let analyzer = ClipAnalyzer::new(self.ctx, tiles);
        let reconstructor = ChangeReconstructor::new(self.ctx, &briefing.book);
        let mut log = EventLog::new(&briefing.stage_name, briefing.roster.clone());

        let mut prev: Option<Clip> = None;
        for mut clip in clips {
            analyzer.analyze(cursor, &mut clip, prev.as_ref())?;
            if let Some(p) = prev.as_mut() {
                reconstructor.apply(p, &mut clip, &mut log);
            }
            prev = Some(clip);
        }

        info!("Reconstructed {} actions", log.events().len());
        Ok(log)
    }

    /// Write the action document under `<cache_dir>/CombatRecord/` and report
    /// its path.
    pub fn save(&self, log: EventLog, cache_dir: &Path, video_path: &Path) -> Result<PathBuf> {
        let now = Local::now();
        let dir = cache_dir.join("CombatRecord");
        std::fs::create_dir_all(&dir)?;

        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let filename = format!(
            "replay_{}_{}_{}.json",
            file_safe(log.stage_name()),
            file_safe(&stem),
            now.format("%Y%m%d-%H%M%S")
        );
        let path = dir.join(filename);

        let details = format!(
            "Built at: {}\n{}",
            now.format("%Y-%m-%d %H:%M:%S"),
            video_path.display()
        );
        let document = log.into_document(&self.ctx.config.minimum_required, details);
        std::fs::write(&path, serde_json::to_string_pretty(&document)?)?;

        info!("Saved {}", path.display());
        self.ctx.progress.extra_info(
            SubTask::Finished,
            json!({ "filename": path.to_string_lossy() }),
        );
        Ok(path)
    }
}

fn file_safe(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
