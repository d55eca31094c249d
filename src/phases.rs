//! Forward walk through the screens shown before the battle starts.
//!
//! The recording is consumed in four phases that never repeat: the formation
//! screen is read for the roster, the stage name is identified, the deploy
//! screen is located, and the cursor is handed over at the first battle frame.

use crate::error::{Phase, ReplayError, Result};
use crate::names::AvatarBook;
use crate::pipeline::Context;
use crate::progress::{track, SubTask};
use replay_capture::{Frame, FrameCursor, FrameSource};
use replay_vision::RosterEntry;
use serde_json::json;
use tracing::{debug, info};

/// What the pre-battle screens established
#[derive(Debug, Clone)]
pub struct Briefing {
    /// Roster names in the order the formation screen lists them
    pub roster: Vec<String>,
    pub stage_name: String,
    pub book: AvatarBook,
    pub battle_start_frame: usize,
}

enum PhaseState {
    RosterRead,
    StageIdentify {
        roster: Vec<RosterEntry>,
    },
    DeployScreenFind {
        roster: Vec<RosterEntry>,
        stage_name: String,
    },
    Battle(Briefing),
}

pub struct PhaseSegmenter<'a> {
    ctx: Context<'a>,
    preset_stage: Option<String>,
}

impl<'a> PhaseSegmenter<'a> {
    pub fn new(ctx: Context<'a>, preset_stage: Option<&str>) -> Self {
        Self {
            ctx,
            preset_stage: preset_stage.map(str::to_string),
        }
    }

    pub fn run<S: FrameSource>(&self, cursor: &mut FrameCursor<S>) -> Result<Briefing> {
        let mut state = PhaseState::RosterRead;
        loop {
            state = match state {
                PhaseState::RosterRead => {
                    let roster = track(self.ctx.progress, SubTask::OcrFormation, || {
                        self.read_roster(cursor)
                    })?;
                    PhaseState::StageIdentify { roster }
                }
                PhaseState::StageIdentify { roster } => {
                    let stage_name = self.identify_stage(cursor)?;
                    PhaseState::DeployScreenFind { roster, stage_name }
                }
                PhaseState::DeployScreenFind { roster, stage_name } => {
                    let (book, battle_start_frame) = track(
                        self.ctx.progress,
                        SubTask::MatchDeployment,
                        || self.find_deploy_screen(cursor, &roster),
                    )?;
                    PhaseState::Battle(Briefing {
                        roster: roster.into_iter().map(|e| e.name).collect(),
                        stage_name,
                        book,
                        battle_start_frame,
                    })
                }
                PhaseState::Battle(briefing) => return Ok(briefing),
            };
        }
    }

    /// Keep the largest roster seen; stop once it has stopped growing for
    /// `roster_stall_limit` samples or the formation screen is gone.
    fn read_roster<S: FrameSource>(&self, cursor: &mut FrameCursor<S>) -> Result<Vec<RosterEntry>> {
        let step = cursor.step_for(self.ctx.config.roster_fps);
        let limit = self.ctx.config.roster_stall_limit;
        let mut roster: Vec<RosterEntry> = Vec::new();
        let mut stall = 0;

        loop {
            let frame = match next_sample(cursor, step, Phase::Roster) {
                Err(ReplayError::StreamExhausted { .. }) if roster.is_empty() => {
                    return Err(ReplayError::EmptyRoster);
                }
                other => other?,
            };

            match self.ctx.perception.read_roster(&frame) {
                Some(entries) if entries.len() > roster.len() => {
                    debug!("Roster grew to {} at frame {}", entries.len(), frame.index);
                    roster = entries;
                    stall = 0;
                }
                Some(_) if !roster.is_empty() => {
                    stall += 1;
                    if stall >= limit {
                        break;
                    }
                }
                None if !roster.is_empty() => break,
                _ => {}
            }
        }

        let names: Vec<&str> = roster.iter().map(|e| e.name.as_str()).collect();
        info!("Roster: {:?}", names);
        self.ctx
            .progress
            .completed(SubTask::OcrFormation, json!({ "formation": names }));
        Ok(roster)
    }

    fn identify_stage<S: FrameSource>(&self, cursor: &mut FrameCursor<S>) -> Result<String> {
        if let Some(stage) = &self.preset_stage {
            if !self.ctx.data.has_stage(stage) {
                self.ctx.progress.error(SubTask::OcrStage);
                return Err(ReplayError::UnknownStage(stage.clone()));
            }
            info!("Stage (preset): {}", stage);
            self.ctx
                .progress
                .completed(SubTask::OcrStage, json!({ "stage_name": stage }));
            return Ok(stage.clone());
        }

        let stage = track(self.ctx.progress, SubTask::OcrStage, || -> Result<String> {
            let step = cursor.step_for(self.ctx.config.stage_ocr_fps);
            loop {
                let frame = next_sample(cursor, step, Phase::Stage)?;
                match self.ctx.perception.read_stage_name(&frame) {
                    Some(text) if self.ctx.data.has_stage(&text) => return Ok(text),
                    Some(text) => debug!("Ignoring stage text {:?} at frame {}", text, frame.index),
                    None if self.ctx.perception.detect_battle_ui(&frame) => {
                        return Err(ReplayError::BattleStartedBeforeStage { frame: frame.index });
                    }
                    None => {}
                }
            }
        })?;

        info!("Stage: {}", stage);
        self.ctx
            .progress
            .completed(SubTask::OcrStage, json!({ "stage_name": stage }));
        Ok(stage)
    }

    /// Sample until the pause button shows, then match the roster against
    /// the tray on that frame.
    fn find_deploy_screen<S: FrameSource>(
        &self,
        cursor: &mut FrameCursor<S>,
        roster: &[RosterEntry],
    ) -> Result<(AvatarBook, usize)> {
        let step = cursor.step_for(self.ctx.config.deployment_fps);
        loop {
            let frame = next_sample(cursor, step, Phase::DeployScreen)?;
            let tray = self.ctx.perception.detect_deploy_tray(&frame);
            if !tray.pause_visible {
                continue;
            }

            info!(
                "Deploy screen at frame {} with {} tray slots",
                frame.index,
                tray.slots.len()
            );
            let book = AvatarBook::build(&self.ctx, roster, &tray.slots);
            if book.is_empty() {
                return Err(ReplayError::NoDeploymentMatch);
            }
            let matched: Vec<&str> = book.names().collect();
            self.ctx
                .progress
                .completed(SubTask::MatchDeployment, json!({ "matched": matched }));
            return Ok((book, frame.index));
        }
    }
}

/// Read the frame under the cursor and move `step` frames on.
fn next_sample<S: FrameSource>(cursor: &mut FrameCursor<S>, step: usize, phase: Phase) -> Result<Frame> {
    let frame = cursor
        .next_frame()?
        .ok_or(ReplayError::StreamExhausted {
            phase,
            frame: cursor.position(),
        })?;
    cursor.skip(step.saturating_sub(1))?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressKind;
    use crate::test_support::{noise, roster, Fixture};
    use replay_capture::MemorySource;
    use replay_data::Role;
    use replay_state::DeploymentSlot;
    use replay_vision::{FrameScript, ScriptedPerception, TrayReading};

    fn roster_of(size: usize) -> FrameScript {
        FrameScript {
            roster: Some(roster(&["A", "B", "C"][..size])),
            ..Default::default()
        }
    }

    #[test]
    fn test_roster_stops_after_stall_limit() {
        // Grows for three samples, then repeats
        let perception = ScriptedPerception::new()
            .at(0, roster_of(1))
            .at(1, roster_of(2))
            .at(2, roster_of(3));
        let fx = Fixture::with_perception(perception);
        let mut cursor = FrameCursor::new(MemorySource::blank(20, 1.0));

        let segmenter = PhaseSegmenter::new(fx.ctx(), None);
        let roster = segmenter.read_roster(&mut cursor).unwrap();
        assert_eq!(roster.len(), 3);
        assert_eq!(fx.perception.roster_reads(), 8);
        assert_eq!(cursor.position(), 8);
    }

    #[test]
    fn test_roster_ends_when_formation_disappears() {
        let perception = ScriptedPerception::new()
            .at(0, roster_of(2))
            .at(2, FrameScript::default());
        let fx = Fixture::with_perception(perception);
        let mut cursor = FrameCursor::new(MemorySource::blank(20, 1.0));

        let segmenter = PhaseSegmenter::new(fx.ctx(), None);
        assert_eq!(segmenter.read_roster(&mut cursor).unwrap().len(), 2);
        assert_eq!(fx.perception.roster_reads(), 3);
    }

    #[test]
    fn test_no_roster_is_an_error() {
        let fx = Fixture::new();
        let mut cursor = FrameCursor::new(MemorySource::blank(4, 1.0));
        let segmenter = PhaseSegmenter::new(fx.ctx(), None);
        assert!(matches!(
            segmenter.read_roster(&mut cursor),
            Err(ReplayError::EmptyRoster)
        ));
    }

    #[test]
    fn test_battle_ui_before_stage_name() {
        let perception = ScriptedPerception::new()
            .at(0, FrameScript {
                stage_name: Some("not a stage".into()),
                ..Default::default()
            })
            .at(3, FrameScript {
                battle_ui: true,
                ..Default::default()
            });
        let fx = Fixture::with_perception(perception);
        let mut cursor = FrameCursor::new(MemorySource::blank(10, 1.0));

        let segmenter = PhaseSegmenter::new(fx.ctx(), None);
        assert!(matches!(
            segmenter.identify_stage(&mut cursor),
            Err(ReplayError::BattleStartedBeforeStage { frame: 3 })
        ));
    }

    #[test]
    fn test_preset_stage_is_validated() {
        let fx = Fixture::new();
        let mut cursor = FrameCursor::new(MemorySource::blank(1, 1.0));

        let known = PhaseSegmenter::new(fx.ctx(), Some("1-7"));
        assert_eq!(known.identify_stage(&mut cursor).unwrap(), "1-7");
        assert_eq!(cursor.position(), 0);

        let unknown = PhaseSegmenter::new(fx.ctx(), Some("9-9"));
        assert!(matches!(
            unknown.identify_stage(&mut cursor),
            Err(ReplayError::UnknownStage(_))
        ));
    }

    #[test]
    fn test_preset_stage_reports_completion() {
        let fx = Fixture::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let ctx = Context {
            progress: &tx,
            ..fx.ctx()
        };
        let mut cursor = FrameCursor::new(MemorySource::blank(1, 1.0));

        PhaseSegmenter::new(ctx, Some("1-7"))
            .identify_stage(&mut cursor)
            .unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.task, SubTask::OcrStage);
        assert_eq!(event.kind, ProgressKind::Completed);
        assert_eq!(event.details["stage_name"], "1-7");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_walk_hands_over_battle_start() {
        let tray = TrayReading {
            slots: vec![
                DeploymentSlot::new(0, Role::Sniper, noise(1, 40, 40), false),
                DeploymentSlot::new(1, Role::Tank, noise(2, 40, 40), false),
            ],
            pause_visible: true,
        };
        let perception = ScriptedPerception::new()
            .at(0, roster_of(2))
            .at(6, FrameScript {
                stage_name: Some("1-7".into()),
                ..Default::default()
            })
            .at(9, FrameScript {
                tray,
                ..Default::default()
            });
        let fx = Fixture::with_perception(perception);
        let mut cursor = FrameCursor::new(MemorySource::blank(20, 1.0));

        let briefing = PhaseSegmenter::new(fx.ctx(), None).run(&mut cursor).unwrap();
        assert_eq!(briefing.roster, vec!["A", "B"]);
        assert_eq!(briefing.stage_name, "1-7");
        assert_eq!(briefing.battle_start_frame, 9);
        assert_eq!(briefing.book.names().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_unmatched_tray_fails() {
        let tray = TrayReading {
            slots: vec![DeploymentSlot::new(0, Role::Sniper, noise(7, 40, 40), false)],
            pause_visible: true,
        };
        let perception = ScriptedPerception::new().at(0, FrameScript {
            tray,
            ..Default::default()
        });
        let fx = Fixture::with_perception(perception);
        let mut cursor = FrameCursor::new(MemorySource::blank(5, 1.0));

        let segmenter = PhaseSegmenter::new(fx.ctx(), None);
        assert!(matches!(
            segmenter.find_deploy_screen(&mut cursor, &roster(&["A"])),
            Err(ReplayError::NoDeploymentMatch)
        ));
    }
}
