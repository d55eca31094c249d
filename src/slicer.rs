use crate::error::Result;
use crate::pipeline::Context;
use crate::progress::{track, SubTask};
use replay_capture::{FrameCursor, FrameSource};
use replay_state::Clip;
use serde_json::json;
use tracing::{debug, info, warn};

/// Splits the battle into clips over which the tray composition is stable.
pub struct ClipSegmenter<'a> {
    ctx: Context<'a>,
}

impl<'a> ClipSegmenter<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    pub fn run<S: FrameSource>(&self, cursor: &mut FrameCursor<S>, battle_start: usize) -> Result<Vec<Clip>> {
        let clips = track(self.ctx.progress, SubTask::Slice, || self.slice(cursor, battle_start))?;
        self.ctx
            .progress
            .completed(SubTask::Slice, json!({ "clips": clips.len() }));
        Ok(clips)
    }

    fn slice<S: FrameSource>(&self, cursor: &mut FrameCursor<S>, battle_start: usize) -> Result<Vec<Clip>> {
        let config = self.ctx.config;
        let step = cursor.step_for(config.deployment_fps);
        cursor.seek(battle_start)?;

        let mut clips = Vec::new();
        let mut open: Option<Clip> = None;
        let mut misses = 0;
        let mut battle_end: Option<usize> = None;
        let mut last_sampled = battle_start;

        while let Some(frame) = cursor.next_frame()? {
            cursor.skip(step - 1)?;
            let i = frame.index;
            last_sampled = i;

            let Some(reading) = self.ctx.perception.detect_on_field(&frame) else {
                if let Some(mut clip) = open.take() {
                    clip.close(i);
                    clips.push(clip);
                }
                battle_end.get_or_insert(i);
                misses += 1;
                if misses > config.battle_miss_limit {
                    break;
                }
                continue;
            };
            misses = 0;
            battle_end = None;

            if reading.in_detail_page {
                // The panel hides the field; cut the clip back to the last clean sample
                if let Some(mut clip) = open.take() {
                    clip.close(i.saturating_sub(step));
                    clips.push(clip);
                }
                continue;
            }

            let resized = open
                .as_ref()
                .map(|clip| clip.deployment.len() != reading.slots.len());
            match resized {
                None => {
                    debug!("Clip opened at frame {} ({} in tray)", i, reading.slots.len());
                    open = Some(Clip::open(i, reading.slots));
                }
                Some(true) => {
                    if let Some(mut clip) = open.take() {
                        clip.close(i);
                        clips.push(clip);
                    }
                    debug!("Tray now holds {} at frame {}", reading.slots.len(), i);
                    open = Some(Clip::open(i, reading.slots));
                }
                Some(false) => {
                    if let Some(clip) = open.as_mut() {
                        if clip.refine(reading.slots) {
                            debug!("Clip tray refined at frame {} (cooling {})", i, clip.cooling);
                        }
                    }
                }
            }
        }

        if let Some(mut clip) = open.take() {
            clip.close(last_sampled);
            clips.push(clip);
        }

        match battle_end {
            Some(frame) => info!("Battle ended at frame {}, {} clips", frame, clips.len()),
            None => info!("Recording ended mid-battle, {} clips", clips.len()),
        }
        Ok(clips)
    }
}

/// Drop clips with no span and clips whose tray shows the same roles, slot
/// for slot, as the last clip kept.
pub fn prune_clips(clips: Vec<Clip>) -> Vec<Clip> {
    let mut kept: Vec<Clip> = Vec::with_capacity(clips.len());
    for clip in clips {
        let unchanged = kept.last().map_or(false, |prev| prev.same_roles(&clip));
        if unchanged || clip.is_degenerate() {
            warn!(
                "Dropping clip {}..{}: tray unchanged or empty span",
                clip.start_frame, clip.end_frame
            );
            continue;
        }
        kept.push(clip);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{slot, tray_of, Fixture};
    use replay_capture::MemorySource;
    use replay_data::Role;
    use replay_vision::{FieldReading, FrameScript, ScriptedPerception};

    fn field(slots: Vec<replay_state::DeploymentSlot>, in_detail_page: bool) -> FrameScript {
        FrameScript {
            field: Some(FieldReading {
                slots,
                in_detail_page,
            }),
            ..Default::default()
        }
    }

    fn slice(perception: ScriptedPerception, frames: usize, fps: f64) -> Vec<Clip> {
        let fx = Fixture::with_perception(perception);
        let mut cursor = FrameCursor::new(MemorySource::blank(frames, fps));
        ClipSegmenter::new(fx.ctx()).run(&mut cursor, 0).unwrap()
    }

    #[test]
    fn test_composition_change_splits_clip() {
        let perception = ScriptedPerception::new()
            .at(0, field(tray_of(&[Role::Tank, Role::Medic]), false))
            .at(10, field(tray_of(&[Role::Medic]), false))
            .at(20, FrameScript::default());

        let clips = slice(perception, 40, 1.0);
        assert_eq!(clips.len(), 2);
        assert_eq!((clips[0].start_frame, clips[0].end_frame), (0, 10));
        assert_eq!((clips[1].start_frame, clips[1].end_frame), (10, 20));
        assert_eq!(clips[1].deployment.len(), 1);
    }

    #[test]
    fn test_lower_cooling_refines_tray() {
        let perception = ScriptedPerception::new()
            .at(0, field(vec![slot(0, Role::Tank, true), slot(1, Role::Medic, true)], false))
            .at(4, field(vec![slot(0, Role::Tank, false), slot(1, Role::Medic, true)], false))
            .at(8, field(vec![slot(0, Role::Tank, true), slot(1, Role::Medic, true)], false));

        let clips = slice(perception, 12, 1.0);
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].cooling, 1);
        assert!(!clips[0].deployment[0].cooling);
        // Still open at the end of the recording
        assert_eq!(clips[0].end_frame, 11);
    }

    #[test]
    fn test_detail_page_cuts_clip_back() {
        // 30 fps sampled at 5 fps: every 6th frame
        let perception = ScriptedPerception::new()
            .at(0, field(tray_of(&[Role::Tank]), false))
            .at(24, field(tray_of(&[Role::Tank]), true))
            .at(36, field(tray_of(&[Role::Tank]), false))
            .at(48, FrameScript::default());

        let clips = slice(perception, 60, 30.0);
        assert_eq!(clips.len(), 2);
        assert_eq!((clips[0].start_frame, clips[0].end_frame), (0, 18));
        assert_eq!((clips[1].start_frame, clips[1].end_frame), (36, 48));
    }

    #[test]
    fn test_miss_limit_stops_scan() {
        let perception = ScriptedPerception::new()
            .at(0, field(tray_of(&[Role::Tank]), false))
            .at(5, FrameScript::default())
            .at(30, field(tray_of(&[Role::Medic]), false));

        // 11 misses (frames 5..=15) end the battle before frame 30 is reached
        let clips = slice(perception, 40, 1.0);
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].end_frame, 5);
    }

    #[test]
    fn test_prune_drops_degenerate_and_unchanged() {
        let mut a = Clip::open(0, tray_of(&[Role::Tank, Role::Medic]));
        a.close(10);
        let mut same = Clip::open(10, tray_of(&[Role::Tank, Role::Medic]));
        same.close(20);
        let empty = Clip::open(20, tray_of(&[Role::Tank]));
        let mut b = Clip::open(25, tray_of(&[Role::Tank]));
        b.close(30);

        let kept = prune_clips(vec![a, same, empty, b]);
        let spans: Vec<_> = kept.iter().map(|c| (c.start_frame, c.end_frame)).collect();
        assert_eq!(spans, vec![(0, 10), (25, 30)]);
    }
}
