//! Per-clip battlefield occupancy and deploy facing by majority vote.

use crate::error::{Phase, ReplayError, Result};
use crate::pipeline::Context;
use crate::progress::{track, SubTask};
use crate::vote::Tally;
use replay_capture::{Frame, FrameCursor, FrameSource, Rect};
use replay_data::{Location, Tile};
use replay_state::{BattlefieldOperator, Clip, Direction};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, warn};

pub struct ClipAnalyzer<'a> {
    ctx: Context<'a>,
    tiles: &'a [Tile],
}

impl<'a> ClipAnalyzer<'a> {
    pub fn new(ctx: Context<'a>, tiles: &'a [Tile]) -> Self {
        Self { ctx, tiles }
    }

    /// Fill in `clip.battlefield`, marking tiles not occupied in `prev` as
    /// newcomers with their voted facing.
    pub fn analyze<S: FrameSource>(
        &self,
        cursor: &mut FrameCursor<S>,
        clip: &mut Clip,
        prev: Option<&Clip>,
    ) -> Result<()> {
        track(self.ctx.progress, SubTask::DetectOperators, || {
            self.detect_occupancy(cursor, clip)
        })?;
        self.ctx.progress.completed(
            SubTask::DetectOperators,
            json!({ "start": clip.start_frame, "end": clip.end_frame, "occupied": clip.battlefield.len() }),
        );

        if let Some(prev) = prev {
            self.classify_newcomers(cursor, clip, prev)?;
        }
        Ok(())
    }

    fn detect_occupancy<S: FrameSource>(&self, cursor: &mut FrameCursor<S>, clip: &mut Clip) -> Result<()> {
        let mut tally: Tally<BTreeSet<Location>> = Tally::new();
        let points = sample_points(clip.start_frame, clip.end_frame, self.ctx.config.vote_samples);

        visit_samples(cursor, &points, |frame| {
            let occupied: BTreeSet<Location> = self
                .ctx
                .perception
                .detect_battlefield_units(frame)
                .into_iter()
                .filter_map(|unit| {
                    let loc = tile_for_box(self.tiles, unit.rect, &self.ctx.config.unit_box_move);
                    if loc.is_none() {
                        warn!(
                            "Frame {}: unit box {:?} (score {:.2}) is on no tile",
                            frame.index, unit.rect, unit.score
                        );
                    }
                    loc
                })
                .collect();
            tally.record(occupied);
        })?;

        if tally.tied_at_top() > 1 {
            warn!(
                "Occupancy vote tied in clip {}..{}, keeping the first seen",
                clip.start_frame, clip.end_frame
            );
        }
        let (occupied, votes) = tally.into_modal().ok_or(ReplayError::EmptyOccupancy {
            start: clip.start_frame,
            end: clip.end_frame,
        })?;
        debug!(
            "Clip {}..{} ({} frames): {} occupied ({} votes)",
            clip.start_frame,
            clip.end_frame,
            clip.frame_count(),
            occupied.len(),
            votes
        );

        clip.battlefield = occupied
            .into_iter()
            .map(|loc| (loc, BattlefieldOperator::default()))
            .collect();
        Ok(())
    }

    fn classify_newcomers<S: FrameSource>(
        &self,
        cursor: &mut FrameCursor<S>,
        clip: &mut Clip,
        prev: &Clip,
    ) -> Result<()> {
        let mut votes: Vec<(Location, Tile, Tally<Direction>)> = clip
            .battlefield
            .keys()
            .filter(|loc| !prev.battlefield.contains_key(loc))
            .filter_map(|loc| {
                let tile = self.tiles.iter().find(|t| t.loc == *loc)?;
                Some((*loc, *tile, Tally::new()))
            })
            .collect();
        if votes.is_empty() {
            return Ok(());
        }

        let points = sample_points(clip.start_frame, clip.end_frame, self.ctx.config.vote_samples);
        track(self.ctx.progress, SubTask::ClassifyDirection, || -> Result<()> {
            visit_samples(cursor, &points, |frame| {
                for (_, tile, tally) in votes.iter_mut() {
                    tally.record(self.ctx.perception.classify_direction(frame, tile.pos));
                }
            })?;

            for (loc, _, tally) in votes.drain(..) {
                if tally.tied_at_top() > 1 {
                    warn!("Direction vote tied at {:?}, keeping the first seen", loc);
                }
                let (direction, _) = tally
                    .into_modal()
                    .ok_or(ReplayError::EmptyDirectionVote { location: loc })?;
                clip.battlefield.insert(
                    loc,
                    BattlefieldOperator {
                        direction,
                        newcomer: true,
                    },
                );
            }
            Ok(())
        })?;

        self.ctx.progress.completed(
            SubTask::ClassifyDirection,
            json!({ "newcomers": clip.newcomers().count() }),
        );
        Ok(())
    }
}

/// Evenly spaced sample indices inside `start..end`, keeping one step clear of
/// both ends.
pub fn sample_points(start: usize, end: usize, count: usize) -> Vec<usize> {
    let span = end.saturating_sub(start);
    let step = if span > count + 1 { span / (count + 1) } else { 1 };
    let last = end.saturating_sub(step);
    (start + step..last).step_by(step).take(count).collect()
}

/// The tile whose screen point falls in the shifted box, nearest its centre.
pub fn tile_for_box(tiles: &[Tile], rect: Rect, shift: &Rect) -> Option<Location> {
    let rect = rect.moved(shift);
    let center = rect.center();
    tiles
        .iter()
        .filter(|t| rect.contains(t.pos))
        .min_by_key(|t| t.pos.distance_sq(&center))
        .map(|t| t.loc)
}

fn visit_samples<S: FrameSource>(
    cursor: &mut FrameCursor<S>,
    points: &[usize],
    mut visit: impl FnMut(&Frame),
) -> Result<()> {
    for &index in points {
        let position = cursor.position();
        if position < index {
            cursor.skip(index - position)?;
        } else if position > index {
            cursor.seek(index)?;
        }
        let frame = cursor.next_frame()?.ok_or(ReplayError::StreamExhausted {
            phase: Phase::ClipSampling,
            frame: index,
        })?;
        visit(&frame);
    }
    Ok(())
}
