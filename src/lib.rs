mod clip_analyzer;
mod commands;
mod config;
mod error;
mod names;
mod phases;
mod pipeline;
mod progress;
mod reconstruct;
mod slicer;
mod vote;

pub use clip_analyzer::{sample_points, tile_for_box, ClipAnalyzer};
pub use commands::{analyze, AnalyzeArgs};
pub use config::{AvatarScales, RecognitionConfig};
pub use error::{Phase, ReplayError, Result};
pub use names::AvatarBook;
pub use phases::{Briefing, PhaseSegmenter};
pub use pipeline::{Context, Pipeline};
pub use progress::{track, NullProgress, ProgressEvent, ProgressKind, ProgressSink, SubTask};
pub use reconstruct::ChangeReconstructor;
pub use slicer::{prune_clips, ClipSegmenter};
pub use vote::Tally;

use clap::Parser;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "combat_replay=debug,replay_capture=info,replay_vision=info".into()
            }),
        )
        .init();

    let args = AnalyzeArgs::parse();
    let path = analyze(args).await?;
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::RecognitionConfig;
    use crate::names::AvatarBook;
    use crate::pipeline::Context;
    use crate::progress::NullProgress;
    use image::{Rgba, RgbaImage};
    use replay_capture::Point;
    use replay_data::{GameData, Location, Role, Tile};
    use replay_state::DeploymentSlot;
    use replay_vision::{RosterEntry, ScriptedPerception};

    pub const TILE_A: (Location, Point) = (Location { x: 2, y: 3 }, Point { x: 400, y: 300 });
    pub const TILE_B: (Location, Point) = (Location { x: 4, y: 1 }, Point { x: 600, y: 150 });

    /// Deterministic high-contrast texture; different seeds do not correlate
    pub fn noise(seed: u32, width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let mut h = seed
                .wrapping_mul(0x9E37_79B1)
                .wrapping_add(x.wrapping_mul(0x85EB_CA77))
                .wrapping_add(y.wrapping_mul(0xC2B2_AE3D));
            h ^= h >> 15;
            h = h.wrapping_mul(0x2C1B_3C6D);
            h ^= h >> 16;
            let v = (h & 0xFF) as u8;
            Rgba([v, v, v, 255])
        })
    }

    /// Roster entries whose avatars are `noise(i + 1)`
    pub fn roster(names: &[&str]) -> Vec<RosterEntry> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| RosterEntry {
                name: name.to_string(),
                avatar: noise(i as u32 + 1, 40, 40),
            })
            .collect()
    }

    pub fn slot(index: usize, role: Role, cooling: bool) -> DeploymentSlot {
        DeploymentSlot::new(index, role, RgbaImage::new(1, 1), cooling)
    }

    pub fn tray_of(roles: &[Role]) -> Vec<DeploymentSlot> {
        roles
            .iter()
            .enumerate()
            .map(|(i, role)| slot(i, *role, false))
            .collect()
    }

    pub fn named_tray(units: &[(&str, Role)]) -> Vec<DeploymentSlot> {
        units
            .iter()
            .enumerate()
            .map(|(i, (name, role))| slot(i, *role, false).named(name))
            .collect()
    }

    pub fn tiles() -> Vec<Tile> {
        [TILE_A, TILE_B]
            .into_iter()
            .map(|(loc, pos)| Tile { loc, pos })
            .collect()
    }

    /// Game data for units A (sniper), B (tank), C (caster) on stage "1-7"
    pub struct Fixture {
        pub perception: ScriptedPerception,
        pub data: GameData,
        pub config: RecognitionConfig,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self::with_perception(ScriptedPerception::new())
        }

        pub fn with_perception(perception: ScriptedPerception) -> Self {
            let mut data = GameData::default();
            data.insert_unit("A", Role::Sniper, 5);
            data.insert_unit("B", Role::Tank, 4);
            data.insert_unit("C", Role::Caster, 6);
            data.insert_stage("1-7", tiles());
            Self {
                perception,
                data,
                config: RecognitionConfig::default(),
            }
        }

        pub fn ctx(&self) -> Context<'_> {
            Context {
                perception: &self.perception,
                data: &self.data,
                config: &self.config,
                progress: &NullProgress,
            }
        }

        /// Unnamed tray slots showing A and B
        pub fn tray(&self) -> Vec<DeploymentSlot> {
            vec![
                DeploymentSlot::new(0, Role::Sniper, noise(1, 40, 40), false),
                DeploymentSlot::new(1, Role::Tank, noise(2, 40, 40), false),
            ]
        }

        pub fn book(&self) -> AvatarBook {
            AvatarBook::build(&self.ctx(), &roster(&["A", "B"]), &self.tray())
        }
    }
}
