use anyhow::{Context, Result};
use replay_capture::{Rect, ScreenRegion};
use replay_vision::ScaleRange;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Resize factors tried when matching a formation avatar to the tray,
/// by unit rarity. Lowest-rarity units are drawn far larger in the tray.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarScales {
    pub default: ScaleRange,
    pub lowest_rarity: ScaleRange,
}

impl AvatarScales {
    pub fn for_rarity(&self, rarity: u8) -> &ScaleRange {
        if rarity == 1 {
            &self.lowest_rarity
        } else {
            &self.default
        }
    }
}

impl Default for AvatarScales {
    fn default() -> Self {
        Self {
            default: ScaleRange {
                start: 1.0,
                end: 1.25,
                step: 0.01,
            },
            lowest_rarity: ScaleRange {
                start: 1.0,
                end: 2.0,
                step: 0.01,
            },
        }
    }
}

/// Tunables for sampling, voting and matching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub roster_fps: f64,
    pub stage_ocr_fps: f64,
    pub deployment_fps: f64,
    /// Consecutive roster samples without growth before the roster is final
    pub roster_stall_limit: usize,
    /// Consecutive not-in-battle samples tolerated before the battle is over
    pub battle_miss_limit: usize,
    /// Samples per occupancy and direction vote
    pub vote_samples: usize,
    /// Part of a tray avatar kept for matching; effects on the formation
    /// screen tend to cover the edges
    pub avatar_roi: ScreenRegion,
    pub avatar_scales: AvatarScales,
    pub deployment_match_threshold: f64,
    pub name_match_threshold: f64,
    /// Applied to every detected unit box before looking up its tile
    pub unit_box_move: Rect,
    pub minimum_required: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            roster_fps: 4.0,
            stage_ocr_fps: 2.0,
            deployment_fps: 5.0,
            roster_stall_limit: 5,
            battle_miss_limit: 10,
            vote_samples: 5,
            avatar_roi: ScreenRegion {
                x: 0.1,
                y: 0.1,
                width: 0.8,
                height: 0.6,
            },
            avatar_scales: AvatarScales::default(),
            deployment_match_threshold: 0.7,
            name_match_threshold: 0.7,
            unit_box_move: Rect::new(0, 0, 0, 0),
            minimum_required: "v4.0.0".to_string(),
        }
    }
}

impl RecognitionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }
}
