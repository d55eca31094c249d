//! Error types for record reconstruction.

use replay_capture::CaptureError;
use replay_data::Location;
use std::fmt;
use thiserror::Error;

/// Result type for the reconstruction pipeline.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// The forward phases the recording is walked through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Roster,
    Stage,
    DeployScreen,
    ClipSampling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Roster => "roster",
            Phase::Stage => "stage",
            Phase::DeployScreen => "deploy screen",
            Phase::ClipSampling => "clip sampling",
        };
        f.write_str(name)
    }
}

/// Errors that abort a reconstruction run. No partial output is written.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("recording ended during the {phase} phase at frame {frame}")]
    StreamExhausted { phase: Phase, frame: usize },

    #[error("frame source failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("no roster units were recognized")]
    EmptyRoster,

    #[error("unknown stage: {0:?}")]
    UnknownStage(String),

    #[error("battle started at frame {frame} before the stage name was recognized")]
    BattleStartedBeforeStage { frame: usize },

    #[error("no roster unit matched the deployment tray")]
    NoDeploymentMatch,

    #[error("no occupancy samples in clip {start}..{end}")]
    EmptyOccupancy { start: usize, end: usize },

    #[error("no direction samples for tile ({}, {})", location.x, location.y)]
    EmptyDirectionVote { location: Location },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
