mod log;

use image::RgbaImage;
use replay_data::{Location, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use log::{CopilotDocument, DocInfo, Event, EventLog, OperUsage};

/// Name given to a tray slot whose avatar matched no known unit
pub const UNKNOWN_DEPLOYMENT: &str = "UnknownDeployment";

/// Name given to a newly occupied tile with no departed tray unit left to pair with
pub const UNKNOWN_DEPLOYED: &str = "UnknownDeployed";

/// Facing chosen when a unit is placed. Serializes as its integer id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Direction {
    Right,
    Down,
    Left,
    Up,
    #[default]
    None,
}

impl From<Direction> for u8 {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Right => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Up => 3,
            Direction::None => 4,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(Direction::Right),
            1 => Ok(Direction::Down),
            2 => Ok(Direction::Left),
            3 => Ok(Direction::Up),
            4 => Ok(Direction::None),
            other => Err(format!("invalid direction id {}", other)),
        }
    }
}

/// A unit waiting in the deployment tray at a sampled instant
#[derive(Debug, Clone)]
pub struct DeploymentSlot {
    /// Resolved lazily from the avatar; `None` until first needed.
    pub name: Option<String>,
    pub avatar: RgbaImage,
    pub role: Role,
    pub index: usize,
    pub cooling: bool,
}

impl DeploymentSlot {
    pub fn new(index: usize, role: Role, avatar: RgbaImage, cooling: bool) -> Self {
        Self {
            name: None,
            avatar,
            role,
            index,
            cooling,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

/// What a clip knows about one occupied tile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BattlefieldOperator {
    pub direction: Direction,
    /// Occupied here but not in the previous clip
    pub newcomer: bool,
}

/// A stretch of frames over which the tray and the battlefield stay the same
#[derive(Debug, Clone)]
pub struct Clip {
    pub start_frame: usize,
    pub end_frame: usize,
    pub deployment: Vec<DeploymentSlot>,
    /// Number of tray slots on cooldown in the recorded `deployment`
    pub cooling: usize,
    pub battlefield: BTreeMap<Location, BattlefieldOperator>,
}

impl Clip {
    /// Start a clip at `frame` seeded with the tray seen there.
    pub fn open(frame: usize, deployment: Vec<DeploymentSlot>) -> Self {
        let cooling = count_cooling(&deployment);
        Self {
            start_frame: frame,
            end_frame: frame,
            deployment,
            cooling,
            battlefield: BTreeMap::new(),
        }
    }

    pub fn close(&mut self, frame: usize) {
        self.end_frame = frame;
    }

    /// Replace the recorded tray with `deployment` if it has the same size and
    /// fewer units on cooldown. Returns whether the replacement happened.
    pub fn refine(&mut self, deployment: Vec<DeploymentSlot>) -> bool {
        let cooling = count_cooling(&deployment);
        if deployment.len() != self.deployment.len() || cooling >= self.cooling {
            return false;
        }
        self.deployment = deployment;
        self.cooling = cooling;
        true
    }

    pub fn frame_count(&self) -> usize {
        self.end_frame.saturating_sub(self.start_frame)
    }

    pub fn is_degenerate(&self) -> bool {
        self.start_frame >= self.end_frame
    }

    /// Same tray size and the same role in every slot.
    pub fn same_roles(&self, other: &Clip) -> bool {
        self.deployment.len() == other.deployment.len()
            && self
                .deployment
                .iter()
                .zip(&other.deployment)
                .all(|(a, b)| a.role == b.role)
    }

    pub fn newcomers(&self) -> impl Iterator<Item = (&Location, &BattlefieldOperator)> {
        self.battlefield.iter().filter(|(_, op)| op.newcomer)
    }
}

pub fn count_cooling(deployment: &[DeploymentSlot]) -> usize {
    deployment.iter().filter(|s| s.cooling).count()
}
