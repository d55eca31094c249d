//! Perception driven by a prepared per-frame script instead of pixel analysis.
//!
//! A script entry applies from its starting frame until the next entry, so a
//! recording only needs one entry per change on screen. Scripts can be built
//! in code or loaded from a JSON transcript whose avatars are image files.

use crate::perception::{FieldReading, Perception, RosterEntry, TrayReading, UnitBox};
use anyhow::{Context, Result};
use image::RgbaImage;
use replay_capture::{Frame, Point, Rect};
use replay_data::Role;
use replay_state::{DeploymentSlot, Direction};
use serde::Deserialize;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything the recognizers report from a given frame onward
#[derive(Debug, Clone, Default)]
pub struct FrameScript {
    pub roster: Option<Vec<RosterEntry>>,
    pub stage_name: Option<String>,
    pub battle_ui: bool,
    pub tray: TrayReading,
    pub field: Option<FieldReading>,
    pub units: Vec<UnitBox>,
    pub directions: Vec<(Point, Direction)>,
}

#[derive(Debug, Default)]
pub struct ScriptedPerception {
    scripts: BTreeMap<usize, FrameScript>,
    roster_reads: Cell<usize>,
}

impl ScriptedPerception {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `script` for `from_frame` and every later frame up to the next entry.
    pub fn at(mut self, from_frame: usize, script: FrameScript) -> Self {
        self.scripts.insert(from_frame, script);
        self
    }

    /// How many times the roster recognizer has been called.
    pub fn roster_reads(&self) -> usize {
        self.roster_reads.get()
    }

    fn script(&self, frame: &Frame) -> Option<&FrameScript> {
        self.scripts
            .range(..=frame.index)
            .next_back()
            .map(|(_, s)| s)
    }

    /// Load a JSON transcript. Avatar paths are relative to the transcript file.
    pub fn from_transcript(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript {}", path.display()))?;
        let transcript: Transcript = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse transcript {}", path.display()))?;

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut avatars = AvatarCache::new(base);
        let mut perception = Self::new();

        for entry in transcript.frames {
            let roster = match entry.roster {
                Some(list) => Some(
                    list.into_iter()
                        .map(|a| {
                            Ok(RosterEntry {
                                avatar: avatars.load(&a.avatar)?,
                                name: a.name,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                ),
                None => None,
            };
            let tray = match entry.tray {
                Some(t) => TrayReading {
                    slots: avatars.slots(t.slots)?,
                    pause_visible: t.pause_visible,
                },
                None => TrayReading::default(),
            };
            let field = match entry.field {
                Some(f) => Some(FieldReading {
                    slots: avatars.slots(f.slots)?,
                    in_detail_page: f.in_detail_page,
                }),
                None => None,
            };

            perception = perception.at(
                entry.from,
                FrameScript {
                    roster,
                    stage_name: entry.stage_name,
                    battle_ui: entry.battle_ui,
                    tray,
                    field,
                    units: entry
                        .units
                        .into_iter()
                        .map(|rect| UnitBox { rect, score: 1.0 })
                        .collect(),
                    directions: entry
                        .directions
                        .into_iter()
                        .map(|d| (d.at, d.direction))
                        .collect(),
                },
            );
        }

        info!(
            "Transcript loaded: {} entries, {} avatar images",
            perception.scripts.len(),
            avatars.images.len()
        );
        Ok(perception)
    }
}

impl Perception for ScriptedPerception {
    fn read_roster(&self, frame: &Frame) -> Option<Vec<RosterEntry>> {
        self.roster_reads.set(self.roster_reads.get() + 1);
        self.script(frame)?.roster.clone()
    }

    fn read_stage_name(&self, frame: &Frame) -> Option<String> {
        self.script(frame)?.stage_name.clone()
    }

    fn detect_battle_ui(&self, frame: &Frame) -> bool {
        self.script(frame).map_or(false, |s| s.battle_ui)
    }

    fn detect_deploy_tray(&self, frame: &Frame) -> TrayReading {
        self.script(frame)
            .map(|s| s.tray.clone())
            .unwrap_or_default()
    }

    fn detect_on_field(&self, frame: &Frame) -> Option<FieldReading> {
        self.script(frame)?.field.clone()
    }

    fn detect_battlefield_units(&self, frame: &Frame) -> Vec<UnitBox> {
        self.script(frame)
            .map(|s| s.units.clone())
            .unwrap_or_default()
    }

    fn classify_direction(&self, frame: &Frame, base: Point) -> Direction {
        self.script(frame)
            .and_then(|s| s.directions.iter().find(|(p, _)| *p == base))
            .map(|(_, d)| *d)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Transcript {
    frames: Vec<TranscriptFrame>,
}

#[derive(Debug, Deserialize)]
struct TranscriptFrame {
    from: usize,
    roster: Option<Vec<TranscriptAvatar>>,
    stage_name: Option<String>,
    #[serde(default)]
    battle_ui: bool,
    tray: Option<TranscriptTray>,
    field: Option<TranscriptField>,
    #[serde(default)]
    units: Vec<Rect>,
    #[serde(default)]
    directions: Vec<TranscriptDirection>,
}

#[derive(Debug, Deserialize)]
struct TranscriptAvatar {
    name: String,
    avatar: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TranscriptSlot {
    avatar: PathBuf,
    role: Role,
    #[serde(default)]
    cooling: bool,
}

#[derive(Debug, Deserialize)]
struct TranscriptTray {
    #[serde(default)]
    pause_visible: bool,
    slots: Vec<TranscriptSlot>,
}

#[derive(Debug, Deserialize)]
struct TranscriptField {
    #[serde(default)]
    in_detail_page: bool,
    slots: Vec<TranscriptSlot>,
}

#[derive(Debug, Deserialize)]
struct TranscriptDirection {
    at: Point,
    direction: Direction,
}

/// Avatar images referenced by a transcript, each decoded once
struct AvatarCache {
    base: PathBuf,
    images: HashMap<PathBuf, RgbaImage>,
}

impl AvatarCache {
    fn new(base: PathBuf) -> Self {
        Self {
            base,
            images: HashMap::new(),
        }
    }

    fn load(&mut self, rel: &Path) -> Result<RgbaImage> {
        let path = self.base.join(rel);
        if let Some(img) = self.images.get(&path) {
            return Ok(img.clone());
        }
        let img = image::open(&path)
            .with_context(|| format!("Failed to open avatar {}", path.display()))?
            .to_rgba8();
        self.images.insert(path, img.clone());
        Ok(img)
    }

    fn slots(&mut self, slots: Vec<TranscriptSlot>) -> Result<Vec<DeploymentSlot>> {
        slots
            .into_iter()
            .enumerate()
            .map(|(index, s)| {
                Ok(DeploymentSlot::new(
                    index,
                    s.role,
                    self.load(&s.avatar)?,
                    s.cooling,
                ))
            })
            .collect()
    }
}
