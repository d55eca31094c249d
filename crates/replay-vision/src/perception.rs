use crate::template::{self, TemplateMatch};
use image::RgbaImage;
use replay_capture::{Frame, Point, Rect};
use replay_state::{DeploymentSlot, Direction};

/// A unit recognized on the formation screen
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub name: String,
    pub avatar: RgbaImage,
}

/// The deployment tray as seen on the deploy screen
#[derive(Debug, Clone, Default)]
pub struct TrayReading {
    pub slots: Vec<DeploymentSlot>,
    /// The battle control button is on screen; the battle has started.
    pub pause_visible: bool,
}

/// The deployment tray as seen during battle
#[derive(Debug, Clone, Default)]
pub struct FieldReading {
    pub slots: Vec<DeploymentSlot>,
    /// A unit detail panel covers the battlefield
    pub in_detail_page: bool,
}

/// A unit detected standing on the battlefield
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitBox {
    pub rect: Rect,
    pub score: f64,
}

/// Frame recognizers consumed by the reconstruction pipeline.
///
/// Every call is a pure function of one normalized frame. `None` / empty results
/// mean "not found"; recognizers never fail the run themselves.
pub trait Perception {
    /// Units on the formation screen, or `None` when the screen is not showing.
    fn read_roster(&self, frame: &Frame) -> Option<Vec<RosterEntry>>;

    fn read_stage_name(&self, frame: &Frame) -> Option<String>;

    /// The in-battle UI is visible.
    fn detect_battle_ui(&self, frame: &Frame) -> bool;

    fn detect_deploy_tray(&self, frame: &Frame) -> TrayReading;

    /// `None` when the frame does not show a battle in progress.
    fn detect_on_field(&self, frame: &Frame) -> Option<FieldReading>;

    fn detect_battlefield_units(&self, frame: &Frame) -> Vec<UnitBox>;

    /// Facing of the unit standing on the tile whose base point is `base`.
    fn classify_direction(&self, frame: &Frame, base: Point) -> Direction;

    fn best_template_match(
        &self,
        image: &RgbaImage,
        candidates: &[RgbaImage],
        threshold: f64,
    ) -> Option<TemplateMatch> {
        template::best_match(image, candidates, threshold)
    }
}
