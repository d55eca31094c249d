pub mod perception;
pub mod scripted;
pub mod template;

pub use perception::{FieldReading, Perception, RosterEntry, TrayReading, UnitBox};
pub use scripted::{FrameScript, ScriptedPerception};
pub use template::{best_match, scaled_templates, ScaleRange, TemplateMatch};
