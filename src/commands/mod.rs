mod analyze;

pub use analyze::{analyze, AnalyzeArgs};
