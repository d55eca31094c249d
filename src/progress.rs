//! Observational progress notifications.
//!
//! Notifications are fire-and-forget: a sink cannot refuse, block or steer the
//! pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubTask {
    OcrFormation,
    OcrStage,
    MatchDeployment,
    Slice,
    DetectOperators,
    ClassifyDirection,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressKind {
    Start,
    Completed,
    Error,
    ExtraInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub task: SubTask,
    pub details: Value,
}

pub trait ProgressSink {
    fn notify(&self, event: ProgressEvent);

    fn start(&self, task: SubTask) {
        self.notify(ProgressEvent {
            kind: ProgressKind::Start,
            task,
            details: Value::Null,
        });
    }

    fn completed(&self, task: SubTask, details: Value) {
        self.notify(ProgressEvent {
            kind: ProgressKind::Completed,
            task,
            details,
        });
    }

    fn error(&self, task: SubTask) {
        self.notify(ProgressEvent {
            kind: ProgressKind::Error,
            task,
            details: Value::Null,
        });
    }

    fn extra_info(&self, task: SubTask, details: Value) {
        self.notify(ProgressEvent {
            kind: ProgressKind::ExtraInfo,
            task,
            details,
        });
    }
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn notify(&self, event: ProgressEvent) {
        // Receiver gone means nobody is watching
        let _ = self.send(event);
    }
}

/// Report `Start` for `task`, run `f`, and report `Error` if it fails.
/// Completion carries task-specific details, so callers send it themselves.
pub fn track<T, E>(
    sink: &dyn ProgressSink,
    task: SubTask,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    sink.start(task);
    let result = f();
    if result.is_err() {
        sink.error(task);
    }
    result
}

/// Discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn notify(&self, _event: ProgressEvent) {}
}
