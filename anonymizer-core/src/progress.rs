//! Progress reporting sinks.
//!
//! Jobs report two independent fractions: `local` tracks the file being processed and
//! `global` tracks the batch. A sink is handed to every job call; the pipeline never stores one.

use std::{
    path::{Path, PathBuf},
    sync::mpsc::Sender,
};

use log::info;

use crate::{media::MediaKind, worker::JobEvent};

/// Receives progress updates from a running job.
///
/// Called from the worker thread; implementations must not block for long.
pub trait ProgressReporter: Send + Sync {
    /// Fraction of the current file done, in `[0, 1]`.
    fn local(&self, progress: f32);

    /// Fraction of the batch done, in `[0, 1]`, paired with the file about to be processed.
    fn global(&self, progress: f32, kind: MediaKind, path: &Path);
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn local(&self, _progress: f32) {}

    fn global(&self, _progress: f32, _kind: MediaKind, _path: &Path) {}
}

/// Logs file-level updates at `info` and ignores per-frame noise.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn local(&self, progress: f32) {
        log::trace!("file progress {:.1}%", progress * 100.0);
    }

    fn global(&self, progress: f32, kind: MediaKind, path: &Path) {
        info!(
            "[{:>5.1}%] Processing {kind} {}",
            progress * 100.0,
            path.display()
        );
    }
}

/// Forwards updates as [`JobEvent`]s over a channel.
///
/// A dropped receiver is ignored: progress is advisory and must not fail the job.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: Sender<JobEvent>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<JobEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressReporter for ChannelProgress {
    fn local(&self, progress: f32) {
        let _ = self.sender.send(JobEvent::Local(progress));
    }

    fn global(&self, progress: f32, kind: MediaKind, path: &Path) {
        let _ = self.sender.send(JobEvent::Global {
            progress,
            kind,
            path: path.to_path_buf(),
        });
    }
}

/// Records every update in memory, for inspection after a run.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

/// One update captured by [`RecordingProgress`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Local(f32),
    Global(f32, MediaKind, PathBuf),
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn push(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ProgressReporter for RecordingProgress {
    fn local(&self, progress: f32) {
        self.push(ProgressEvent::Local(progress));
    }

    fn global(&self, progress: f32, kind: MediaKind, path: &Path) {
        self.push(ProgressEvent::Global(progress, kind, path.to_path_buf()));
    }
}

/// Keeps a fraction clamped to `[0, 1]` and never lets it move backwards.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Monotonic {
    last: f32,
}

impl Monotonic {
    pub(crate) fn advance(&mut self, value: f32) -> f32 {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            self.last
        };
        self.last = self.last.max(value);
        self.last
    }
}
