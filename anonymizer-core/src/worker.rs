//! Background execution of a job.
//!
//! A job (one file or one directory) runs on its own thread. The caller keeps its thread free
//! and receives [`JobEvent`]s: progress while the job runs, then exactly one
//! [`JobEvent::Finished`].

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver},
    },
    thread::{self, JoinHandle},
};

use log::{debug, error};

use crate::{
    batch::{BatchCoordinator, BatchSummary},
    error::{AnonymizeError, Result},
    job::{JobContext, JobOutcome, MediaJob},
    media::{MediaCodec, MediaKind},
    oracle::FaceOracle,
    params::ProcessingParameters,
    progress::{ChannelProgress, ProgressReporter},
};

/// Cooperative cancellation flag, checked between frames and between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a request points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTarget {
    File(PathBuf),
    Directory(PathBuf),
}

impl JobTarget {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::Directory(path) => path,
        }
    }
}

/// A validated selection, ready to be dispatched.
#[derive(Debug, Clone)]
pub struct JobRequest {
    target: JobTarget,
    params: ProcessingParameters,
    parallel_tiles: bool,
}

impl JobRequest {
    /// Turn a front end selection into a request.
    ///
    /// Fails with [`AnonymizeError::Selection`] when the path or the parameters are missing,
    /// the path does not exist, or a selected file is not a supported image or video.
    pub fn from_selection(
        path: Option<PathBuf>,
        params: Option<ProcessingParameters>,
    ) -> Result<Self> {
        let path =
            path.ok_or_else(|| AnonymizeError::Selection("no file or directory selected".into()))?;
        let params =
            params.ok_or_else(|| AnonymizeError::Selection("no processing parameters set".into()))?;

        let target = if path.is_dir() {
            JobTarget::Directory(path)
        } else if path.is_file() {
            if MediaKind::from_path(&path).is_none() {
                return Err(AnonymizeError::Selection(format!(
                    "{} is not a supported image or video",
                    path.display()
                )));
            }
            JobTarget::File(path)
        } else {
            return Err(AnonymizeError::Selection(format!(
                "{} does not exist",
                path.display()
            )));
        };

        Ok(Self {
            target,
            params,
            parallel_tiles: false,
        })
    }

    pub fn with_parallel_tiles(mut self, parallel: bool) -> Self {
        self.parallel_tiles = parallel;
        self
    }

    pub fn target(&self) -> &JobTarget {
        &self.target
    }

    /// Run the request on the current thread.
    pub fn execute(
        &self,
        oracle: &dyn FaceOracle,
        codec: &dyn MediaCodec,
        cancel: &CancelToken,
        progress: &dyn ProgressReporter,
    ) -> Result<JobSummary> {
        let ctx = JobContext::new(oracle, codec, &self.params)
            .with_parallel_tiles(self.parallel_tiles)
            .with_cancel(cancel);

        match &self.target {
            JobTarget::Directory(root) => BatchCoordinator::new(ctx)
                .run(root, progress)
                .map(JobSummary::Batch),
            JobTarget::File(path) => {
                let mut job = MediaJob::for_file(path)?;
                progress.global(0.0, job.kind(), job.source());
                let outcome = job.run(&ctx, progress)?;
                progress.global(1.0, job.kind(), job.source());
                Ok(JobSummary::File(outcome))
            }
        }
    }
}

/// Result of a finished request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSummary {
    File(JobOutcome),
    Batch(BatchSummary),
}

impl JobSummary {
    /// Output file for a single file, output root for a directory.
    pub fn destination(&self) -> &Path {
        match self {
            Self::File(outcome) => &outcome.destination,
            Self::Batch(summary) => &summary.output_root,
        }
    }
}

/// Notification sent from the worker to the caller.
#[derive(Debug)]
pub enum JobEvent {
    Local(f32),
    Global {
        progress: f32,
        kind: MediaKind,
        path: PathBuf,
    },
    Finished(Result<JobSummary>),
}

/// Caller-side view of a running job.
pub struct JobHandle {
    events: Receiver<JobEvent>,
    cancel: CancelToken,
    thread: JoinHandle<()>,
}

impl JobHandle {
    /// Progress and completion events, ending with [`JobEvent::Finished`].
    pub fn events(&self) -> &Receiver<JobEvent> {
        &self.events
    }

    /// Ask the worker to stop at the next frame or file boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the job finishes, ignoring progress.
    pub fn wait(self) -> Result<JobSummary> {
        self.wait_with(|_| {})
    }

    /// Block until the job finishes, handing each progress event to `on_event`.
    pub fn wait_with(self, mut on_event: impl FnMut(&JobEvent)) -> Result<JobSummary> {
        let outcome = loop {
            match self.events.recv() {
                Ok(JobEvent::Finished(result)) => break result,
                Ok(event) => on_event(&event),
                Err(_) => {
                    break Err(AnonymizeError::Worker(
                        "worker exited without a result".into(),
                    ));
                }
            }
        };
        if self.thread.join().is_err() {
            error!("Job worker panicked");
        }
        outcome
    }
}

/// Start `request` on a dedicated worker thread.
pub fn spawn_job(
    request: JobRequest,
    oracle: Arc<dyn FaceOracle>,
    codec: Arc<dyn MediaCodec>,
) -> JobHandle {
    let (sender, events) = mpsc::channel();
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();

    let thread = thread::spawn(move || {
        debug!("Worker started for {}", request.target().path().display());
        let progress = ChannelProgress::new(sender.clone());
        let result = request.execute(oracle.as_ref(), codec.as_ref(), &worker_cancel, &progress);
        if let Err(err) = &result {
            error!("Job failed: {err}");
        }
        let _ = sender.send(JobEvent::Finished(result));
    });

    JobHandle {
        events,
        cancel,
        thread,
    }
}
