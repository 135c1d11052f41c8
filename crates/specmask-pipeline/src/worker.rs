//! Background mask generation.
//!
//! Interactive previews must not block the caller while a large scan is
//! processed. [`spawn_generation`] runs one generation on a dedicated
//! thread and hands back a [`PendingMask`]. Cancellation is cooperative:
//! the running generator checks its [`CancelToken`] between stages.
//!
//! [`PreviewScheduler`] layers stale-result protection on top: every
//! request gets a generation number, and a newer request cancels and
//! supersedes the previous one so its result is never delivered.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};

use image::GrayImage;

use crate::generator::MaskGenerator;
use crate::types::MaskError;

/// Outcome of a generation: `None` when no image was selected.
pub type MaskResult = Result<Option<GrayImage>, MaskError>;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::Cancelled`] if the token is cancelled.
    pub fn check(&self) -> Result<(), MaskError> {
        if self.is_cancelled() {
            Err(MaskError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Handle to a generation running on a worker thread.
#[derive(Debug)]
pub struct PendingMask {
    receiver: Receiver<MaskResult>,
    cancel: CancelToken,
}

impl PendingMask {
    /// Block until the worker finishes.
    ///
    /// # Errors
    ///
    /// Returns the generation's error, or [`MaskError::Worker`] if the
    /// worker thread ended without reporting.
    pub fn wait(self) -> MaskResult {
        self.receiver
            .recv()
            .map_err(|_| MaskError::Worker("worker exited without a result".to_string()))?
    }

    /// The result if the worker has finished, without blocking.
    ///
    /// The result is handed out once; later calls report a worker error.
    #[must_use]
    pub fn try_result(&self) -> Option<MaskResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(MaskError::Worker(
                "worker result already taken or lost".to_string(),
            ))),
        }
    }

    /// Ask the worker to stop at the next stage boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The token shared with the worker.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Run `generator` on `path` in a new worker thread.
///
/// # Errors
///
/// Returns [`MaskError::Worker`] if the thread cannot be spawned.
pub fn spawn_generation(
    generator: MaskGenerator,
    path: Option<PathBuf>,
) -> Result<PendingMask, MaskError> {
    spawn_generation_with_token(generator, path, CancelToken::new())
}

/// [`spawn_generation`] with a caller-provided cancellation token.
///
/// # Errors
///
/// Returns [`MaskError::Worker`] if the thread cannot be spawned.
pub fn spawn_generation_with_token(
    generator: MaskGenerator,
    path: Option<PathBuf>,
    cancel: CancelToken,
) -> Result<PendingMask, MaskError> {
    let (sender, receiver) = mpsc::channel();
    let token = cancel.clone();
    std::thread::Builder::new()
        .name(format!("specmask-{}", generator.name()))
        .spawn(move || {
            let result = generator.generate_cancellable(path.as_deref(), &token);
            // The receiver may have been dropped by a caller that lost
            // interest; nothing to report then.
            let _ = sender.send(result);
        })
        .map_err(|e| MaskError::Worker(e.to_string()))?;
    Ok(PendingMask { receiver, cancel })
}

/// A finished preview together with the request that produced it.
#[derive(Debug)]
pub struct PreviewResult {
    /// Generation number returned by [`PreviewScheduler::request`].
    pub generation: u64,
    /// The mask or error.
    pub result: MaskResult,
}

/// Keeps at most one preview in flight and drops superseded results.
#[derive(Debug, Default)]
pub struct PreviewScheduler {
    latest: u64,
    pending: Option<PendingMask>,
}

impl PreviewScheduler {
    /// An idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a preview, cancelling any preview still running.
    ///
    /// Returns the generation number of the new request.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::Worker`] if the worker cannot be spawned.
    pub fn request(
        &mut self,
        generator: MaskGenerator,
        path: Option<PathBuf>,
    ) -> Result<u64, MaskError> {
        if let Some(previous) = self.pending.take() {
            previous.cancel();
            tracing::debug!(generation = self.latest, "superseded preview cancelled");
        }
        self.install(spawn_generation(generator, path))
    }

    /// Record a freshly spawned preview. The generation number only
    /// advances when the worker actually started.
    fn install(&mut self, spawned: Result<PendingMask, MaskError>) -> Result<u64, MaskError> {
        let pending = spawned?;
        self.latest += 1;
        self.pending = Some(pending);
        Ok(self.latest)
    }

    /// Generation number of the most recent request (0 before any).
    #[must_use]
    pub const fn latest_generation(&self) -> u64 {
        self.latest
    }

    /// Whether `generation` is still the most recent request.
    #[must_use]
    pub const fn is_current(&self, generation: u64) -> bool {
        generation == self.latest
    }

    /// Whether a preview is still outstanding.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// The latest preview's result if it has finished.
    pub fn poll(&mut self) -> Option<PreviewResult> {
        let result = self.pending.as_ref()?.try_result()?;
        self.pending = None;
        Some(PreviewResult {
            generation: self.latest,
            result,
        })
    }

    /// Block until the latest preview finishes.
    ///
    /// Returns `None` when nothing is outstanding.
    pub fn wait(&mut self) -> Option<PreviewResult> {
        let pending = self.pending.take()?;
        Some(PreviewResult {
            generation: self.latest,
            result: pending.wait(),
        })
    }

    /// Cancel the outstanding preview, if any, and forget it.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
    }
}
