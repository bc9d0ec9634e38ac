//! The render backend seam.
//!
//! The runtime treats rendering as an opaque, blocking call: it hands a
//! [`RenderJob`] to a [`RenderBackend`] on the blocking pool and gets back the
//! path of the produced artifact.  [`pattern::PatternRenderer`] is the
//! built-in placeholder backend.

pub mod encode;
pub mod pattern;

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::watch;

use crate::params::GenerationParameters;
use crate::runtime::types::TaskId;

/// One render invocation.  Each call gets its own copy of the parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub task_id: TaskId,
    pub parameters: GenerationParameters,
}

/// A generation backend.
///
/// `render` is synchronous and may be CPU-heavy; it is always called from
/// `tokio::task::spawn_blocking`.  Any closure with a matching signature is a
/// backend too.
pub trait RenderBackend: Send + Sync + 'static {
    fn render(&self, job: &RenderJob, progress: &ProgressReporter) -> Result<PathBuf, RenderError>;
}

impl<F> RenderBackend for F
where
    F: Fn(&RenderJob, &ProgressReporter) -> Result<PathBuf, RenderError> + Send + Sync + 'static,
{
    fn render(&self, job: &RenderJob, progress: &ProgressReporter) -> Result<PathBuf, RenderError> {
        self(job, progress)
    }
}

/// Reports how far a render has got, as a percentage of the render itself.
///
/// Values are clamped to `0..=100` and never go down; repeated values are
/// coalesced so the scheduler only wakes on real changes.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<u8>,
}

impl ProgressReporter {
    /// Create a reporter together with the receiving side.
    pub fn channel() -> (Self, watch::Receiver<u8>) {
        let (tx, rx) = watch::channel(0);
        (Self { tx }, rx)
    }

    /// A reporter nobody listens to.
    pub fn detached() -> Self {
        Self::channel().0
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }

    /// Report `done` out of `total` units of work.
    pub fn report_fraction(&self, done: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            (done.min(total) * 100 / total) as u8
        };
        self.report(percent);
    }

    pub fn current(&self) -> u8 {
        *self.tx.borrow()
    }
}

/// Failure inside a render backend.  Recorded on the task, never returned to
/// the submitter.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("{0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_clamps_and_never_decreases() {
        let (reporter, rx) = ProgressReporter::channel();
        reporter.report(40);
        reporter.report(20);
        assert_eq!(*rx.borrow(), 40);
        reporter.report(250);
        assert_eq!(reporter.current(), 100);
    }

    #[test]
    fn fraction_handles_empty_work() {
        let reporter = ProgressReporter::detached();
        reporter.report_fraction(3, 12);
        assert_eq!(reporter.current(), 25);
        reporter.report_fraction(0, 0);
        assert_eq!(reporter.current(), 100);
    }

    #[test]
    fn closures_are_backends() {
        let backend = |job: &RenderJob, progress: &ProgressReporter| -> Result<PathBuf, RenderError> {
            progress.report(100);
            Ok(PathBuf::from(format!("{}.gif", job.task_id)))
        };
        let params = crate::params::GenerationRequest::new("sky")
            .resolve(&crate::profile::ProfileTable::default())
            .unwrap();
        let job = RenderJob {
            task_id: TaskId::random(),
            parameters: params,
        };
        let path = backend.render(&job, &ProgressReporter::detached()).unwrap();
        assert!(path.to_string_lossy().ends_with(".gif"));
    }
}
