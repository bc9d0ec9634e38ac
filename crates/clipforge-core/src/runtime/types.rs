use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use uuid::Uuid;

use crate::error::TransitionError;
use crate::params::GenerationParameters;

/// Progress recorded when a worker picks a task up.
pub const PROCESSING_START_PROGRESS: u8 = 10;
/// Highest progress reachable while the render is still running.
pub const PROCESSING_END_PROGRESS: u8 = 90;

/// Opaque identifier of a submitted task: a random 128-bit v4 UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a task.
///
/// ```text
/// pending ──> processing ──> completed
///                       └──> failed
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// The tracked state of one task.
///
/// Records handed out by the store are snapshots.  Updates go through
/// [`TaskStore::mutate`](crate::runtime::storage::TaskStore::mutate), which
/// checks the proposed record with [`TaskRecord::validate_successor`] before
/// committing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Percentage in `0..=100`; never decreases.
    pub progress: u8,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Set once, on entering a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    pub parameters: GenerationParameters,
    /// Location of the produced artifact; only on `completed`.
    pub artifact_ref: Option<String>,
    /// Failure description; only on `failed`.
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn new(id: TaskId, parameters: GenerationParameters, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            progress: 0,
            message: "Task created".to_owned(),
            created_at,
            completed_at: None,
            parameters,
            artifact_ref: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `pending -> processing`.
    pub fn start_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Processing)?;
        self.progress = PROCESSING_START_PROGRESS;
        self.message = "Generating video...".to_owned();
        Ok(())
    }

    /// Record render progress, given as a percentage of the render itself.
    ///
    /// The value is mapped into the processing window and only ever raises
    /// the stored progress.
    pub fn report_progress(&mut self, render_percent: u8) -> Result<(), TransitionError> {
        if self.status != TaskStatus::Processing {
            return Err(TransitionError::Frozen {
                status: self.status,
            });
        }
        self.progress = self.progress.max(scale_render_progress(render_percent));
        Ok(())
    }

    /// `processing -> completed`.
    pub fn complete(
        &mut self,
        artifact_ref: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Completed)?;
        self.progress = 100;
        self.message = "Video generated successfully".to_owned();
        self.artifact_ref = Some(artifact_ref.into());
        self.error = None;
        self.completed_at = Some(now.max(self.created_at));
        Ok(())
    }

    /// `processing -> failed`.
    pub fn fail(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed)?;
        let error = error.into();
        self.message = "Video generation failed".to_owned();
        self.error = Some(if error.trim().is_empty() {
            "unknown error".to_owned()
        } else {
            error
        });
        self.artifact_ref = None;
        self.completed_at = Some(now.max(self.created_at));
        Ok(())
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Frozen {
                status: self.status,
            });
        }
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Check that `next` is a legal replacement for `self`.
    pub fn validate_successor(&self, next: &TaskRecord) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return if next == self {
                Ok(())
            } else {
                Err(TransitionError::Frozen {
                    status: self.status,
                })
            };
        }
        if next.id != self.id {
            return Err(TransitionError::ImmutableField { field: "id" });
        }
        if next.created_at != self.created_at {
            return Err(TransitionError::ImmutableField {
                field: "created_at",
            });
        }
        if next.parameters != self.parameters {
            return Err(TransitionError::ImmutableField {
                field: "parameters",
            });
        }
        if next.status != self.status && !self.status.can_transition_to(next.status) {
            return Err(TransitionError::Illegal {
                from: self.status,
                to: next.status,
            });
        }
        if next.progress < self.progress {
            return Err(TransitionError::ProgressRegressed {
                from: self.progress,
                to: next.progress,
            });
        }
        if next.progress > 100 {
            return Err(TransitionError::Inconsistent("progress above 100"));
        }
        if (next.progress == 100) != (next.status == TaskStatus::Completed) {
            return Err(TransitionError::Inconsistent(
                "progress is 100 exactly when completed",
            ));
        }

        match next.status {
            TaskStatus::Completed => {
                if next.artifact_ref.is_none() || next.error.is_some() {
                    return Err(TransitionError::Inconsistent(
                        "completed task needs an artifact and no error",
                    ));
                }
            }
            TaskStatus::Failed => {
                if next.error.as_deref().is_none_or(str::is_empty) || next.artifact_ref.is_some() {
                    return Err(TransitionError::Inconsistent(
                        "failed task needs an error and no artifact",
                    ));
                }
            }
            TaskStatus::Pending | TaskStatus::Processing => {
                if next.artifact_ref.is_some() || next.error.is_some() {
                    return Err(TransitionError::Inconsistent(
                        "outcome set before reaching a terminal state",
                    ));
                }
            }
        }

        match next.completed_at {
            Some(_) if !next.status.is_terminal() => Err(TransitionError::Inconsistent(
                "completed_at set on a non-terminal task",
            )),
            Some(at) if at < next.created_at => Err(TransitionError::Inconsistent(
                "completed_at precedes created_at",
            )),
            None if next.status.is_terminal() => Err(TransitionError::Inconsistent(
                "terminal task without completed_at",
            )),
            _ => Ok(()),
        }
    }
}

/// Map a render percentage (`0..=100`) into the processing window.
pub fn scale_render_progress(render_percent: u8) -> u8 {
    let span = u16::from(PROCESSING_END_PROGRESS - PROCESSING_START_PROGRESS);
    let scaled = u16::from(render_percent.min(100)) * span / 100;
    PROCESSING_START_PROGRESS + scaled as u8
}
