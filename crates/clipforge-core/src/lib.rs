//! Task lifecycle runtime for short-clip generation.
//!
//! Requests are resolved against a platform [`ProfileTable`], recorded in a
//! [`TaskStore`] and rendered on a bounded worker pool by a pluggable
//! [`RenderBackend`].  Callers poll for status; a [`RetentionSweeper`]
//! reclaims finished tasks.

pub mod error;
pub mod params;
pub mod profile;
pub mod render;
pub mod runtime;

pub use error::{TaskError, TransitionError, ValidationError};
pub use params::{GenerationParameters, GenerationRequest};
pub use profile::{Overrides, Platform, Profile, ProfileTable, ResolvedParameters};
pub use render::encode::OutputFormat;
pub use render::pattern::PatternRenderer;
pub use render::{ProgressReporter, RenderBackend, RenderError, RenderJob};
pub use runtime::clock::{Clock, ManualClock, SystemClock};
pub use runtime::scheduler::{Scheduler, SchedulerConfig};
pub use runtime::storage::TaskStore;
pub use runtime::sweeper::RetentionSweeper;
pub use runtime::types::{TaskId, TaskRecord, TaskStatus};
