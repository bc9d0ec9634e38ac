use std::sync::Arc;

use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::error::TaskError;
use crate::params::{GenerationParameters, GenerationRequest};
use crate::profile::ProfileTable;
use crate::render::{ProgressReporter, RenderBackend, RenderJob};
use crate::runtime::clock::Clock;
use crate::runtime::storage::TaskStore;
use crate::runtime::sweeper::RetentionSweeper;
use crate::runtime::types::{TaskId, TaskRecord, TaskStatus};

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of renders allowed to run at the same time.
    pub workers: usize,
    pub profiles: ProfileTable,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            profiles: ProfileTable::default(),
        }
    }
}

/// A unit of work queued for the pool.
#[derive(Debug)]
struct WorkUnit {
    task_id: TaskId,
    parameters: GenerationParameters,
}

/// Accepts generation requests and runs them on a bounded worker pool.
///
/// `submit` only resolves parameters, inserts a `pending` record and queues
/// the work; it never waits for a free worker.  Workers pull from one shared
/// queue, so at most `workers` renders run concurrently and the rest stay
/// `pending` until a slot frees up.
///
/// Renders run to completion; there is no cancellation.
///
/// # Usage
///
/// ```rust,ignore
/// let scheduler = Scheduler::start(SchedulerConfig::default(), backend, Arc::new(SystemClock));
/// let task_id = scheduler.submit(GenerationRequest::new("a red sunset")).await?;
/// let record = scheduler.status(task_id).await?;
/// ```
#[derive(Clone, Debug)]
pub struct Scheduler {
    store: TaskStore,
    profiles: Arc<ProfileTable>,
    clock: Arc<dyn Clock>,
    work_tx: flume::Sender<WorkUnit>,
    workers: usize,
}

impl Scheduler {
    /// Spawn the worker pool and return a handle.
    ///
    /// Must be called from within a Tokio runtime.  Dropping every clone of
    /// the handle closes the queue; workers finish what is queued and exit.
    pub fn start(
        config: SchedulerConfig,
        backend: Arc<dyn RenderBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (work_tx, work_rx) = flume::unbounded::<WorkUnit>();
        let store = TaskStore::new();
        let workers = config.workers.max(1);

        let worker = Worker {
            store: store.clone(),
            backend,
            clock: Arc::clone(&clock),
        };
        for worker_id in 0..workers {
            let rx = work_rx.clone();
            let worker = worker.clone();
            tokio::spawn(async move {
                worker.run_loop(worker_id, rx).await;
            });
        }
        info!(workers, "scheduler started");

        Self {
            store,
            profiles: Arc::new(config.profiles),
            clock,
            work_tx,
            workers,
        }
    }

    /// Validate `request`, record a `pending` task and queue it.
    ///
    /// Validation failures create no record.
    pub async fn submit(&self, request: GenerationRequest) -> Result<TaskId, TaskError> {
        let parameters = request.resolve(&self.profiles)?;
        let resolved = parameters.resolved;
        let task_id = self.store.create(parameters.clone(), self.clock.now()).await;

        if self
            .work_tx
            .send(WorkUnit {
                task_id,
                parameters,
            })
            .is_err()
        {
            self.store.delete(task_id).await;
            error!(%task_id, "work queue closed; task rejected");
            return Err(TaskError::SchedulerShutdown);
        }

        info!(
            %task_id,
            platform = %resolved.platform,
            width = resolved.width,
            height = resolved.height,
            fps = resolved.fps,
            duration = resolved.duration,
            "task submitted"
        );
        Ok(task_id)
    }

    /// Snapshot of one task.
    pub async fn status(&self, task_id: TaskId) -> Result<TaskRecord, TaskError> {
        self.store
            .get(task_id)
            .await
            .ok_or(TaskError::NotFound { task_id })
    }

    /// Every tracked task, newest first.
    pub async fn list(&self) -> Vec<TaskRecord> {
        let mut records = self.store.list_all().await;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Drop terminal tasks that finished more than `hours` ago.
    pub async fn purge_older_than(&self, hours: u64) -> usize {
        self.sweeper().purge_older_than(hours).await
    }

    pub fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.store.clone(), Arc::clone(&self.clock))
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

/// State shared by every worker loop.
#[derive(Clone)]
struct Worker {
    store: TaskStore,
    backend: Arc<dyn RenderBackend>,
    clock: Arc<dyn Clock>,
}

impl Worker {
    async fn run_loop(self, worker_id: usize, rx: flume::Receiver<WorkUnit>) {
        debug!(worker_id, "worker started");
        while let Ok(unit) = rx.recv_async().await {
            let task_id = unit.task_id;
            // Run each unit in its own task so a panic in bookkeeping is
            // contained to that task.
            let handle = tokio::spawn(self.clone().execute(unit));
            if let Err(err) = handle.await {
                self.record_fault(task_id, describe_join_error(&err)).await;
            }
        }
        debug!(worker_id, "work queue closed; worker exiting");
    }

    async fn execute(self, unit: WorkUnit) {
        let WorkUnit {
            task_id,
            parameters,
        } = unit;

        if let Err(err) = self.store.mutate(task_id, TaskRecord::start_processing).await {
            self.record_fault(task_id, format!("could not start task: {err}"))
                .await;
            return;
        }
        info!(%task_id, "task processing");

        let (reporter, mut progress_rx) = ProgressReporter::channel();
        let backend = Arc::clone(&self.backend);
        let job = RenderJob {
            task_id,
            parameters,
        };
        let mut render = tokio::task::spawn_blocking(move || backend.render(&job, &reporter));

        let outcome = loop {
            tokio::select! {
                joined = &mut render => break joined,
                changed = progress_rx.changed() => match changed {
                    Ok(()) => {
                        let percent = *progress_rx.borrow_and_update();
                        self.forward_progress(task_id, percent).await;
                    }
                    // Reporter dropped: the render closure has returned.
                    Err(_) => break (&mut render).await,
                },
            }
        };

        match outcome {
            Ok(Ok(path)) => {
                let artifact = path.to_string_lossy().into_owned();
                let now = self.clock.now();
                match self
                    .store
                    .mutate(task_id, |record| record.complete(artifact, now))
                    .await
                {
                    Ok(record) => info!(
                        %task_id,
                        artifact = record.artifact_ref.as_deref().unwrap_or_default(),
                        "task completed"
                    ),
                    Err(err) => {
                        self.record_fault(task_id, format!("could not record completion: {err}"))
                            .await
                    }
                }
            }
            Ok(Err(err)) => {
                warn!(%task_id, error = %err, "render failed");
                self.record_failure(task_id, err.to_string()).await;
            }
            Err(err) => {
                self.record_fault(task_id, describe_join_error(&err)).await;
            }
        }
    }

    async fn forward_progress(&self, task_id: TaskId, render_percent: u8) {
        if let Err(err) = self
            .store
            .mutate(task_id, |record| record.report_progress(render_percent))
            .await
        {
            debug!(%task_id, error = %err, "progress update dropped");
        }
    }

    async fn record_failure(&self, task_id: TaskId, message: String) {
        let now = self.clock.now();
        let result = self
            .store
            .mutate(task_id, |record| {
                if record.status == TaskStatus::Pending {
                    record.start_processing()?;
                }
                record.fail(message, now)
            })
            .await;
        match result {
            Ok(record) => info!(%task_id, error = record.error.as_deref().unwrap_or_default(), "task failed"),
            Err(err) => error!(%task_id, error = %err, "could not record task failure"),
        }
    }

    async fn record_fault(&self, task_id: TaskId, detail: String) {
        error!(%task_id, detail = %detail, "internal fault while running task");
        self.record_failure(task_id, format!("internal fault: {detail}"))
            .await;
    }
}

fn describe_join_error(err: &JoinError) -> String {
    if err.is_cancelled() {
        return "task was cancelled by the runtime".to_owned();
    }
    format!("task panicked: {err}")
}
