// ontolift-core/src/application/runner.rs

// Task runner for the long operations (compile, eval, deploy, drift,
// regression). One worker loop per workspace keeps submissions FIFO within
// a tenant; a global semaphore caps concurrency across tenants. Cancellation
// is cooperative: stage code polls the flag at its checkpoints, in-flight
// warehouse calls are never interrupted.

use chrono::Utc;
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::error::OntoliftError;

// --- CANCELLATION ---

#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Stage checkpoint: between gates, environments, questions.
    pub fn checkpoint(&self) -> Result<(), OntoliftError> {
        if self.is_canceled() {
            Err(OntoliftError::Canceled)
        } else {
            Ok(())
        }
    }
}

// --- TASK MODEL ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub id: String,
    pub workspace: String,
    pub kind: String,
    pub state: TaskState,
    pub submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

/// A queued unit of work: a closure producing the stage future. The flag
/// handed to it is the task's own cancellation flag.
pub type TaskJob =
    Box<dyn FnOnce(CancelFlag) -> BoxFuture<'static, Result<serde_json::Value, OntoliftError>> + Send>;

struct QueuedTask {
    id: String,
    job: TaskJob,
}

struct RunnerInner {
    semaphore: Arc<Semaphore>,
    tasks: Mutex<HashMap<String, TaskEntry>>,
    queues: Mutex<HashMap<String, mpsc::UnboundedSender<QueuedTask>>>,
    counter: AtomicU64,
}

struct TaskEntry {
    status: TaskStatus,
    cancel: CancelFlag,
}

#[derive(Clone)]
pub struct AsyncRunner {
    inner: Arc<RunnerInner>,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl AsyncRunner {
    pub fn new(max_concurrent_tasks: usize) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                semaphore: Arc::new(Semaphore::new(max_concurrent_tasks.max(1))),
                tasks: Mutex::new(HashMap::new()),
                queues: Mutex::new(HashMap::new()),
                counter: AtomicU64::new(0),
            }),
        }
    }

    /// Enqueue a task for the workspace. Same-workspace tasks run FIFO;
    /// different workspaces run in parallel up to the global cap.
    pub fn submit(&self, workspace: &str, kind: &str, job: TaskJob) -> String {
        let id = format!(
            "task-{}",
            self.inner.counter.fetch_add(1, Ordering::SeqCst) + 1
        );
        let cancel = CancelFlag::new();

        if let Ok(mut tasks) = self.inner.tasks.lock() {
            tasks.insert(
                id.clone(),
                TaskEntry {
                    status: TaskStatus {
                        id: id.clone(),
                        workspace: workspace.to_string(),
                        kind: kind.to_string(),
                        state: TaskState::Pending,
                        submitted_at: now(),
                        started_at: None,
                        completed_at: None,
                        result: None,
                        error: None,
                    },
                    cancel,
                },
            );
        }

        let sender = self.workspace_sender(workspace);
        if sender.send(QueuedTask { id: id.clone(), job }).is_err() {
            warn!(task = %id, "Workspace worker is gone, task dropped");
            self.finish(&id, TaskState::Failed, None, Some(TaskError {
                code: "INTERNAL".into(),
                message: "workspace worker unavailable".into(),
                retryable: true,
            }));
        }
        id
    }

    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        self.inner
            .tasks
            .lock()
            .ok()
            .and_then(|tasks| tasks.get(task_id).map(|e| e.status.clone()))
    }

    /// Cooperative cancel: flips the flag; the task observes it at its next
    /// checkpoint (or at pick-up when still pending).
    pub fn cancel(&self, task_id: &str) {
        if let Ok(tasks) = self.inner.tasks.lock() {
            if let Some(entry) = tasks.get(task_id) {
                entry.cancel.cancel();
            }
        }
    }

    fn workspace_sender(&self, workspace: &str) -> mpsc::UnboundedSender<QueuedTask> {
        let mut queues = match self.inner.queues.lock() {
            Ok(q) => q,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(sender) = queues.get(workspace) {
            return sender.clone();
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedTask>();
        queues.insert(workspace.to_string(), tx.clone());

        let runner = self.clone();
        let workspace_name = workspace.to_string();
        tokio::spawn(async move {
            info!(workspace = %workspace_name, "Workspace worker started");
            while let Some(task) = rx.recv().await {
                runner.execute(task).await;
            }
        });
        tx
    }

    async fn execute(&self, task: QueuedTask) {
        // Global concurrency cap
        let permit = self.inner.semaphore.clone().acquire_owned().await;
        if permit.is_err() {
            return; // semaphore closed: runner is shutting down
        }

        let cancel = match self.inner.tasks.lock() {
            Ok(tasks) => match tasks.get(&task.id) {
                Some(entry) => entry.cancel.clone(),
                None => return,
            },
            Err(_) => return,
        };

        // Canceled while still pending: never start the stage.
        if cancel.is_canceled() {
            self.finish(&task.id, TaskState::Canceled, None, None);
            return;
        }

        self.mark_running(&task.id);
        let result = (task.job)(cancel).await;

        match result {
            Ok(value) => self.finish(&task.id, TaskState::Success, Some(value), None),
            Err(OntoliftError::Canceled) => self.finish(&task.id, TaskState::Canceled, None, None),
            Err(e) => {
                let error = TaskError {
                    code: e.code().as_str().to_string(),
                    message: e.to_string(),
                    retryable: e.is_retryable(),
                };
                self.finish(&task.id, TaskState::Failed, None, Some(error));
            }
        }
    }

    fn mark_running(&self, task_id: &str) {
        if let Ok(mut tasks) = self.inner.tasks.lock() {
            if let Some(entry) = tasks.get_mut(task_id) {
                entry.status.state = TaskState::Running;
                entry.status.started_at = Some(now());
            }
        }
    }

    fn finish(
        &self,
        task_id: &str,
        state: TaskState,
        result: Option<serde_json::Value>,
        error: Option<TaskError>,
    ) {
        if let Ok(mut tasks) = self.inner.tasks.lock() {
            if let Some(entry) = tasks.get_mut(task_id) {
                entry.status.state = state;
                entry.status.completed_at = Some(now());
                entry.status.result = result;
                entry.status.error = error;
            }
        }
    }
}
