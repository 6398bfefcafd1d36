//! Scheduler loop. Picks eligible tasks each tick and dispatches them to agents.
//!
//! Each tick runs one selection phase:
//! 1. Ask the task store for eligible tasks (pending, dependencies completed)
//! 2. Order them by priority (stable, so ties keep creation order)
//! 3. Cut the list to the free concurrency slots
//! 4. Mark each selected task `in-progress`, then spawn its dispatch
//!
//! Selection phases never overlap; dispatches from earlier ticks keep
//! running alongside later ticks. There is no timeout on agent execution,
//! so a hung agent holds its slot until it returns.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::agents::AgentRegistry;
use crate::config::{ConcurrencyLimit, SchedulerConfig};
use crate::error::AgentError;
use crate::recovery::{ErrorLog, RetryPolicy};
use crate::scheduler::selection;
use crate::scheduler::ticker::{IntervalTicker, Ticker};
use crate::tasks::{Task, TaskStatus, TaskStore};

/// Context label for tasks whose agent could not be resolved.
const CONTEXT_RESOLUTION: &str = "agent resolution";
/// Context label for tasks whose agent kept failing.
const CONTEXT_EXECUTION: &str = "task execution";

/// Handle to one spawned dispatch.
#[derive(Debug)]
pub struct DispatchHandle {
    pub task_id: Uuid,
    handle: JoinHandle<TaskStatus>,
}

impl DispatchHandle {
    /// Wait for the dispatch to finish and return the task's final status.
    ///
    /// Returns `None` if the dispatch itself was aborted.
    pub async fn outcome(self) -> Option<TaskStatus> {
        self.handle.await.ok()
    }

    /// Check if the dispatch has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// What one tick dispatched, in dispatch order.
#[derive(Debug, Default)]
pub struct TickReport {
    pub dispatched: Vec<DispatchHandle>,
}

impl TickReport {
    /// IDs of the dispatched tasks, in dispatch order.
    pub fn task_ids(&self) -> Vec<Uuid> {
        self.dispatched.iter().map(|d| d.task_id).collect()
    }

    /// Number of dispatched tasks.
    pub fn len(&self) -> usize {
        self.dispatched.len()
    }

    /// Check if nothing was dispatched.
    pub fn is_empty(&self) -> bool {
        self.dispatched.is_empty()
    }

    /// Wait for every dispatch and collect the final statuses.
    pub async fn join(self) -> Vec<(Uuid, Option<TaskStatus>)> {
        join_all(
            self.dispatched
                .into_iter()
                .map(|d| async move { (d.task_id, d.outcome().await) }),
        )
        .await
    }
}

/// Shared dependencies handed to every dispatch.
#[derive(Clone)]
struct DispatchDeps {
    tasks: Arc<TaskStore>,
    agents: Arc<AgentRegistry>,
    errors: Arc<ErrorLog>,
    retry: RetryPolicy,
    /// IDs of tasks dispatched and not yet resolved.
    running: Arc<RwLock<HashSet<Uuid>>>,
}

/// Running tick loop.
struct TickLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Dependency-aware task scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
    deps: DispatchDeps,
    max_concurrent: RwLock<ConcurrencyLimit>,
    /// Serializes selection phases.
    selection: Mutex<()>,
    tick_loop: Mutex<Option<TickLoop>>,
}

impl Scheduler {
    /// Create a new scheduler over the given store, registry and error log.
    pub fn new(
        config: SchedulerConfig,
        tasks: Arc<TaskStore>,
        agents: Arc<AgentRegistry>,
        errors: Arc<ErrorLog>,
    ) -> Self {
        let max_concurrent = config.max_concurrent_tasks;
        Self {
            deps: DispatchDeps {
                tasks,
                agents,
                errors,
                retry: config.retry.into(),
                running: Arc::new(RwLock::new(HashSet::new())),
            },
            config,
            max_concurrent: RwLock::new(max_concurrent),
            selection: Mutex::new(()),
            tick_loop: Mutex::new(None),
        }
    }

    /// Start ticking at the configured interval.
    ///
    /// Returns false (and does nothing) if the scheduler is already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        self.start_with(IntervalTicker::new(self.config.tick_interval))
            .await
    }

    /// Start ticking on a custom tick source.
    ///
    /// Returns false if the scheduler is already running; the ticker is
    /// dropped unused.
    pub async fn start_with<T: Ticker>(self: &Arc<Self>, ticker: T) -> bool {
        let mut tick_loop = self.tick_loop.lock().await;
        if tick_loop.as_ref().is_some_and(|l| !l.handle.is_finished()) {
            tracing::info!("Task scheduler is already running");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(Arc::downgrade(self), ticker, shutdown_rx));
        *tick_loop = Some(TickLoop {
            shutdown: shutdown_tx,
            handle,
        });

        let limit = *self.max_concurrent.read().await;
        tracing::info!(
            interval_ms = self.config.tick_interval.as_millis() as u64,
            max_concurrent = %limit,
            "Task scheduler started"
        );
        true
    }

    /// Stop ticking. In-flight dispatches keep running to completion.
    ///
    /// Returns false if the scheduler was not running. When this returns,
    /// no further selection phase will start.
    pub async fn stop(&self) -> bool {
        let mut tick_loop = self.tick_loop.lock().await;
        let Some(running) = tick_loop.take() else {
            tracing::info!("Task scheduler is not running");
            return false;
        };

        let was_running = !running.handle.is_finished();
        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            tracing::warn!(error = %e, "Scheduler loop ended abnormally");
        }

        if was_running {
            tracing::info!("Task scheduler stopped");
        } else {
            tracing::info!("Task scheduler is not running");
        }
        was_running
    }

    /// Check if the tick loop is active.
    pub async fn is_running(&self) -> bool {
        self.tick_loop
            .lock()
            .await
            .as_ref()
            .is_some_and(|l| !l.handle.is_finished())
    }

    /// Change the concurrency ceiling. Already dispatched tasks are not
    /// preempted; the new ceiling applies from the next selection phase.
    pub async fn set_max_concurrent_tasks(&self, limit: ConcurrencyLimit) {
        *self.max_concurrent.write().await = limit;
        tracing::info!(max_concurrent = %limit, "Updated concurrency ceiling");
    }

    /// Current concurrency ceiling.
    pub async fn max_concurrent_tasks(&self) -> ConcurrencyLimit {
        *self.max_concurrent.read().await
    }

    /// Run one selection phase and spawn a dispatch per selected task.
    ///
    /// Never fails: no eligible tasks or no free slots simply dispatch nothing.
    pub async fn tick(&self) -> TickReport {
        let _selection = self.selection.lock().await;

        let mut eligible = self.deps.tasks.list_eligible().await;
        if eligible.is_empty() {
            tracing::debug!("No tasks to schedule");
            return TickReport::default();
        }

        let limit = *self.max_concurrent.read().await;
        let capacity = {
            let running = self.deps.running.read().await;
            eligible.retain(|t| !running.contains(&t.id));
            limit.capacity(running.len())
        };
        if capacity == 0 {
            tracing::debug!(
                eligible = eligible.len(),
                max_concurrent = %limit,
                "No free slots, skipping tick"
            );
            return TickReport::default();
        }

        let selected = selection::select(eligible, capacity);
        tracing::info!(count = selected.len(), "Scheduling tasks");

        let mut report = TickReport::default();
        for task in selected {
            // Flip the status before spawning so no later tick can pick it again.
            if let Err(e) = self
                .deps
                .tasks
                .update_status(task.id, TaskStatus::InProgress)
                .await
            {
                tracing::warn!(task_id = %task.id, error = %e, "Could not start task, skipping");
                continue;
            }
            self.deps.running.write().await.insert(task.id);

            tracing::info!(
                task_id = %task.id,
                agent = %task.assigned_to,
                priority = %task.priority,
                "Dispatching task: {}",
                task.title
            );

            let task_id = task.id;
            let handle = tokio::spawn(dispatch(self.deps.clone(), task));
            report.dispatched.push(DispatchHandle { task_id, handle });
        }

        report
    }

    /// Number of dispatched tasks still awaiting an outcome.
    pub async fn running_count(&self) -> usize {
        self.deps.running.read().await.len()
    }

    /// IDs of dispatched tasks still awaiting an outcome.
    pub async fn running_tasks(&self) -> Vec<Uuid> {
        self.deps.running.read().await.iter().copied().collect()
    }

    /// Check if a task is currently dispatched.
    pub async fn is_task_running(&self, id: Uuid) -> bool {
        self.deps.running.read().await.contains(&id)
    }

    /// Get access to the task store.
    pub fn tasks(&self) -> &Arc<TaskStore> {
        &self.deps.tasks
    }

    /// Get access to the agent registry.
    pub fn agents(&self) -> &Arc<AgentRegistry> {
        &self.deps.agents
    }

    /// Get access to the error log.
    pub fn errors(&self) -> &Arc<ErrorLog> {
        &self.deps.errors
    }

    /// Get access to the configuration the scheduler was built with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

/// Tick until told to shut down, the ticker runs dry, or the scheduler is dropped.
async fn run_loop<T: Ticker>(
    scheduler: Weak<Scheduler>,
    mut ticker: T,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            ticked = ticker.tick() => {
                if !ticked {
                    tracing::info!("Tick source exhausted, scheduler loop ending");
                    break;
                }
                let Some(scheduler) = scheduler.upgrade() else {
                    break;
                };
                scheduler.tick().await;
            }
        }
    }
}

/// Resolve the agent, execute through the retry policy and record the outcome.
async fn dispatch(deps: DispatchDeps, task: Task) -> TaskStatus {
    let status = execute(&deps, &task).await;

    if let Err(e) = deps.tasks.update_status(task.id, status).await {
        tracing::warn!(task_id = %task.id, error = %e, "Could not record task outcome");
    }
    deps.running.write().await.remove(&task.id);

    status
}

async fn execute(deps: &DispatchDeps, task: &Task) -> TaskStatus {
    let Some(agent) = deps.agents.get(&task.assigned_to).await else {
        let error = AgentError::NotFound {
            name: task.assigned_to.clone(),
        };
        tracing::warn!(task_id = %task.id, agent = %task.assigned_to, "Agent not found for task");
        deps.errors.record(&error, CONTEXT_RESOLUTION, None).await;
        return TaskStatus::Failed;
    };

    let agent_ref = agent.as_ref();
    let description = task.description.as_str();
    let attempts = AssertUnwindSafe(deps.retry.run(move || agent_ref.execute(description)))
        .catch_unwind()
        .await;

    let error = match attempts {
        Ok(Ok(result)) => {
            tracing::info!(task_id = %task.id, agent = %task.assigned_to, "Task completed: {}", result);
            return TaskStatus::Completed;
        }
        Ok(Err(e)) => e,
        Err(_) => AgentError::ExecutionFailed {
            name: task.assigned_to.clone(),
            reason: "agent panicked".to_string(),
        },
    };

    tracing::warn!(
        task_id = %task.id,
        agent = %task.assigned_to,
        error = %error,
        "Task failed"
    );
    deps.errors
        .record_with_retries(
            &error,
            CONTEXT_EXECUTION,
            Some(&task.assigned_to),
            Some(deps.retry.max_attempts()),
        )
        .await;
    TaskStatus::Failed
}
