//! End-to-end tests for the scheduler.
//!
//! Each test wires a task store, agent registry and error log together
//! through the public API and drives the scheduler either tick by tick
//! or on a paused-clock interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::timeout;

use devteam::agents::{Agent, AgentRegistry, AgentRole, SimulatedAgent};
use devteam::config::{ConcurrencyLimit, RetryConfig, SchedulerConfig};
use devteam::error::AgentError;
use devteam::memory::{ContextMemory, MemoryKind};
use devteam::recovery::{ErrorFilter, ErrorLog};
use devteam::scheduler::{ManualTicker, Scheduler};
use devteam::tasks::{TaskPriority, TaskStatus, TaskStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

struct Team {
    scheduler: Arc<Scheduler>,
    tasks: Arc<TaskStore>,
    agents: Arc<AgentRegistry>,
    errors: Arc<ErrorLog>,
    memory: Arc<ContextMemory>,
}

fn team(config: SchedulerConfig) -> Team {
    let memory = Arc::new(ContextMemory::new());
    let errors = Arc::new(ErrorLog::new(Arc::clone(&memory)));
    let tasks = Arc::new(TaskStore::new(config.strict_transitions));
    let agents = Arc::new(AgentRegistry::new());
    let scheduler = Arc::new(Scheduler::new(
        config,
        Arc::clone(&tasks),
        Arc::clone(&agents),
        Arc::clone(&errors),
    ));
    Team {
        scheduler,
        tasks,
        agents,
        errors,
        memory,
    }
}

fn fast_retry(max_attempts: u32) -> SchedulerConfig {
    SchedulerConfig {
        retry: RetryConfig {
            max_attempts,
            delay: Duration::from_millis(10),
        },
        ..SchedulerConfig::default()
    }
}

/// Always fails.
struct BrokenAgent {
    name: String,
    calls: AtomicUsize,
}

#[async_trait]
impl Agent for BrokenAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _description: &str) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AgentError::ExecutionFailed {
            name: self.name.clone(),
            reason: "build broke".to_string(),
        })
    }
}

/// Blocks until the gate opens, tracking how many calls overlap.
struct GatedAgent {
    name: String,
    gate: watch::Receiver<bool>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl GatedAgent {
    fn new(name: &str) -> (watch::Sender<bool>, Arc<Self>) {
        let (tx, rx) = watch::channel(false);
        let agent = Arc::new(Self {
            name: name.to_string(),
            gate: rx,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        (tx, agent)
    }
}

#[async_trait]
impl Agent for GatedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, description: &str) -> Result<String, AgentError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let mut gate = self.gate.clone();
        let opened = gate.wait_for(|open| *open).await.is_ok();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if opened {
            Ok(format!("finished {description}"))
        } else {
            Err(AgentError::ExecutionFailed {
                name: self.name.clone(),
                reason: "gate dropped".to_string(),
            })
        }
    }
}

#[tokio::test]
async fn team_works_through_dependency_chain() {
    let t = team(SchedulerConfig::default());
    let intern = Arc::new(SimulatedAgent::new(AgentRole::Intern, Duration::ZERO));
    let junior = Arc::new(SimulatedAgent::new(AgentRole::Junior, Duration::ZERO));
    let senior = Arc::new(SimulatedAgent::new(AgentRole::Senior, Duration::ZERO));
    t.agents.register(intern.clone()).await;
    t.agents.register(junior.clone()).await;
    t.agents.register(senior.clone()).await;

    let create = t
        .tasks
        .create("Create file", "create date.rs", "intern", TaskPriority::Medium, vec![])
        .await
        .unwrap();
    let implement = t
        .tasks
        .create("Implement", "implement date.rs", "junior", TaskPriority::Medium, vec![create.id])
        .await
        .unwrap();
    let refactor = t
        .tasks
        .create("Refactor", "refactor date.rs", "senior", TaskPriority::High, vec![implement.id])
        .await
        .unwrap();

    let (ticks, ticker) = ManualTicker::channel();
    assert!(t.scheduler.start_with(ticker).await);

    timeout(TEST_TIMEOUT, async {
        while t.tasks.get(refactor.id).await.unwrap().status != TaskStatus::Completed {
            assert!(ticks.tick().await);
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("chain did not complete");

    assert!(t.scheduler.stop().await);

    let summary = t.tasks.summary().await;
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.total, 3);

    assert_eq!(intern.tasks().await, ["create date.rs"]);
    assert_eq!(junior.tasks().await, ["implement date.rs"]);
    assert_eq!(senior.tasks().await, ["refactor date.rs"]);
    assert!(t.errors.records(ErrorFilter::All).await.is_empty());
}

#[tokio::test]
async fn failed_dependency_blocks_dependents() {
    let t = team(fast_retry(2));
    let broken = Arc::new(BrokenAgent {
        name: "junior".to_string(),
        calls: AtomicUsize::new(0),
    });
    t.agents.register(broken.clone()).await;
    t.agents
        .register(Arc::new(SimulatedAgent::new(AgentRole::Senior, Duration::ZERO)))
        .await;

    let build = t
        .tasks
        .create("Build", "build it", "junior", TaskPriority::Medium, vec![])
        .await
        .unwrap();
    let review = t
        .tasks
        .create("Review", "review it", "senior", TaskPriority::Medium, vec![build.id])
        .await
        .unwrap();

    let outcomes = t.scheduler.tick().await.join().await;
    assert_eq!(outcomes, [(build.id, Some(TaskStatus::Failed))]);
    assert_eq!(broken.calls.load(Ordering::SeqCst), 2);

    for _ in 0..3 {
        assert!(t.scheduler.tick().await.is_empty());
    }
    assert_eq!(t.tasks.get(review.id).await.unwrap().status, TaskStatus::Pending);

    let records = t.errors.records(ErrorFilter::Agent("junior")).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].retry_count, Some(2));

    let observations = t.memory.entries_by_agent("junior").await;
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].kind, MemoryKind::Observation);
    assert!(observations[0].has_tag("task execution"));
}

#[tokio::test]
async fn unknown_assignee_fails_without_blocking_others() {
    let t = team(SchedulerConfig::default());
    t.agents
        .register(Arc::new(SimulatedAgent::new(AgentRole::Intern, Duration::ZERO)))
        .await;

    let ghost = t
        .tasks
        .create("Deploy", "deploy", "devops", TaskPriority::High, vec![])
        .await
        .unwrap();
    let docs = t
        .tasks
        .create("Docs", "write docs", "intern", TaskPriority::Low, vec![])
        .await
        .unwrap();

    let report = t.scheduler.tick().await;
    assert_eq!(report.task_ids(), [ghost.id, docs.id]);

    let mut outcomes = report.join().await;
    outcomes.sort_by_key(|(id, _)| *id == docs.id);
    assert_eq!(
        outcomes,
        [
            (ghost.id, Some(TaskStatus::Failed)),
            (docs.id, Some(TaskStatus::Completed)),
        ]
    );

    let records = t.errors.records(ErrorFilter::All).await;
    assert_eq!(records.len(), 1);
    assert!(records[0].agent.is_none());
    assert!(records[0].message.contains("devops"));
    assert!(t.memory.is_empty().await);
}

#[tokio::test]
async fn ceiling_holds_until_slots_free() {
    let t = team(SchedulerConfig {
        max_concurrent_tasks: ConcurrencyLimit::max(2).unwrap(),
        ..SchedulerConfig::default()
    });
    let (open, agent) = GatedAgent::new("senior");
    t.agents.register(agent.clone()).await;

    let mut ids = Vec::new();
    for i in 0..4 {
        let task = t
            .tasks
            .create(format!("job {i}"), format!("job {i}"), "senior", TaskPriority::Medium, vec![])
            .await
            .unwrap();
        ids.push(task.id);
    }

    let first = t.scheduler.tick().await;
    assert_eq!(first.task_ids(), ids[..2]);
    assert!(t.scheduler.tick().await.is_empty());
    assert_eq!(t.scheduler.running_count().await, 2);

    open.send_replace(true);
    let outcomes = timeout(TEST_TIMEOUT, first.join()).await.unwrap();
    assert!(outcomes.iter().all(|(_, s)| *s == Some(TaskStatus::Completed)));

    let second = t.scheduler.tick().await;
    assert_eq!(second.task_ids(), ids[2..]);
    timeout(TEST_TIMEOUT, second.join()).await.unwrap();

    assert_eq!(t.tasks.summary().await.completed, 4);
    assert!(agent.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test(start_paused = true)]
async fn interval_loop_never_exceeds_ceiling() {
    let t = team(SchedulerConfig {
        tick_interval: Duration::from_millis(10),
        max_concurrent_tasks: ConcurrencyLimit::max(3).unwrap(),
        ..SchedulerConfig::default()
    });
    let (open, agent) = GatedAgent::new("intern");
    t.agents.register(agent.clone()).await;

    for i in 0..10 {
        t.tasks
            .create(format!("task {i}"), format!("task {i}"), "intern", TaskPriority::Medium, vec![])
            .await
            .unwrap();
    }

    assert!(t.scheduler.start().await);

    // Several ticks pass while the first three hold every slot.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(t.tasks.summary().await.in_progress, 3);
    assert_eq!(agent.peak.load(Ordering::SeqCst), 3);

    open.send_replace(true);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(t.scheduler.stop().await);
    assert_eq!(t.tasks.summary().await.completed, 10);
    assert!(agent.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let t = team(SchedulerConfig::default());

    assert!(!t.scheduler.stop().await);

    let (first, first_ticker) = ManualTicker::channel();
    let (second, second_ticker) = ManualTicker::channel();
    assert!(t.scheduler.start_with(first_ticker).await);
    assert!(!t.scheduler.start_with(second_ticker).await);

    assert!(first.tick().await);
    assert!(!second.tick().await);

    assert!(t.scheduler.stop().await);
    assert!(!t.scheduler.stop().await);
    assert!(!t.scheduler.is_running().await);
}
