use std::sync::Arc;
use std::time::Duration;

use devteam::agents::AgentRegistry;
use devteam::config::SchedulerConfig;
use devteam::memory::ContextMemory;
use devteam::recovery::{ErrorFilter, ErrorLog};
use devteam::scheduler::Scheduler;
use devteam::tasks::{TaskPriority, TaskStore};

/// How long each simulated agent takes per task.
const AGENT_LATENCY: Duration = Duration::from_millis(750);
/// How often the demo checks whether the team is done.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = SchedulerConfig::from_env()?;

    eprintln!("🛠  DevTeam v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Tick interval: {:?}", config.tick_interval);
    eprintln!("   Max concurrent: {}", config.max_concurrent_tasks);
    eprintln!(
        "   Retry: {} attempts, {:?} apart",
        config.retry.max_attempts, config.retry.delay
    );
    eprintln!("   Press Ctrl-C to stop early.\n");

    // ── Team ──────────────────────────────────────────────────────────────
    let memory = Arc::new(ContextMemory::new());
    let errors = Arc::new(ErrorLog::new(Arc::clone(&memory)));
    let tasks = Arc::new(TaskStore::new(config.strict_transitions));
    let agents = Arc::new(AgentRegistry::with_team(AGENT_LATENCY).await);

    eprintln!("   Agents: {}", agents.list().await.join(", "));

    // ── Work ──────────────────────────────────────────────────────────────
    let create = tasks
        .create(
            "Create file",
            "Create src/utils/date.rs with date helpers",
            "intern",
            TaskPriority::Medium,
            vec![],
        )
        .await?;
    let implement = tasks
        .create(
            "Implement feature",
            "Add date formatting and parsing to src/utils/date.rs",
            "junior",
            TaskPriority::Medium,
            vec![create.id],
        )
        .await?;
    tasks
        .create(
            "Refactor",
            "Refactor src/utils/date.rs for readability",
            "senior",
            TaskPriority::High,
            vec![implement.id],
        )
        .await?;
    tasks
        .create(
            "Review architecture",
            "Review module boundaries of src/utils",
            "architect",
            TaskPriority::Low,
            vec![],
        )
        .await?;
    tasks
        .create(
            "Deploy",
            "Deploy the date helpers to production",
            "devops",
            TaskPriority::High,
            vec![],
        )
        .await?;

    // ── Scheduler ─────────────────────────────────────────────────────────
    let scheduler = Arc::new(Scheduler::new(
        config,
        Arc::clone(&tasks),
        Arc::clone(&agents),
        Arc::clone(&errors),
    ));
    scheduler.start().await;

    tokio::select! {
        _ = wait_until_settled(&scheduler) => {
            tracing::info!("All tasks settled");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
        }
    }

    scheduler.stop().await;

    // ── Report ────────────────────────────────────────────────────────────
    let summary = tasks.summary().await;
    eprintln!(
        "\n   Tasks: {} total, {} completed, {} failed, {} pending, {} in progress",
        summary.total, summary.completed, summary.failed, summary.pending, summary.in_progress
    );
    println!("{}", serde_json::to_string_pretty(&tasks.list_all().await)?);

    let failures = errors.records(ErrorFilter::All).await;
    if !failures.is_empty() {
        println!("{}", serde_json::to_string_pretty(&failures)?);
    }

    Ok(())
}

/// Wait until no task is pending or running.
///
/// A pending task whose dependency failed never becomes eligible, so the
/// demo also stops once nothing is running and nothing can start.
async fn wait_until_settled(scheduler: &Scheduler) {
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        let summary = scheduler.tasks().summary().await;
        let blocked = scheduler.tasks().list_eligible().await.is_empty();
        if summary.in_progress == 0 && (summary.pending == 0 || blocked) {
            return;
        }
    }
}
