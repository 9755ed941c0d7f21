//! cadence: run the recurrence engine over a JSON task dump.
//!
//! stdout には結果の JSON だけを出す（ログは stderr）。

mod cli;
mod logging;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use cadence_core::app::ServiceBuilder;
use cadence_core::domain::{EngineConfig, Task, TaskId};
use cadence_core::impls::InMemoryTaskStore;
use cadence_core::ports::{Clock, FixedClock, SystemClock};
use cadence_core::schedule::{decode, encode, next_due_date, next_occurrence};

use crate::cli::Command;

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("cadence error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;

    match args.command {
        Command::Sweep {
            tasks,
            config,
            now,
            write,
        } => sweep(&tasks, config.as_deref(), now, write).await,
        Command::Next { tasks, rule, from } => match (tasks, rule, from) {
            (_, Some(rule), Some(from)) => next_for_rule(&rule, from),
            (Some(tasks), _, _) => next_for_tasks(&tasks),
            _ => anyhow::bail!("either --tasks or --rule with --from is required"),
        },
    }
}

async fn sweep(
    tasks_path: &Path,
    config_path: Option<&Path>,
    now: Option<DateTime<Utc>>,
    write: bool,
) -> Result<()> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    let store = Arc::new(InMemoryTaskStore::from_tasks(load_tasks(tasks_path)?));
    if let Some(cycle) = store.dependency_cycle().await {
        warn!(?cycle, "task dump contains a dependency cycle");
    }

    let clock: Arc<dyn Clock> = match now {
        Some(at) => Arc::new(FixedClock::new(at)),
        None => Arc::new(SystemClock),
    };
    let service = ServiceBuilder::new()
        .store(store.clone())
        .clock(clock)
        .config(config)
        .build()?;

    // Ctrl-C: 次のタスクに進まずに止める（処理済みの分はそのまま）
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let report = service.orchestrator().sweep_with_shutdown(shutdown_rx).await?;

    if write && !report.created.is_empty() {
        let snapshot = store.snapshot().await;
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(tasks_path, json)
            .with_context(|| format!("writing {}", tasks_path.display()))?;
        info!(path = %tasks_path.display(), tasks = snapshot.len(), "task dump updated");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct NextDue {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    rule: Option<String>,
    due_date: Option<DateTime<Utc>>,
    next_due: Option<DateTime<Utc>>,
}

fn next_for_tasks(tasks_path: &Path) -> Result<()> {
    let rows: Vec<NextDue> = load_tasks(tasks_path)?
        .into_iter()
        .filter(|t| !t.is_deleted && t.recurrence.is_recurring())
        .map(|t| NextDue {
            rule: encode(&t.recurrence),
            due_date: t.due_date,
            next_due: next_due_date(&t),
            id: Some(t.id),
            title: Some(t.title),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn next_for_rule(rule: &str, from: DateTime<Utc>) -> Result<()> {
    let decoded = decode(rule);
    if !decoded.is_recurring() {
        warn!(rule, "rule not understood, treating as non-recurring");
    }
    let row = NextDue {
        id: None,
        title: None,
        rule: encode(&decoded),
        due_date: Some(from),
        next_due: next_occurrence(&decoded, from),
    };

    println!("{}", serde_json::to_string_pretty(&row)?);
    Ok(())
}

fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let tasks: Vec<Task> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    info!(path = %path.display(), tasks = tasks.len(), "tasks loaded");
    Ok(tasks)
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
