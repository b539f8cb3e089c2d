//! Run command implementation.

use super::{CliError, Script};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use txlink_core::{
    CacheStatsSnapshot, CancellationToken, ConnectionAffinityCache, DbContext, TransactionManager,
};
use txlink_driver::InMemoryDriver;

/// Options for a script run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Target the context is bound to.
    pub target: String,
    /// Batch size (0 = script override, else the default).
    pub batch_size: usize,
    /// Number of times the script runs inside the transaction.
    pub repeat: usize,
    /// Cancel once this many round trips have completed.
    pub cancel_after: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            target: "memory".into(),
            batch_size: 0,
            repeat: 1,
            cancel_after: None,
        }
    }
}

/// Outcome of a script run.
#[derive(Debug, Serialize)]
pub struct RunResult {
    /// Target the script ran against.
    pub target: String,
    /// Commands per repetition.
    pub commands: usize,
    /// Batch size used.
    pub batch_size: usize,
    /// Sizes of the round trips sent, in order.
    pub round_trips: Vec<usize>,
    /// Sum of the affected-row counts.
    pub affected: i64,
    /// Whether the run was cancelled before sending everything.
    pub cancelled: bool,
    /// Connections opened by the driver.
    pub connections_opened: usize,
    /// Connections closed by the driver.
    pub connections_closed: usize,
    /// Cache counters after the transaction completed.
    #[serde(skip)]
    pub cache: CacheStatsSnapshot,
}

/// Executes a script without printing.
pub fn execute(path: &Path, options: &RunOptions) -> Result<RunResult, CliError> {
    let script = Script::load(path)?;
    let driver = InMemoryDriver::new();
    for (sql, rows) in &script.affected_rows {
        driver.set_affected_rows(sql.clone(), *rows);
    }

    let cancel = CancellationToken::new();
    if let Some(limit) = options.cancel_after {
        let trigger = cancel.clone();
        driver.observe_sets(move |sent| {
            if sent >= limit {
                trigger.cancel();
            }
        });
        if limit == 0 {
            cancel.cancel();
        }
    }

    let cache = Arc::new(ConnectionAffinityCache::new());
    let db = DbContext::new(options.target.as_str(), driver.clone())
        .with_cache(Arc::clone(&cache))
        .with_transactions(Arc::new(TransactionManager::new()));
    let batch = script.to_query_batch();
    let batch_size = db.effective_batch_size(&batch, options.batch_size);

    let txn = db.begin()?;
    info!(target_name = %options.target, commands = batch.len(), batch_size, repeat = options.repeat, "running script");

    let mut affected = 0;
    for _ in 0..options.repeat.max(1) {
        affected += db.commit_query_batch(&batch, batch_size, Some(&txn), &cancel)?;
        if cancel.is_cancelled() {
            break;
        }
    }
    txn.commit()?;

    let round_trips = driver.set_sizes();
    let expected_trips = batch.len() * options.repeat.max(1);
    Ok(RunResult {
        target: options.target.clone(),
        commands: batch.len(),
        batch_size,
        cancelled: round_trips.iter().sum::<usize>() < expected_trips,
        round_trips,
        affected,
        connections_opened: driver.total_opened(),
        connections_closed: driver.total_closed(),
        cache: cache.stats(),
    })
}

/// Runs the run command.
pub fn run(path: &Path, options: &RunOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = execute(path, options)?;
    info!(affected = result.affected, round_trips = result.round_trips.len(), "script finished");

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &RunResult) {
    println!("=== Script Run ===");
    println!("Target:        {}", result.target);
    println!("Commands:      {}", result.commands);
    println!("Batch size:    {}", result.batch_size);
    println!("Round trips:   {:?}", result.round_trips);
    println!("Affected rows: {}", result.affected);
    if result.cancelled {
        println!("Cancelled:     yes");
    }
    println!(
        "Connections:   {} opened, {} closed ({} reused)",
        result.connections_opened, result.connections_closed, result.cache.connections_reused
    );
}
