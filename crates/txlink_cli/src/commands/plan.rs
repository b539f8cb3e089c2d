//! Plan command implementation.

use super::{CliError, Script};
use serde::Serialize;
use std::path::Path;
use txlink_core::{batch_sizes, short_batch_size, DEFAULT_BATCH_SIZE};

/// Batch layout of a command list.
#[derive(Debug, Serialize)]
pub struct PlanResult {
    /// Number of commands.
    pub commands: usize,
    /// Batch size used.
    pub batch_size: usize,
    /// Longest tail that is merged into the batch before it, minus one.
    pub short_batch_size: usize,
    /// Size of each round trip, in order.
    pub batches: Vec<usize>,
}

/// Computes the layout without printing it.
pub fn plan(
    commands: usize,
    script: Option<&Path>,
    batch_size: usize,
) -> Result<PlanResult, CliError> {
    let (commands, override_size) = match script {
        Some(path) => {
            let script = Script::load(path)?;
            (script.commands.len(), script.batch_size)
        }
        None => (commands, None),
    };

    let batch_size = match (batch_size, override_size) {
        (0, Some(size)) if size > 0 => size,
        (0, _) => DEFAULT_BATCH_SIZE,
        (size, _) => size,
    };
    Ok(PlanResult {
        commands,
        batch_size,
        short_batch_size: short_batch_size(batch_size),
        batches: batch_sizes(commands, batch_size)?,
    })
}

/// Runs the plan command.
pub fn run(
    commands: usize,
    script: Option<&Path>,
    batch_size: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = plan(commands, script, batch_size)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &PlanResult) {
    println!("=== Batch Plan ===");
    println!("Commands:      {}", result.commands);
    println!("Batch size:    {}", result.batch_size);
    println!("Short batch:   {}", result.short_batch_size);
    println!("Round trips:   {}", result.batches.len());

    let mut start = 0;
    for (index, size) in result.batches.iter().enumerate() {
        println!("  batch {:>3}: commands {:>5}..{:<5} ({})", index, start, start + size, size);
        start += size;
    }
}
