//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::Rng;
use txlink_driver::{Command, CommandSet, Connection, ConnectionFactory, DriverResult, Value};

/// Generate `count` commands with a random integer parameter each.
pub fn random_commands(count: usize) -> Vec<Command> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| Command::new(format!("update t set v = @v where id = {i}")).bind("v", Value::Int(rng.gen())))
        .collect()
}

/// Generate `count` distinct target names.
pub fn targets(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("server=bench;db=db{i}")).collect()
}

/// Pick a random target index for each of `count` acquisitions.
pub fn random_target_order(count: usize, targets: usize) -> Vec<usize> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(0..targets.max(1))).collect()
}

/// Opens connections that accept every command set and keep nothing.
///
/// Unlike the in-memory driver it has no journal, so long benchmark runs
/// do not grow memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFactory;

impl ConnectionFactory for NullFactory {
    fn open(&self, _target: &str) -> DriverResult<Box<dyn Connection>> {
        Ok(Box::new(NullConnection { open: true }))
    }
}

#[derive(Debug)]
struct NullConnection {
    open: bool,
}

impl Connection for NullConnection {
    fn execute_set(&mut self, set: &CommandSet) -> DriverResult<i64> {
        Ok(-(set.len() as i64).signum())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
