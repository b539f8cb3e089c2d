//! Property-based test generators using proptest.
//!
//! Provides strategies for commands, parameter maps and batch shapes.

use proptest::prelude::*;
use txlink_driver::{Command, ParameterMap, Value};

/// Strategy for generating parameter values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[a-zA-Z0-9 ]{0,24}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
    ]
}

/// Strategy for generating parameter names.
pub fn parameter_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating parameter maps.
pub fn parameter_map_strategy() -> impl Strategy<Value = ParameterMap> {
    prop::collection::btree_map(parameter_name_strategy(), value_strategy(), 0..4)
}

/// Strategy for generating commands.
pub fn command_strategy() -> impl Strategy<Value = Command> {
    (
        prop::sample::select(vec!["select", "insert", "update", "delete"]),
        "[a-z]{1,12}",
        parameter_map_strategy(),
    )
        .prop_map(|(verb, table, params)| Command::with_params(format!("{verb} {table}"), params))
}

/// Strategy for generating command lists.
pub fn command_list_strategy(max_len: usize) -> impl Strategy<Value = Vec<Command>> {
    prop::collection::vec(command_strategy(), 0..=max_len)
}

/// Strategy for generating valid batch sizes.
pub fn batch_size_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![
        1usize..=10,
        Just(50usize),
        11usize..=200,
    ]
}

/// Strategy for generating target names.
pub fn target_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex")
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
