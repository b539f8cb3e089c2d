//! # txlink testkit
//!
//! Test utilities for txlink.
//!
//! This crate provides:
//! - Test contexts with isolated caches and transaction managers
//! - An instrumented connection factory that can hold opens back to force
//!   races
//! - Property-based test generators using proptest
//! - A concurrent stress harness for the affinity cache
//! - Batch layout vectors, also checked by the CLI planner
//!
//! ## Usage
//!
//! ```rust
//! use txlink_testkit::prelude::*;
//! use txlink_core::{CancellationToken, QueryBatch};
//!
//! with_test_context(|ctx| {
//!     let batch = QueryBatch::new().add_query("select 1");
//!     ctx.commit_query_batch(&batch, 0, None, &CancellationToken::new()).unwrap();
//!     assert_eq!(ctx.driver.set_sizes(), vec![1]);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
pub use vectors::*;
