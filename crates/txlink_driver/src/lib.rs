//! # txlink driver
//!
//! Connection and command contracts for txlink.
//!
//! This crate is the seam between txlink and a relational database client.
//! It does not speak any wire protocol itself; it only describes what the
//! core needs from one.
//!
//! ## Design Principles
//!
//! - Connections are opened by a [`ConnectionFactory`] from a target string
//! - Commands are opaque SQL text plus a parameter map
//! - A [`CommandSet`] is several commands sent as one round trip
//! - Affected-row counts are reported by the driver and may be negative
//!
//! ## Available Drivers
//!
//! - [`InMemoryDriver`] - Records everything it is asked to do, for tests and dry runs
//!
//! ## Example
//!
//! ```rust
//! use txlink_driver::{Command, CommandSet, ConnectionFactory, InMemoryDriver};
//!
//! let driver = InMemoryDriver::new();
//! let mut conn = driver.open("Server=local").unwrap();
//!
//! let mut set = CommandSet::new();
//! set.append(Command::new("update t set x = 1"));
//! let affected = conn.execute_set(&set).unwrap();
//! assert_eq!(affected, -1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod connection;
mod error;
mod memory;

pub use command::{Command, CommandMeta, CommandSet, ParameterMap, Value};
pub use connection::{Connection, ConnectionFactory};
pub use error::{DriverError, DriverResult};
pub use memory::{ExecutedSet, InMemoryDriver};
