//! Connection sharing.
//!
//! - [`ConnectionHandle`] counts the users of one physical connection
//! - [`ConnectionLease`] is one caller's claim on a handle
//! - [`ConnectionAffinityCache`] maps each transaction and target to a
//!   single handle and drops its references when the transaction ends

mod cache;
mod handle;
mod lease;

pub use cache::{ConnectionAffinityCache, RegistryState};
pub use handle::ConnectionHandle;
pub use lease::ConnectionLease;
