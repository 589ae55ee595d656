//! Change derivation and application over sorted map snapshots.
//!
//! Both operations are merge-joins of two sorted entity streams, each fed by its own producer
//! thread. [`derive`] compares an old and a new snapshot and emits a changeset, [`apply`]
//! applies a changeset onto a base snapshot. [`pipeline`] wraps either into a single call over
//! two iterators.

pub mod apply;
pub mod derive;
pub mod error;
pub mod failpoints;
mod macros;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod sink;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
