//! Utilities for testing merge sessions.
//!
//! [`fixtures`] builds sorted snapshots and changesets, [`test_sink_wrapper`] records every call
//! a session makes into its sink, and [`faulty_sink`] fails on demand. Sessions block on each
//! other by construction, so tests that could hang run under [`deadline::run_with_deadline`].

pub mod deadline;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod faulty_sink;
pub mod fixtures;
pub mod test_sink_wrapper;
