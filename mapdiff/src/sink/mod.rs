//! Downstream consumers of merge sessions.
//!
//! A derive session drives a [`ChangeSink`], an apply session drives an [`EntitySink`]. Storage
//! writers, codec writers and replication senders implement these traits.

mod base;
pub mod memory;

pub use base::{ChangeSink, EntitySink, Sink};
