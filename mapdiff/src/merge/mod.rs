//! Synchronized merge-join of two sorted entity streams.
//!
//! Each session is driven by exactly two producer threads, one per source. A source records its
//! next element in the shared [`state`] and then blocks, if needed, until the counterpart's
//! progress tells whether the counterpart holds the same element. The [`engine`] holds the
//! decision rules, the role adapters in [`crate::derive`] and [`crate::apply`] act on the
//! outcome.

pub mod engine;
mod source;
pub(crate) mod state;

pub use engine::{MergeOutcome, Role, validate_ordering};
pub(crate) use source::SourceHandle;
pub use state::Operation;
