//! Configuration types shared by every mapdiff tool.

mod base;
mod merge;

pub use base::ValidationError;
pub use merge::{MapDiffConfig, MergeConfig};
