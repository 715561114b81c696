//! Core types for parley.

mod message;
mod snapshot;
mod topic;
mod verdict;

pub use message::*;
pub use snapshot::*;
pub use topic::*;
pub use verdict::*;
