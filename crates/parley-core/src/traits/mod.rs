//! Collaborator traits the engine calls.

mod clock;
mod llm;
mod oracle;
mod sender;
mod topic_store;

pub use clock::*;
pub use llm::*;
pub use oracle::*;
pub use sender::*;
pub use topic_store::*;
