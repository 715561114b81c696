//! Decision scheduling.
//!
//! - [`DebounceScheduler`]: one pending decision per conversation
//! - [`EvaluationPipeline`]: judge, audit, respond, send
//! - [`InactivitySweeper`]: proactive restarts of idle conversations

mod debounce;
mod pipeline;
mod sweeper;

pub use debounce::DebounceScheduler;
pub use pipeline::{typing_delay, EvaluationPipeline};
pub use sweeper::InactivitySweeper;
