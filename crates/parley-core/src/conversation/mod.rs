//! Conversation state, topic segmentation and context snapshots.

mod context;
mod segmenter;
mod table;

pub use context::ContextBuilder;
pub use segmenter::TopicSegmenter;
pub use table::{ConversationState, ConversationTable};
