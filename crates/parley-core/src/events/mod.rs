//! Event system for conversation engagement
//!
//! This module provides:
//! - Event types for topic lifecycle, decisions and sends
//! - Event bus for internal pub/sub

mod bus;
mod event;

pub use bus::{EventBus, EventSubscriber};
pub use event::{EngagementEvent, EventKind};
