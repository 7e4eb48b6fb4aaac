//! WebSocket event channel

pub mod handler;
pub mod notifier;
pub mod protocol;

pub use notifier::ChannelNotifier;
