//! A crate containing utilities and extensions built on top of Tokio.

/// A broadcast-based pub/sub bus for fan-out notification of typed events.
pub mod events_bus;
/// A channel for sending deduplicated notifications with no data attached.
pub mod notify;
/// `NotifyOnce`, typically used as a shutdown channel.
pub mod notify_once;
/// `LxTask` and associated helpers.
pub mod task;

/// The default bound used for internal mpsc/broadcast channels throughout
/// the node, when the caller doesn't have a more specific reason to pick a
/// different size.
pub const DEFAULT_CHANNEL_SIZE: usize = 16;

// Can save a `tokio` dependency declaration
pub use tokio;
