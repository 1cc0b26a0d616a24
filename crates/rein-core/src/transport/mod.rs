//! Transport: framing, bounded queues and the single-peer socket bridge.

pub mod bridge;
pub mod codec;
pub mod queue;

pub use self::bridge::{SocketBridge, StartMode};
pub use self::queue::BoundedQueue;
