//! Durable job queue on Redis Streams plus the creator notification channel.

pub mod error;
pub mod notify;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use notify::{
    Connection, ConnectionHandle, ConnectionRegistry, RedisConnectionRegistry,
};
pub use queue::{JobQueue, QueueConfig};
