//! Bounded per-consumer buffering.
//!
//! Each consumer stream owns one [`BoundedQueue`]; producers reach it through
//! cloneable [`QueueHandle`]s registered with the broker. The queue is the
//! back-pressure boundary: a full queue suspends the pushing producer until
//! the consumer drains a slot or the push context is cancelled.

mod bounded;

pub use bounded::{BoundedQueue, QueueHandle};
