//! Error types returned by the bus.
//!
//! Every condition is reported synchronously to the caller of the triggering
//! operation as a [`BusError`]; the bus performs no internal retries and never
//! terminates the process. Retry/backoff policy, if any, belongs to the caller.
//!
//! Two variants are signals rather than failures:
//! - [`BusError::EndOfStream`] — a closed queue has been fully drained; terminal
//!   but non-fatal, the normal way a consumer learns its stream is done.
//! - [`BusError::QueueClosed`] — a push raced a consumer's close; the broker
//!   treats this as "skip that subscriber", not as a delivery failure.

use thiserror::Error;

/// # Errors produced by bus operations.
///
/// Construction errors (`InvalidCapacity`, `EmptyChannels`, `AlreadyBound`) are
/// fatal to the call that raised them only. `Canceled` on a `produce`/`broadcast`
/// may leave earlier subscribers in the fan-out snapshot holding the pack; for
/// `consume` nothing was read.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BusError {
    /// Queue capacity must be a positive number of packs.
    #[error("invalid queue capacity: {capacity}")]
    InvalidCapacity {
        /// The rejected capacity value.
        capacity: usize,
    },

    /// Operation attempted on a stream after `close()`.
    ///
    /// A second `close()` is a no-op, and `consume()` keeps draining a closed
    /// queue until it reports [`BusError::EndOfStream`].
    #[error("stream is closed")]
    ClosedStream,

    /// A blocking operation was aborted because its context ended.
    #[error("operation canceled by context")]
    Canceled,

    /// The queue is closed and fully drained; no more packs will arrive.
    #[error("end of stream")]
    EndOfStream,

    /// Push into a queue whose consumer has closed it.
    #[error("queue is closed")]
    QueueClosed,

    /// Role binding was given an empty channel list.
    #[error("channel list is empty")]
    EmptyChannels,

    /// The stream already holds a producer or consumer binding.
    #[error("stream is already bound to a role")]
    AlreadyBound,

    /// `produce`/`broadcast` on a stream without a producer binding.
    #[error("stream is not bound as a producer")]
    NotProducer,

    /// `consume` on a stream without a consumer binding.
    #[error("stream is not bound as a consumer")]
    NotConsumer,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use membus::BusError;
    ///
    /// let err = BusError::InvalidCapacity { capacity: 0 };
    /// assert_eq!(err.as_label(), "invalid_capacity");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::InvalidCapacity { .. } => "invalid_capacity",
            BusError::ClosedStream => "closed_stream",
            BusError::Canceled => "canceled",
            BusError::EndOfStream => "end_of_stream",
            BusError::QueueClosed => "queue_closed",
            BusError::EmptyChannels => "empty_channels",
            BusError::AlreadyBound => "already_bound",
            BusError::NotProducer => "not_producer",
            BusError::NotConsumer => "not_consumer",
        }
    }

    /// True for the terminal-but-expected end-of-stream signal.
    ///
    /// # Example
    /// ```
    /// use membus::BusError;
    ///
    /// assert!(BusError::EndOfStream.is_end_of_stream());
    /// assert!(!BusError::Canceled.is_end_of_stream());
    /// ```
    #[inline]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, BusError::EndOfStream)
    }
}
