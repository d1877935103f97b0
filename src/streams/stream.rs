//! # Stream contract.
//!
//! A stream is a client handle bound to a producer or consumer role. Producers
//! hold a fixed ordered channel list and push packs through the broker;
//! consumers own one bounded queue the broker delivers into. The trait is the
//! seam between in-process delivery and a future transport-backed client: both
//! expose exactly this surface.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::BusError;
use crate::messages::MsgPack;

/// Role-bound message stream over named channels.
///
/// Lifecycle: bind a role (`as_producer` xor `as_consumer`, once), `start`,
/// then `produce`/`broadcast` or `consume`, and finally `close`.
#[async_trait]
pub trait MsgStream: Send + Sync {
    /// Binds the stream as a producer over `channels`, fixed for the stream's
    /// lifetime. No broker registration happens; only consumers are tracked.
    async fn as_producer(&self, channels: Vec<String>) -> Result<(), BusError>;

    /// Registers this stream's queue with the broker under every name in
    /// `channels` (creating entries as needed) and binds the consumer role.
    /// `subscription` is a descriptive label, not a routing key.
    async fn as_consumer(&self, channels: Vec<String>, subscription: &str)
        -> Result<(), BusError>;

    /// Activates the stream. Placeholder for transport-specific setup; safe to
    /// call at most once, and expected before the first `produce` by convention.
    fn start(&self);

    /// Sends a pack toward the bound channels.
    ///
    /// One bound channel: the whole pack goes to that channel's current
    /// subscribers, hash values ignored. Several bound channels: each envelope
    /// is routed by `first_hash mod channel_count` and grouped into per-channel
    /// sub-packs. Channels with no current subscribers drop the delivery
    /// silently; the bus buffers nothing for future subscribers.
    async fn produce(&self, ctx: &CancellationToken, pack: &MsgPack) -> Result<(), BusError>;

    /// Delivers an identical copy of the whole pack to every bound channel's
    /// current subscribers, bypassing hash routing.
    async fn broadcast(&self, ctx: &CancellationToken, pack: &MsgPack) -> Result<(), BusError>;

    /// Blocking read of exactly one pack from this stream's own queue, FIFO
    /// relative to everything enqueued into it. Reports
    /// [`BusError::EndOfStream`] once the queue is closed and drained.
    async fn consume(&self) -> Result<MsgPack, BusError>;

    /// Closes the stream. Consumer role: unregisters the queue from every
    /// subscribed channel and closes it, so pending and future `consume` calls
    /// observe end-of-stream. Producer role: marks the stream closed.
    /// Idempotent; a second call is a no-op.
    async fn close(&self);
}
