//! # membus
//!
//! **membus** is an in-process publish/subscribe message bus for Rust.
//!
//! It lets components of a larger data platform exchange ordered batches of
//! typed messages over named channels without a live external broker: the same
//! produce/consume surface a network-backed client would offer, served from
//! process memory. The crate is designed as a building block — payload types
//! are opaque contracts, and deployment topology (channel names, capacities)
//! is supplied by the surrounding service.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌───────────────┐      ┌───────────────┐      ┌───────────────┐
//!  │   MemStream   │      │   MemStream   │      │   MemStream   │
//!  │  (producer)   │      │  (producer)   │      │  (consumer)   │
//!  └──────┬────────┘      └──────┬────────┘      └──────┬────────┘
//!         │ produce/broadcast    │                      │ registers its
//!         ▼                      ▼                      ▼ queue handle
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Broker (channel registry)                                        │
//! │  - channel name → ordered subscriber list                         │
//! │  - snapshot under lock, fan-out after release                     │
//! │  - destroy_channel / counts / listing                             │
//! └──────┬──────────────────────┬──────────────────────┬──────────────┘
//!        ▼ push (back-pressure) ▼                      ▼
//!  [BoundedQueue C1]      [BoundedQueue C2]   ...   [BoundedQueue CN]
//!        │                      │                      │
//!        ▼ consume()            ▼ consume()            ▼ consume()
//!   consumer stream        consumer stream        consumer stream
//! ```
//!
//! ### Delivery rules
//! - A producer bound to **one** channel sends whole packs to that channel's
//!   current subscribers; hash values are ignored.
//! - A producer bound to **N** channels partition-routes each envelope by
//!   `first_hash mod N` and sends per-channel sub-packs.
//! - [`MsgStream::broadcast`] copies the whole pack to every bound channel,
//!   bypassing routing; [`Broker::broadcast`] covers the whole registry.
//! - Fan-out is sequential: success means every subscriber present at call
//!   time has the pack queued. A full subscriber queue suspends the producer
//!   (back-pressure); a cancelled call may have partially delivered.
//! - A channel with no current subscribers drops the delivery silently; the
//!   bus buffers nothing for future subscribers.
//!
//! ### Ordering
//! Per producer stream per channel, subscribers observe packs in send order.
//! Nothing is ordered across producers or across channels. Partition routing
//! is deterministic for a fixed hash value and channel-list length.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use membus::{Broker, MemStream, MsgEnvelope, MsgPack, MsgStream, Payload, SearchRequest};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = Broker::new();
//!     let ctx = CancellationToken::new();
//!
//!     let consumer = MemStream::new(broker.clone(), ctx.clone(), 64)?;
//!     consumer.as_consumer(vec!["searches".into()], "query-node").await?;
//!
//!     let producer = MemStream::new(broker.clone(), ctx.clone(), 64)?;
//!     producer.as_producer(vec!["searches".into()]).await?;
//!     producer.start();
//!
//!     let mut pack = MsgPack::new();
//!     pack.push(
//!         MsgEnvelope::new(Payload::SearchRequest(SearchRequest {
//!             request_id: 1,
//!             query: b"plan".to_vec(),
//!             result_channel: "results-0".into(),
//!         }))
//!         .with_hash(1),
//!     );
//!     producer.produce(&ctx, &pack).await?;
//!
//!     let delivered = consumer.consume().await?;
//!     assert_eq!(delivered, pack);
//!
//!     consumer.close().await;
//!     producer.close().await;
//!     Ok(())
//! }
//! ```

mod broker;
mod error;
mod messages;
mod queue;
mod streams;

// ---- Public re-exports ----

pub use broker::Broker;
pub use error::BusError;
pub use messages::{
    MsgEnvelope, MsgKind, MsgPack, Payload, SearchRequest, SearchResult, Status, Timestamp,
};
pub use queue::{BoundedQueue, QueueHandle};
pub use streams::{MemStream, MsgStream};
