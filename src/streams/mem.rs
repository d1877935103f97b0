//! # In-memory message stream.
//!
//! [`MemStream`] implements [`MsgStream`] against an in-process
//! [`Broker`]: the producer side resolves target channels and asks the broker
//! to fan out, the consumer side blocks on its own [`BoundedQueue`].
//!
//! ## Architecture
//! ```text
//! producer MemStream ── produce(ctx, pack) ──► route by first_hash mod N
//!     channels: [red, blue, black, green]          │
//!                                                  ▼
//!                                    Broker.produce(channel, sub-pack)
//!                                                  │ per-subscriber push
//!                                                  ▼
//! consumer MemStream ◄── consume() ◄── [its own BoundedQueue]
//! ```
//!
//! ## Rules
//! - A stream binds exactly one role, once; the binding is fixed afterwards.
//! - Producer close only marks the stream; consumer close unregisters its
//!   queue everywhere, then closes the queue so `consume` drains and ends.
//! - FIFO holds per producer stream per channel; nothing is ordered across
//!   producers or across channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::broker::Broker;
use crate::error::BusError;
use crate::messages::MsgPack;
use crate::queue::BoundedQueue;
use crate::streams::stream::MsgStream;

/// Role binding, fixed for the stream's lifetime once set.
enum Binding {
    Unbound,
    Producer {
        channels: Vec<String>,
    },
    Consumer {
        channels: Vec<String>,
        subscription: Arc<str>,
    },
}

/// In-memory [`MsgStream`] over a shared [`Broker`].
pub struct MemStream {
    broker: Arc<Broker>,
    /// Stream-lifetime context; governs `consume`.
    ctx: CancellationToken,
    queue: BoundedQueue,
    binding: RwLock<Binding>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl MemStream {
    /// Creates an unbound stream whose queue holds up to `capacity` packs.
    ///
    /// Fails with [`BusError::InvalidCapacity`] when `capacity` is zero. The
    /// token is the stream's context: cancelling it aborts a blocked `consume`.
    pub fn new(
        broker: Arc<Broker>,
        ctx: CancellationToken,
        capacity: usize,
    ) -> Result<Self, BusError> {
        Ok(Self {
            broker,
            ctx,
            queue: BoundedQueue::new(capacity)?,
            binding: RwLock::new(Binding::Unbound),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// True once [`MsgStream::close`] has run.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// True once [`MsgStream::start`] has run.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Channels this stream is bound to, in binding order.
    pub async fn channels(&self) -> Vec<String> {
        match &*self.binding.read().await {
            Binding::Unbound => Vec::new(),
            Binding::Producer { channels } | Binding::Consumer { channels, .. } => channels.clone(),
        }
    }

    /// Number of packs currently buffered in this stream's queue.
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Subscription label of a consumer-bound stream.
    pub async fn subscription(&self) -> Option<Arc<str>> {
        match &*self.binding.read().await {
            Binding::Consumer { subscription, .. } => Some(Arc::clone(subscription)),
            _ => None,
        }
    }

    /// Producer channel list, or the role error for this call site.
    async fn producer_channels(&self) -> Result<Vec<String>, BusError> {
        match &*self.binding.read().await {
            Binding::Producer { channels } => Ok(channels.clone()),
            _ => Err(BusError::NotProducer),
        }
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::ClosedStream);
        }
        Ok(())
    }

    /// Splits `pack` into per-channel sub-packs by `first_hash mod N`.
    ///
    /// Envelope order is preserved inside each sub-pack and the pack's time
    /// span is copied onto every one. Envelopes without hash values are not
    /// routable and are dropped.
    fn partition(pack: &MsgPack, n: usize) -> Vec<Option<MsgPack>> {
        let mut buckets: Vec<Option<MsgPack>> = (0..n).map(|_| None).collect();
        for msg in pack.iter() {
            let Some(key) = msg.partition_key() else {
                continue;
            };
            let idx = key as usize % n;
            buckets[idx]
                .get_or_insert_with(|| MsgPack::with_span(pack.begin_ts, pack.end_ts))
                .push(msg.clone());
        }
        buckets
    }
}

#[async_trait]
impl MsgStream for MemStream {
    async fn as_producer(&self, channels: Vec<String>) -> Result<(), BusError> {
        self.ensure_open()?;
        if channels.is_empty() {
            return Err(BusError::EmptyChannels);
        }
        let mut binding = self.binding.write().await;
        if !matches!(*binding, Binding::Unbound) {
            return Err(BusError::AlreadyBound);
        }
        *binding = Binding::Producer { channels };
        Ok(())
    }

    async fn as_consumer(
        &self,
        channels: Vec<String>,
        subscription: &str,
    ) -> Result<(), BusError> {
        self.ensure_open()?;
        if channels.is_empty() {
            return Err(BusError::EmptyChannels);
        }
        let mut binding = self.binding.write().await;
        if !matches!(*binding, Binding::Unbound) {
            return Err(BusError::AlreadyBound);
        }
        for channel in &channels {
            self.broker
                .subscribe(channel, self.queue.handle(), subscription)
                .await;
        }
        *binding = Binding::Consumer {
            channels,
            subscription: Arc::from(subscription),
        };
        Ok(())
    }

    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    async fn produce(&self, ctx: &CancellationToken, pack: &MsgPack) -> Result<(), BusError> {
        self.ensure_open()?;
        let channels = self.producer_channels().await?;

        if channels.len() == 1 {
            return self.broker.produce(ctx, &channels[0], pack).await;
        }

        let buckets = Self::partition(pack, channels.len());
        for (idx, bucket) in buckets.into_iter().enumerate() {
            if let Some(sub_pack) = bucket {
                self.broker.produce(ctx, &channels[idx], &sub_pack).await?;
            }
        }
        Ok(())
    }

    async fn broadcast(&self, ctx: &CancellationToken, pack: &MsgPack) -> Result<(), BusError> {
        self.ensure_open()?;
        let channels = self.producer_channels().await?;
        for channel in &channels {
            self.broker.produce(ctx, channel, pack).await?;
        }
        Ok(())
    }

    async fn consume(&self) -> Result<MsgPack, BusError> {
        {
            let binding = self.binding.read().await;
            if !matches!(*binding, Binding::Consumer { .. }) {
                return Err(BusError::NotConsumer);
            }
        }
        // A closed consumer keeps draining; the queue reports EndOfStream
        // once empty instead of the blanket ClosedStream error.
        self.queue.pop(&self.ctx).await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let binding = self.binding.read().await;
        if let Binding::Consumer { channels, .. } = &*binding {
            let handle = self.queue.handle();
            for channel in channels {
                self.broker.unsubscribe(channel, &handle).await;
            }
            self.queue.close();
        }
    }
}
