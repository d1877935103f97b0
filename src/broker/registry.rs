//! # Broker: channel → subscriber registry with snapshot fan-out.
//!
//! ## Architecture
//! ```text
//! producer stream ── produce(ctx, "red", pack) ──► Broker
//!                                                    │  read lock: snapshot
//!                                                    │  "red" subscriber handles
//!                                                    ▼  (lock released)
//!                                      [queue C1] [queue C2] ... [queue Ck]
//!                                        sequential push, one clone each
//! ```
//!
//! ## Rules
//! - The registry lock guards only the map. Snapshots are taken under the lock;
//!   every blocking enqueue happens after it is released, so a slow subscriber
//!   on one channel never stalls registry operations or other channels.
//! - Delivery is sequential per call: `produce`/`broadcast` return success only
//!   after every snapshotted subscriber accepted the pack. Cancellation mid
//!   fan-out leaves earlier subscribers holding it (documented partial delivery).
//! - An unknown channel has zero subscribers: produce to it succeeds trivially.
//! - A snapshotted queue that closed concurrently is skipped, not an error.
//! - Channel entries are created on first subscribe and removed only by
//!   [`Broker::destroy_channel`]; an emptied subscriber list stays present.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::BusError;
use crate::messages::MsgPack;
use crate::queue::QueueHandle;

/// A consumer queue registered under a channel.
///
/// The label is descriptive metadata for operators; it takes no part in
/// deduplication or routing.
struct Subscriber {
    name: Arc<str>,
    queue: QueueHandle,
}

/// Registry mapping channel names to ordered subscriber lists.
///
/// Created once (`Broker::new`) and shared as an `Arc` with every stream.
pub struct Broker {
    channels: RwLock<HashMap<String, Vec<Subscriber>>>,
}

impl Broker {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: RwLock::new(HashMap::new()),
        })
    }

    /// Appends a subscriber to `channel`, creating the entry if absent.
    ///
    /// Subscribing the same queue twice under one channel yields two entries;
    /// the registry does not deduplicate.
    pub async fn subscribe(&self, channel: &str, queue: QueueHandle, name: &str) {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.to_string())
            .or_default()
            .push(Subscriber {
                name: Arc::from(name),
                queue,
            });
    }

    /// Removes the first subscriber entry of `channel` whose queue matches.
    ///
    /// Other entries are untouched; an emptied list stays present until
    /// [`Broker::destroy_channel`].
    pub async fn unsubscribe(&self, channel: &str, queue: &QueueHandle) {
        let mut channels = self.channels.write().await;
        if let Some(subscribers) = channels.get_mut(channel) {
            if let Some(pos) = subscribers.iter().position(|s| s.queue.same_queue(queue)) {
                subscribers.remove(pos);
            }
        }
    }

    /// Delivers a copy of `pack` to every current subscriber of `channel`.
    ///
    /// Blocks per subscriber while its queue is full; returns
    /// [`BusError::Canceled`] if `ctx` ends mid fan-out (earlier subscribers
    /// already hold the pack). An unknown channel is a trivial success.
    pub async fn produce(
        &self,
        ctx: &CancellationToken,
        channel: &str,
        pack: &MsgPack,
    ) -> Result<(), BusError> {
        let targets = self.snapshot(channel).await;
        self.deliver(ctx, targets, pack).await
    }

    /// Delivers a copy of `pack` to every subscriber of every channel.
    ///
    /// Same blocking and cancellation contract as [`Broker::produce`].
    pub async fn broadcast(&self, ctx: &CancellationToken, pack: &MsgPack) -> Result<(), BusError> {
        let targets = {
            let channels = self.channels.read().await;
            channels
                .values()
                .flat_map(|subs| subs.iter().map(|s| s.queue.clone()))
                .collect::<Vec<_>>()
        };
        self.deliver(ctx, targets, pack).await
    }

    /// Removes the channel entry unconditionally, live subscribers included.
    ///
    /// Those subscribers keep their queues but receive nothing further under
    /// this name until they re-subscribe.
    pub async fn destroy_channel(&self, channel: &str) {
        let mut channels = self.channels.write().await;
        channels.remove(channel);
    }

    /// Number of registered channel entries (including empty ones).
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Number of subscribers under `channel`, or `None` if the entry is absent.
    pub async fn subscriber_count(&self, channel: &str) -> Option<usize> {
        let channels = self.channels.read().await;
        channels.get(channel).map(|subs| subs.len())
    }

    /// Sorted list of registered channel names.
    pub async fn channels(&self) -> Vec<String> {
        let channels = self.channels.read().await;
        let mut names: Vec<String> = channels.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Subscription labels under `channel`, in registration order.
    pub async fn subscriptions(&self, channel: &str) -> Vec<Arc<str>> {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .map(|subs| subs.iter().map(|s| Arc::clone(&s.name)).collect())
            .unwrap_or_default()
    }

    /// Snapshot of the channel's queue handles under the read lock.
    async fn snapshot(&self, channel: &str) -> Vec<QueueHandle> {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .map(|subs| subs.iter().map(|s| s.queue.clone()).collect())
            .unwrap_or_default()
    }

    /// Sequential push into each snapshotted queue, lock already released.
    async fn deliver(
        &self,
        ctx: &CancellationToken,
        targets: Vec<QueueHandle>,
        pack: &MsgPack,
    ) -> Result<(), BusError> {
        for queue in targets {
            match queue.push(ctx, pack.clone()).await {
                Ok(()) => {}
                // Consumer closed between snapshot and push: skip it.
                Err(BusError::QueueClosed) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    use crate::messages::{MsgEnvelope, Payload, SearchRequest};
    use crate::queue::BoundedQueue;

    fn pack(id: u64) -> MsgPack {
        let mut p = MsgPack::new();
        p.push(
            MsgEnvelope::new(Payload::SearchRequest(SearchRequest {
                request_id: id,
                query: Vec::new(),
                result_channel: "0".into(),
            }))
            .with_hash(id as u32),
        );
        p
    }

    #[tokio::test]
    async fn test_subscribe_creates_channel_entry() {
        let broker = Broker::new();
        let queue = BoundedQueue::new(4).unwrap();

        broker.subscribe("red", queue.handle(), "red_consumer").await;

        assert_eq!(broker.channel_count().await, 1);
        assert_eq!(broker.subscriber_count("red").await, Some(1));
        assert_eq!(broker.channels().await, vec!["red".to_string()]);
    }

    #[tokio::test]
    async fn test_unsubscribe_leaves_empty_entry() {
        let broker = Broker::new();
        let queue = BoundedQueue::new(4).unwrap();

        broker.subscribe("red", queue.handle(), "red_consumer").await;
        broker.unsubscribe("red", &queue.handle()).await;

        assert_eq!(broker.subscriber_count("red").await, Some(0));
        assert_eq!(broker.channel_count().await, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_only_matching_queue() {
        let broker = Broker::new();
        let first = BoundedQueue::new(4).unwrap();
        let second = BoundedQueue::new(4).unwrap();

        broker.subscribe("red", first.handle(), "first").await;
        broker.subscribe("red", second.handle(), "second").await;
        broker.unsubscribe("red", &first.handle()).await;

        assert_eq!(broker.subscriber_count("red").await, Some(1));
        assert_eq!(broker.subscriptions("red").await, vec![Arc::from("second")]);
    }

    #[tokio::test]
    async fn test_double_subscribe_yields_two_entries() {
        let broker = Broker::new();
        let queue = BoundedQueue::new(4).unwrap();
        let ctx = CancellationToken::new();

        broker.subscribe("red", queue.handle(), "a").await;
        broker.subscribe("red", queue.handle(), "b").await;
        assert_eq!(broker.subscriber_count("red").await, Some(2));

        // Both entries get a copy on produce.
        broker.produce(&ctx, "red", &pack(1)).await.unwrap();
        assert_eq!(queue.pending(), 2);

        // One unsubscribe balances one entry.
        broker.unsubscribe("red", &queue.handle()).await;
        assert_eq!(broker.subscriber_count("red").await, Some(1));
    }

    #[tokio::test]
    async fn test_produce_unknown_channel_is_trivial_success() {
        let broker = Broker::new();
        let ctx = CancellationToken::new();

        broker.produce(&ctx, "nowhere", &pack(1)).await.unwrap();
        assert_eq!(broker.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_produce_reaches_all_subscribers() {
        let broker = Broker::new();
        let ctx = CancellationToken::new();
        let queues: Vec<BoundedQueue> = (0..3).map(|_| BoundedQueue::new(4).unwrap()).collect();

        for (i, q) in queues.iter().enumerate() {
            broker.subscribe("red", q.handle(), &format!("c{i}")).await;
        }
        broker.produce(&ctx, "red", &pack(9)).await.unwrap();

        for q in &queues {
            assert_eq!(q.pop(&ctx).await.unwrap(), pack(9));
        }
    }

    #[tokio::test]
    async fn test_broadcast_covers_every_channel() {
        let broker = Broker::new();
        let ctx = CancellationToken::new();
        let red = BoundedQueue::new(4).unwrap();
        let blue = BoundedQueue::new(4).unwrap();

        broker.subscribe("red", red.handle(), "red_consumer").await;
        broker.subscribe("blue", blue.handle(), "blue_consumer").await;
        broker.broadcast(&ctx, &pack(3)).await.unwrap();

        assert_eq!(red.pop(&ctx).await.unwrap(), pack(3));
        assert_eq!(blue.pop(&ctx).await.unwrap(), pack(3));
    }

    #[tokio::test]
    async fn test_destroy_channel_is_unconditional() {
        let broker = Broker::new();
        let queue = BoundedQueue::new(4).unwrap();

        broker.subscribe("red", queue.handle(), "red_consumer").await;
        broker.destroy_channel("red").await;
        assert_eq!(broker.channel_count().await, 0);
        assert_eq!(broker.subscriber_count("red").await, None);

        // A later subscribe starts a fresh entry.
        broker.subscribe("red", queue.handle(), "again").await;
        assert_eq!(broker.subscriber_count("red").await, Some(1));
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_skipped() {
        let broker = Broker::new();
        let ctx = CancellationToken::new();
        let open = BoundedQueue::new(4).unwrap();
        let closed = BoundedQueue::new(4).unwrap();

        broker.subscribe("red", closed.handle(), "closed").await;
        broker.subscribe("red", open.handle(), "open").await;
        closed.close();

        broker.produce(&ctx, "red", &pack(5)).await.unwrap();
        assert_eq!(open.pop(&ctx).await.unwrap(), pack(5));
    }

    #[tokio::test]
    async fn test_cancel_mid_fanout_allows_partial_delivery() {
        let broker = Broker::new();
        let ctx = CancellationToken::new();
        // First target accepts, second is full so the fan-out blocks there.
        let first = BoundedQueue::new(1).unwrap();
        let second = BoundedQueue::new(1).unwrap();
        second.handle().push(&ctx, pack(0)).await.unwrap();

        broker.subscribe("red", first.handle(), "first").await;
        broker.subscribe("red", second.handle(), "second").await;

        let produce_ctx = ctx.clone();
        let broker_ref = broker.clone();
        let blocked =
            tokio::spawn(async move { broker_ref.produce(&produce_ctx, "red", &pack(1)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.cancel();

        let got = timeout(Duration::from_millis(200), blocked)
            .await
            .expect("blocked produce was not woken by cancellation")
            .unwrap();
        assert_eq!(got, Err(BusError::Canceled));

        // The earlier subscriber already holds the pack.
        assert_eq!(first.pending(), 1);
        assert_eq!(second.pending(), 1);
    }

    #[tokio::test]
    async fn test_backpressure_unblocks_when_consumer_drains() {
        let broker = Broker::new();
        let ctx = CancellationToken::new();
        let queue = std::sync::Arc::new(BoundedQueue::new(1).unwrap());

        broker.subscribe("red", queue.handle(), "slow").await;
        broker.produce(&ctx, "red", &pack(1)).await.unwrap();

        let broker_ref = broker.clone();
        let produce_ctx = ctx.clone();
        let blocked =
            tokio::spawn(async move { broker_ref.produce(&produce_ctx, "red", &pack(2)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(queue.pop(&ctx).await.unwrap(), pack(1));
        timeout(Duration::from_millis(200), blocked)
            .await
            .expect("produce did not resume after the consumer drained")
            .unwrap()
            .unwrap();
        assert_eq!(queue.pop(&ctx).await.unwrap(), pack(2));
    }
}
