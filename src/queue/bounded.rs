//! # Bounded FIFO queue with cancellable push/pop and close-then-drain.
//!
//! [`BoundedQueue`] is a fixed-capacity FIFO of [`MsgPack`]s built over a
//! `tokio::sync::mpsc` channel plus a close token. The mpsc pair supplies
//! FIFO order and capacity-based suspension; the token lets a synchronous
//! `close()` wake a blocked consumer without reaching into the receiver.
//!
//! ## Rules
//! - One consumer owns the queue and calls [`BoundedQueue::pop`]; any number of
//!   producer-side deliveries go through cloned [`QueueHandle`]s.
//! - `push` suspends while the queue is at capacity (back-pressure) and fails
//!   with `QueueClosed` once the queue is closed.
//! - `pop` drains buffered packs after `close()`, then reports `EndOfStream`.
//! - Both ends abort with `Canceled` when their context ends first.

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::BusError;
use crate::messages::MsgPack;

/// Fixed-capacity, thread-safe FIFO of message packs.
///
/// Owned by exactly one consumer stream for reads; writers never read and the
/// reader never writes, so the only shared state is the channel itself.
pub struct BoundedQueue {
    tx: mpsc::Sender<MsgPack>,
    rx: Mutex<mpsc::Receiver<MsgPack>>,
    closed: CancellationToken,
    capacity: usize,
}

impl BoundedQueue {
    /// Creates a queue holding at most `capacity` packs.
    ///
    /// Fails with [`BusError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, BusError> {
        if capacity == 0 {
            return Err(BusError::InvalidCapacity { capacity });
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self {
            tx,
            rx: Mutex::new(rx),
            closed: CancellationToken::new(),
            capacity,
        })
    }

    /// Returns a cloneable push handle for broker registration.
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            tx: self.tx.clone(),
            closed: self.closed.clone(),
        }
    }

    /// Blocking dequeue of one pack in FIFO order.
    ///
    /// Suspends until a pack is available, the queue is closed and drained
    /// ([`BusError::EndOfStream`]), or `ctx` is cancelled ([`BusError::Canceled`]).
    pub async fn pop(&self, ctx: &CancellationToken) -> Result<MsgPack, BusError> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(BusError::Canceled),
            pack = rx.recv() => pack.ok_or(BusError::EndOfStream),
            _ = self.closed.cancelled() => {
                // Closed while empty-or-racing: hand out whatever is still
                // buffered, signal end-of-stream only once drained.
                match rx.try_recv() {
                    Ok(pack) => Ok(pack),
                    Err(_) => Err(BusError::EndOfStream),
                }
            }
        }
    }

    /// Closes the queue. Idempotent.
    ///
    /// Pending and future [`BoundedQueue::pop`] calls drain buffered packs and
    /// then observe [`BusError::EndOfStream`]; pushes fail with
    /// [`BusError::QueueClosed`].
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// True once [`BoundedQueue::close`] has been called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Maximum number of buffered packs.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of packs currently buffered (or mid-enqueue).
    pub fn pending(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    /// True when nothing is buffered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }
}

/// Cloneable push side of a [`BoundedQueue`].
///
/// The broker stores one handle per subscription; handle identity
/// ([`QueueHandle::same_queue`]) is what exact unsubscribe matching runs on.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<MsgPack>,
    closed: CancellationToken,
}

impl QueueHandle {
    /// Blocking enqueue of one pack.
    ///
    /// Suspends while the queue is at capacity. Fails with
    /// [`BusError::Canceled`] when `ctx` ends first and
    /// [`BusError::QueueClosed`] when the consumer closed the queue.
    pub async fn push(&self, ctx: &CancellationToken, pack: MsgPack) -> Result<(), BusError> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(BusError::Canceled),
            _ = self.closed.cancelled() => Err(BusError::QueueClosed),
            permit = self.tx.reserve() => match permit {
                Ok(permit) => {
                    permit.send(pack);
                    Ok(())
                }
                Err(_) => Err(BusError::QueueClosed),
            },
        }
    }

    /// True once the owning queue has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// True when both handles feed the same queue.
    #[inline]
    pub fn same_queue(&self, other: &QueueHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    use crate::messages::{MsgEnvelope, MsgPack, Payload, SearchRequest};

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

    #[test]
    fn test_zero_capacity_rejected() {
        match BoundedQueue::new(0) {
            Err(BusError::InvalidCapacity { capacity }) => assert_eq!(capacity, 0),
            other => panic!("expected InvalidCapacity, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = BoundedQueue::new(4).unwrap();
        let handle = queue.handle();
        let ctx = CancellationToken::new();

        for id in 1..=3 {
            handle.push(&ctx, pack(id)).await.unwrap();
        }
        for id in 1..=3 {
            assert_eq!(queue.pop(&ctx).await.unwrap(), pack(id));
        }
    }

    #[tokio::test]
    async fn test_push_blocks_at_capacity() {
        let queue = BoundedQueue::new(1).unwrap();
        let handle = queue.handle();
        let ctx = CancellationToken::new();

        handle.push(&ctx, pack(1)).await.unwrap();
        assert_eq!(queue.pending(), 1);

        // Second push must suspend until the consumer frees a slot.
        let blocked = timeout(Duration::from_millis(50), handle.push(&ctx, pack(2))).await;
        assert!(blocked.is_err(), "push into a full queue did not block");

        assert_eq!(queue.pop(&ctx).await.unwrap(), pack(1));
        timeout(Duration::from_millis(200), handle.push(&ctx, pack(2)))
            .await
            .expect("push did not resume after a slot freed")
            .unwrap();
    }

    #[tokio::test]
    async fn test_pop_blocks_until_push() {
        let queue = BoundedQueue::new(1).unwrap();
        let handle = queue.handle();
        let ctx = CancellationToken::new();

        let blocked = timeout(Duration::from_millis(50), queue.pop(&ctx)).await;
        assert!(blocked.is_err(), "pop on an empty queue did not block");

        handle.push(&ctx, pack(7)).await.unwrap();
        let got = timeout(Duration::from_millis(200), queue.pop(&ctx))
            .await
            .expect("pop did not resume after push")
            .unwrap();
        assert_eq!(got, pack(7));
    }

    #[tokio::test]
    async fn test_close_drains_then_end_of_stream() {
        let queue = BoundedQueue::new(4).unwrap();
        let handle = queue.handle();
        let ctx = CancellationToken::new();

        handle.push(&ctx, pack(1)).await.unwrap();
        handle.push(&ctx, pack(2)).await.unwrap();
        queue.close();

        assert_eq!(queue.pop(&ctx).await.unwrap(), pack(1));
        assert_eq!(queue.pop(&ctx).await.unwrap(), pack(2));
        assert_eq!(queue.pop(&ctx).await, Err(BusError::EndOfStream));
        // Terminal signal repeats on every further pop.
        assert_eq!(queue.pop(&ctx).await, Err(BusError::EndOfStream));
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_pop() {
        let queue = std::sync::Arc::new(BoundedQueue::new(1).unwrap());
        let ctx = CancellationToken::new();

        let waiter = {
            let queue = queue.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { queue.pop(&ctx).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let got = timeout(Duration::from_millis(200), waiter)
            .await
            .expect("blocked pop was not woken by close")
            .unwrap();
        assert_eq!(got, Err(BusError::EndOfStream));
    }

    #[tokio::test]
    async fn test_push_after_close_rejected() {
        let queue = BoundedQueue::new(1).unwrap();
        let handle = queue.handle();
        let ctx = CancellationToken::new();

        queue.close();
        assert_eq!(handle.push(&ctx, pack(1)).await, Err(BusError::QueueClosed));
    }

    #[tokio::test]
    async fn test_cancelled_pop_returns_canceled() {
        let queue = BoundedQueue::new(1).unwrap();
        let ctx = CancellationToken::new();
        ctx.cancel();

        assert_eq!(queue.pop(&ctx).await, Err(BusError::Canceled));
    }

    #[tokio::test]
    async fn test_cancelled_push_returns_canceled() {
        let queue = BoundedQueue::new(1).unwrap();
        let handle = queue.handle();
        let ctx = CancellationToken::new();

        handle.push(&ctx, pack(1)).await.unwrap();

        let push_ctx = ctx.clone();
        let blocked = tokio::spawn(async move { handle.push(&push_ctx, pack(2)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.cancel();

        let got = timeout(Duration::from_millis(200), blocked)
            .await
            .expect("blocked push was not woken by cancellation")
            .unwrap();
        assert_eq!(got, Err(BusError::Canceled));
    }

    #[tokio::test]
    async fn test_handle_identity() {
        let a = BoundedQueue::new(1).unwrap();
        let b = BoundedQueue::new(1).unwrap();

        assert!(a.handle().same_queue(&a.handle()));
        assert!(!a.handle().same_queue(&b.handle()));
    }
}
