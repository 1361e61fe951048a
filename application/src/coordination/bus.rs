//! In-memory message bus
//!
//! Every subscriber owns an independent bounded queue. Publishing never
//! blocks: when a subscriber's queue is full the message is dropped for that
//! subscriber only. Delivery is FIFO per subscriber and best-effort overall.

use parlor_domain::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

/// Per-subscriber queue capacity
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 16;

/// Errors returned by [`Bus::broadcast`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("bus is closed")]
    Closed,
}

/// Receiving end of one subscription.
///
/// `recv()` yields `None` once the bus is closed and the queue is drained.
pub type Subscription = mpsc::Receiver<Arc<Message>>;

#[derive(Default)]
struct Subscribers {
    queues: Vec<mpsc::Sender<Arc<Message>>>,
    closed: bool,
}

/// Publish/subscribe fan-out of [`Message`]s.
pub struct Bus {
    subscribers: RwLock<Subscribers>,
    capacity: usize,
    dropped: AtomicU64,
}

impl Bus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Create a bus whose subscriber queues hold `capacity` messages (min 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Subscribers::default()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Deliver `message` to every current subscriber without waiting.
    ///
    /// Broadcasts share a read lock and may run concurrently; they only
    /// serialize against `subscribe` and `close`.
    pub fn broadcast(&self, message: Message) -> Result<(), BusError> {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if subscribers.closed {
            return Err(BusError::Closed);
        }

        let message = Arc::new(message);
        for (index, queue) in subscribers.queues.iter().enumerate() {
            match queue.try_send(Arc::clone(&message)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        subscriber = index,
                        kind = %message.kind(),
                        "Subscriber queue full, message dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(subscriber = index, "Subscriber went away");
                }
            }
        }

        Ok(())
    }

    /// Register a new subscriber.
    ///
    /// On a closed bus the returned subscription is already exhausted.
    pub fn subscribe(&self) -> Subscription {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let (tx, rx) = mpsc::channel(self.capacity);
        if subscribers.closed {
            // Dropping the only sender ends the stream immediately.
            drop(tx);
        } else {
            subscribers.queues.push(tx);
        }
        rx
    }

    /// Close the bus. Idempotent.
    ///
    /// Every subscription ends after yielding what is already queued, later
    /// broadcasts fail and later subscriptions are exhausted.
    pub fn close(&self) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !subscribers.closed {
            subscribers.closed = true;
            subscribers.queues.clear();
            debug!("Bus closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .closed
    }

    /// Number of live registrations (0 after close)
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .queues
            .len()
    }

    /// Total deliveries discarded because a subscriber queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_domain::MessageKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let bus = Bus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.broadcast(Message::system("hello")).unwrap();

        assert_eq!(a.recv().await.unwrap().text(), "hello");
        assert_eq!(b.recv().await.unwrap().text(), "hello");
    }

    #[tokio::test]
    async fn test_delivery_is_fifo_per_subscriber() {
        let bus = Bus::new();
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.broadcast(Message::system(format!("m{}", i))).unwrap();
        }
        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap().text(), format!("m{}", i));
        }
    }

    #[tokio::test]
    async fn test_full_subscriber_drops_without_blocking_others() {
        let bus = Bus::with_capacity(2);
        let mut slow = bus.subscribe();
        let mut fast = bus.subscribe();

        bus.broadcast(Message::system("1")).unwrap();
        bus.broadcast(Message::system("2")).unwrap();
        assert_eq!(fast.recv().await.unwrap().text(), "1");
        assert_eq!(fast.recv().await.unwrap().text(), "2");

        // `slow` is full now; this must neither block nor fail.
        let third = tokio::time::timeout(
            Duration::from_secs(1),
            async { bus.broadcast(Message::system("3")) },
        )
        .await
        .expect("broadcast must not block");
        assert!(third.is_ok());

        assert_eq!(fast.recv().await.unwrap().text(), "3");
        assert_eq!(bus.dropped(), 1);

        assert_eq!(slow.recv().await.unwrap().text(), "1");
        assert_eq!(slow.recv().await.unwrap().text(), "2");
        bus.close();
        assert!(slow.recv().await.is_none(), "message 3 was dropped for slow");
    }

    #[tokio::test]
    async fn test_close_is_terminal_and_idempotent() {
        let bus = Bus::new();
        let mut rx = bus.subscribe();
        bus.broadcast(Message::system("before")).unwrap();

        bus.close();
        bus.close();

        assert!(bus.is_closed());
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.broadcast(Message::system("after")), Err(BusError::Closed));
        assert_eq!(bus.broadcast(Message::log("again")), Err(BusError::Closed));

        // Queued messages are still drained before the end of stream.
        assert_eq!(rx.recv().await.unwrap().text(), "before");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_after_close_is_exhausted() {
        let bus = Bus::new();
        bus.close();
        let mut rx = bus.subscribe();
        assert!(rx.recv().await.is_none());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_count_as_drop() {
        let bus = Bus::new();
        let rx = bus.subscribe();
        drop(rx);
        bus.broadcast(Message::system("nobody listens")).unwrap();
        assert_eq!(bus.dropped(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_broadcasts() {
        let bus = Arc::new(Bus::with_capacity(64));
        let mut rx = bus.subscribe();

        let mut handles = Vec::new();
        for t in 0..4 {
            let bus = Arc::clone(&bus);
            handles.push(tokio::spawn(async move {
                for i in 0..8 {
                    bus.broadcast(Message::log(format!("{}-{}", t, i))).unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        bus.close();

        let mut received = 0;
        while let Some(m) = rx.recv().await {
            assert_eq!(m.kind(), MessageKind::Log);
            received += 1;
        }
        assert_eq!(received, 32);
    }
}
