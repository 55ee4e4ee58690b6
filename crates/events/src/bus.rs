//! Event publishing/subscription abstraction (mechanics only).
//!
//! Aggregates only *accumulate* domain events. Handing them to subscribers happens
//! after the engine returns a finished instance, typically inside a repository `save`,
//! through an [`EventBus`].
//!
//! - **Transport-agnostic**: in-memory channels, brokers, etc.
//! - **At-least-once**: a retried save may publish an event twice; consumers must be idempotent
//! - **No persistence**: the bus distributes, it does not store

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to the bus. Each subscription receives every published message
/// (broadcast semantics), in publication order.
///
/// ```ignore
/// let subscription = bus.subscribe();
/// repository.save(&mut order)?;
/// while let Ok(event) = subscription.try_recv() {
///     notify(event);
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything published so far that has not been received yet.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Process-wide pub/sub for domain events.
///
/// `publish()` can fail; failures are surfaced to the caller (usually a repository),
/// which keeps the events pending on the aggregate so a later save can retry.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + core::fmt::Display + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
