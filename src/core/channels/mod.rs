//! Publish/subscribe channel abstraction.
//!
//! The scheduler and components only ever talk through a [`Transport`]:
//! they publish [`Message`]s on a topic through a [`StateProducer`] and
//! receive messages for a set of topics through a [`StateConsumer`].
//! Two interchangeable backends exist:
//!
//! - [`internal`]: direct delivery inside one process
//! - [`broker`]: delivery over TCP through a [`broker::Broker`] process
//!
//! Both deliver messages of one topic in publish order, and both retain
//! messages published to a topic nobody subscribes to yet, replaying them
//! to the first subscriber.

pub mod broker;
pub mod internal;
pub mod registry;

pub use broker::{Broker, BrokerTransport};
pub use internal::InternalTransport;
pub use registry::{BackendRegistry, ChannelConfig};

use crate::core::errors::ChannelError;
use crate::core::types::Message;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Publish capability. Publishing never waits on the receiver.
pub trait StateProducer: Send + Sync {
    /// Queue `message` for delivery on `topic`
    fn produce(&self, topic: &str, message: Message) -> Result<(), ChannelError>;

    /// Flush queued messages and release the handle
    fn close(&self) -> BoxFuture<'_, Result<(), ChannelError>>;
}

/// Subscribe capability: a backend that hands out producers and consumers
pub trait Transport: Send + Sync {
    /// Name this backend is registered under
    fn name(&self) -> &'static str;

    /// Whether scheduler and components may live in different processes
    fn is_remote(&self) -> bool;

    fn producer(&self) -> BoxFuture<'_, Result<Arc<dyn StateProducer>, ChannelError>>;

    fn subscribe(&self, topics: Vec<String>) -> BoxFuture<'_, Result<StateConsumer, ChannelError>>;
}

/// Receive handle for a set of subscribed topics.
///
/// Dropping the consumer ends the subscription; a backing I/O task, if
/// any, is aborted.
pub struct StateConsumer {
    topics: Vec<String>,
    receiver: mpsc::UnboundedReceiver<Message>,
    pump: Option<JoinHandle<Result<(), ChannelError>>>,
}

impl StateConsumer {
    pub(crate) fn new(topics: Vec<String>, receiver: mpsc::UnboundedReceiver<Message>) -> Self {
        Self {
            topics,
            receiver,
            pump: None,
        }
    }

    /// Attach the task that feeds this consumer so it shares its lifetime
    pub(crate) fn with_pump(mut self, pump: JoinHandle<Result<(), ChannelError>>) -> Self {
        self.pump = Some(pump);
        self
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Wait for the next message; `None` once the subscription is closed
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Why the subscription ended, once `recv` has returned `None`.
    /// A backend that stops without reporting an error yields `Closed`.
    pub async fn close_reason(&mut self) -> ChannelError {
        match self.pump.take() {
            Some(pump) => match pump.await {
                Ok(Err(e)) => e,
                _ => ChannelError::Closed,
            },
            None => ChannelError::Closed,
        }
    }

    /// Take a message if one is already queued
    pub fn try_recv(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }

    /// Stop accepting new messages. Already queued messages can still be
    /// drained with `recv`.
    pub fn close(&mut self) {
        self.receiver.close();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for StateConsumer {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for StateConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateConsumer")
            .field("topics", &self.topics)
            .field("pumped", &self.pump.is_some())
            .finish()
    }
}
