//! In-process backend: every handle shares one [`InternalBus`].

use super::{StateConsumer, StateProducer, Transport};
use crate::core::errors::ChannelError;
use crate::core::types::Message;
use futures::future::{self, BoxFuture, FutureExt};
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Default)]
struct Topic {
    subscribers: Vec<mpsc::UnboundedSender<Message>>,
    /// Messages published while no subscriber existed
    backlog: Vec<Message>,
}

/// Topic table shared by all producers and consumers of one process
#[derive(Default)]
pub struct InternalBus {
    topics: Mutex<HashMap<String, Topic>>,
}

impl InternalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, topic: &str, message: Message) {
        let mut topics = self.topics.lock();
        let entry = topics.entry(topic.to_string()).or_default();
        entry.subscribers.retain(|sender| !sender.is_closed());

        match entry.subscribers.split_last() {
            Some((last, rest)) => {
                for sender in rest {
                    let _ = sender.send(message.clone());
                }
                let _ = last.send(message);
            }
            None => {
                trace!("Retaining message on '{}' until it has a subscriber", topic);
                entry.backlog.push(message);
            }
        }
    }

    fn subscribe(&self, topics: &[String]) -> mpsc::UnboundedReceiver<Message> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut table = self.topics.lock();
        for topic in topics {
            let entry = table.entry(topic.clone()).or_default();
            for message in entry.backlog.drain(..) {
                let _ = sender.send(message);
            }
            entry.subscribers.push(sender.clone());
        }
        debug!("Subscribed to {:?}", topics);
        receiver
    }

    /// Number of live subscribers of `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map(|entry| entry.subscribers.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

/// Producer publishing straight into the bus
pub struct InternalProducer {
    bus: Arc<InternalBus>,
}

impl StateProducer for InternalProducer {
    fn produce(&self, topic: &str, message: Message) -> Result<(), ChannelError> {
        self.bus.publish(topic, message);
        Ok(())
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ChannelError>> {
        // delivery is synchronous, nothing left to flush
        future::ready(Ok(())).boxed()
    }
}

/// Transport for running scheduler and components in one process
#[derive(Clone, Default)]
pub struct InternalTransport {
    bus: Arc<InternalBus>,
}

impl InternalTransport {
    pub const NAME: &'static str = "internal";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn bus(&self) -> &Arc<InternalBus> {
        &self.bus
    }
}

impl Transport for InternalTransport {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_remote(&self) -> bool {
        false
    }

    fn producer(&self) -> BoxFuture<'_, Result<Arc<dyn StateProducer>, ChannelError>> {
        let producer: Arc<dyn StateProducer> = Arc::new(InternalProducer {
            bus: self.bus.clone(),
        });
        future::ready(Ok(producer)).boxed()
    }

    fn subscribe(&self, topics: Vec<String>) -> BoxFuture<'_, Result<StateConsumer, ChannelError>> {
        let receiver = self.bus.subscribe(&topics);
        future::ready(Ok(StateConsumer::new(topics, receiver))).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ComponentId, Interrupt};

    fn interrupt(name: &str) -> Message {
        Message::Interrupt(Interrupt::new(ComponentId::new(name)))
    }

    #[tokio::test]
    async fn test_delivers_in_publish_order() {
        let transport = InternalTransport::new();
        let mut consumer = transport.subscribe(vec!["t".to_string()]).await.unwrap();
        let producer = transport.producer().await.unwrap();

        for name in ["a", "b", "c"] {
            producer.produce("t", interrupt(name)).unwrap();
        }

        assert_eq!(consumer.recv().await, Some(interrupt("a")));
        assert_eq!(consumer.recv().await, Some(interrupt("b")));
        assert_eq!(consumer.recv().await, Some(interrupt("c")));
        assert_eq!(consumer.try_recv(), None);
    }

    #[tokio::test]
    async fn test_only_subscribed_topics_are_delivered() {
        let transport = InternalTransport::new();
        let mut consumer = transport.subscribe(vec!["wanted".to_string()]).await.unwrap();
        let producer = transport.producer().await.unwrap();

        producer.produce("other", interrupt("x")).unwrap();
        producer.produce("wanted", interrupt("y")).unwrap();

        assert_eq!(consumer.recv().await, Some(interrupt("y")));
        assert_eq!(consumer.try_recv(), None);
    }

    #[tokio::test]
    async fn test_backlog_replayed_to_first_subscriber() {
        let transport = InternalTransport::new();
        let producer = transport.producer().await.unwrap();
        producer.produce("late", interrupt("early")).unwrap();

        let mut consumer = transport.subscribe(vec!["late".to_string()]).await.unwrap();
        assert_eq!(consumer.recv().await, Some(interrupt("early")));
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_a_copy() {
        let transport = InternalTransport::new();
        let mut first = transport.subscribe(vec!["t".to_string()]).await.unwrap();
        let mut second = transport.subscribe(vec!["t".to_string()]).await.unwrap();
        assert_eq!(transport.bus().subscriber_count("t"), 2);

        transport.producer().await.unwrap().produce("t", interrupt("a")).unwrap();

        assert_eq!(first.recv().await, Some(interrupt("a")));
        assert_eq!(second.recv().await, Some(interrupt("a")));
    }

    #[tokio::test]
    async fn test_dropped_consumer_is_unsubscribed() {
        let transport = InternalTransport::new();
        let consumer = transport.subscribe(vec!["t".to_string()]).await.unwrap();
        assert_eq!(transport.bus().subscriber_count("t"), 1);

        drop(consumer);
        assert_eq!(transport.bus().subscriber_count("t"), 0);
    }
}
