//! Networked backend: a TCP [`Broker`] and its [`BrokerTransport`] client.
//!
//! Every connection speaks newline-delimited JSON [`Frame`]s. A client
//! connection either publishes (`publish` frames) or subscribes once
//! (`subscribe` frame, then receives `deliver` frames).

use super::{StateConsumer, StateProducer, Transport};
use crate::core::errors::ChannelError;
use crate::core::types::Message;
use futures::future::{BoxFuture, FutureExt};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unit of the broker wire protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Frame {
    Subscribe { topics: Vec<String> },
    Publish { topic: String, message: Message },
    Deliver { topic: String, message: Message },
}

impl Frame {
    pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn decode(line: &str) -> Result<Self, ChannelError> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Write already encoded frames until every sender is gone
async fn write_frames<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
) -> Result<(), ChannelError> {
    while let Some(frame) = frames.recv().await {
        writer.write_all(&frame).await?;
    }
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}

#[derive(Default)]
struct BrokerTopic {
    subscribers: Vec<(Uuid, mpsc::UnboundedSender<Vec<u8>>)>,
    backlog: Vec<Message>,
}

#[derive(Default)]
struct BrokerState {
    topics: Mutex<HashMap<String, BrokerTopic>>,
}

impl BrokerState {
    fn subscribe(&self, session: Uuid, topics: &[String], sender: &mpsc::UnboundedSender<Vec<u8>>) {
        let mut table = self.topics.lock();
        for topic in topics {
            let entry = table.entry(topic.clone()).or_default();
            for message in entry.backlog.drain(..) {
                if let Some(frame) = deliver_frame(topic, message) {
                    let _ = sender.send(frame);
                }
            }
            entry.subscribers.push((session, sender.clone()));
        }
    }

    fn publish(&self, topic: String, message: Message) {
        let mut table = self.topics.lock();
        let entry = table.entry(topic.clone()).or_default();
        entry.subscribers.retain(|(_, sender)| !sender.is_closed());

        if entry.subscribers.is_empty() {
            trace!("Retaining message on '{}' until it has a subscriber", topic);
            entry.backlog.push(message);
            return;
        }
        let Some(frame) = deliver_frame(&topic, message) else {
            return;
        };
        for (_, sender) in &entry.subscribers {
            let _ = sender.send(frame.clone());
        }
    }

    fn remove_session(&self, session: Uuid) {
        let mut table = self.topics.lock();
        for entry in table.values_mut() {
            entry.subscribers.retain(|(id, _)| *id != session);
        }
    }
}

fn deliver_frame(topic: &str, message: Message) -> Option<Vec<u8>> {
    let frame = Frame::Deliver {
        topic: topic.to_string(),
        message,
    };
    match frame.encode() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Dropping message on '{}' that cannot be encoded: {}", topic, e);
            None
        }
    }
}

/// Message broker routing frames between scheduler and component processes
pub struct Broker {
    listener: TcpListener,
    state: Arc<BrokerState>,
}

impl Broker {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, ChannelError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state: Arc::new(BrokerState::default()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), ChannelError> {
        info!("Broker listening on {}", self.local_addr()?);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    let state = self.state.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        let session = Uuid::new_v4();
                        debug!("Session {} opened by {}", session, peer);
                        if let Err(e) = run_session(session, stream, &state, shutdown).await {
                            warn!("Session {} from {} failed: {}", session, peer, e);
                        }
                        state.remove_session(session);
                        debug!("Session {} closed", session);
                    });
                }
            }
        }
        info!("Broker stopped");
        Ok(())
    }
}

async fn run_session(
    session: Uuid,
    stream: TcpStream,
    state: &BrokerState,
    shutdown: CancellationToken,
) -> Result<(), ChannelError> {
    stream.set_nodelay(true)?;
    let (reader, writer) = stream.into_split();
    let (sender, frames) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_frames(writer, frames));
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let frame = match Frame::decode(&line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Session {} sent an undecodable frame, skipping it: {}", session, e);
                continue;
            }
        };
        match frame {
            Frame::Subscribe { topics } => {
                debug!("Session {} subscribes to {:?}", session, topics);
                state.subscribe(session, &topics, &sender);
            }
            Frame::Publish { topic, message } => state.publish(topic, message),
            Frame::Deliver { topic, .. } => {
                warn!("Session {} sent a deliver frame for '{}', ignoring", session, topic);
            }
        }
    }

    state.remove_session(session);
    drop(sender);
    writer_task.await.map_err(|_| ChannelError::Closed)??;
    Ok(())
}

/// Producer queueing publish frames onto its own broker connection
pub struct BrokerProducer {
    sender: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    writer: Mutex<Option<JoinHandle<Result<(), ChannelError>>>>,
}

impl StateProducer for BrokerProducer {
    fn produce(&self, topic: &str, message: Message) -> Result<(), ChannelError> {
        let frame = Frame::Publish {
            topic: topic.to_string(),
            message,
        }
        .encode()?;
        let sender = self.sender.lock();
        let sender = sender.as_ref().ok_or(ChannelError::Closed)?;
        sender.send(frame).map_err(|_| ChannelError::Closed)
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ChannelError>> {
        async move {
            self.sender.lock().take();
            let writer = self.writer.lock().take();
            match writer {
                Some(writer) => writer.await.map_err(|_| ChannelError::Closed)?,
                None => Ok(()),
            }
        }
        .boxed()
    }
}

/// Transport connecting to a running [`Broker`]
#[derive(Debug, Clone)]
pub struct BrokerTransport {
    addr: SocketAddr,
}

impl BrokerTransport {
    pub const NAME: &'static str = "broker";

    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn connect(&self) -> Result<TcpStream, ChannelError> {
        let stream = TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Transport for BrokerTransport {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_remote(&self) -> bool {
        true
    }

    fn producer(&self) -> BoxFuture<'_, Result<Arc<dyn StateProducer>, ChannelError>> {
        async move {
            let stream = self.connect().await?;
            let (sender, frames) = mpsc::unbounded_channel();
            let writer = tokio::spawn(write_frames(stream, frames));
            let producer: Arc<dyn StateProducer> = Arc::new(BrokerProducer {
                sender: Mutex::new(Some(sender)),
                writer: Mutex::new(Some(writer)),
            });
            Ok(producer)
        }
        .boxed()
    }

    fn subscribe(&self, topics: Vec<String>) -> BoxFuture<'_, Result<StateConsumer, ChannelError>> {
        async move {
            let stream = self.connect().await?;
            let (reader, mut writer) = stream.into_split();
            let subscribe = Frame::Subscribe {
                topics: topics.clone(),
            };
            writer.write_all(&subscribe.encode()?).await?;
            writer.flush().await?;

            let (sender, receiver) = mpsc::unbounded_channel();
            let pump = tokio::spawn(async move {
                // the write half lives as long as the subscription
                let _writer = writer;
                let mut lines = BufReader::new(reader).lines();
                loop {
                    let line = match lines.next_line().await {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            warn!("Broker closed the subscription");
                            return Err(ChannelError::Closed);
                        }
                        Err(e) => {
                            warn!("Subscription read failed: {}", e);
                            return Err(e.into());
                        }
                    };
                    match Frame::decode(&line) {
                        Ok(Frame::Deliver { message, .. }) => {
                            if sender.send(message).is_err() {
                                return Ok(());
                            }
                        }
                        Ok(other) => warn!("Unexpected frame from broker: {:?}", other),
                        Err(e) => {
                            warn!("Undecodable frame from broker: {}", e);
                            return Err(e);
                        }
                    }
                }
            });
            Ok(StateConsumer::new(topics, receiver).with_pump(pump))
        }
        .boxed()
    }
}
