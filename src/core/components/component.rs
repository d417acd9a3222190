use super::device::{Device, InterruptHandle};
use crate::core::channels::{StateConsumer, StateProducer, Transport};
use crate::core::errors::{ChannelError, SimError};
use crate::core::topics::{input_topic, output_topic};
use crate::core::types::{Changes, ComponentId, Input, Interrupt, Message, Output, SimTime};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A simulated device attached to the channel layer.
///
/// Receives `Input`s on its input topic, ticks its [`Device`] and
/// publishes `Output`s and `Interrupt`s on its output topic. Components
/// share no state with anything else.
pub struct Component {
    id: ComponentId,
    device: Box<dyn Device>,
    transport: Arc<dyn Transport>,
    consumer: Option<StateConsumer>,
    producer: Option<Arc<dyn StateProducer>>,
}

impl Component {
    pub fn new(id: ComponentId, device: Box<dyn Device>, transport: Arc<dyn Transport>) -> Self {
        Self {
            id,
            device,
            transport,
            consumer: None,
            producer: None,
        }
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn is_set_up(&self) -> bool {
        self.consumer.is_some() && self.producer.is_some()
    }

    /// Subscribe to the input topic, open the output producer and hand the
    /// device its interrupt handle. Calling it again is a no-op.
    pub async fn set_up(&mut self) -> Result<(), SimError> {
        if self.is_set_up() {
            return Ok(());
        }
        let consumer = self.transport.subscribe(vec![input_topic(&self.id)]).await?;
        let producer = self.transport.producer().await?;
        self.device
            .attach_interrupt(InterruptHandle::new(self.id.clone(), producer.clone()));
        self.consumer = Some(consumer);
        self.producer = Some(producer);
        debug!("Component {} set up on '{}' backend", self.id, self.transport.name());
        Ok(())
    }

    /// Tick the device with `input` and publish its result
    pub fn handle_input(&mut self, input: Input) -> Result<(), SimError> {
        if input.target != self.id {
            error!(
                "Component {} received an input addressed to {}",
                self.id, input.target
            );
            return Err(SimError::MisroutedMessage {
                component: self.id.clone(),
                target: input.target,
            });
        }

        debug!("Component {} ticked at {} with {}", self.id, input.time, input.changes);
        let update = self
            .device
            .on_tick(input.time, &input.changes)
            .map_err(|source| SimError::DeviceModel {
                component: self.id.clone(),
                time: input.time,
                source,
            })?;
        self.output(input.time, update.changes, update.callback_period)
    }

    /// Publish an `Output` on this component's output topic
    pub fn output(
        &self,
        time: SimTime,
        changes: Changes,
        callback_period: Option<SimTime>,
    ) -> Result<(), SimError> {
        let output = Output::new(self.id.clone(), time, changes, callback_period);
        self.publish(Message::Output(output))
    }

    /// Publish an `Interrupt` on this component's output topic
    pub fn raise_interrupt(&self) -> Result<(), SimError> {
        self.publish(Message::Interrupt(Interrupt::new(self.id.clone())))
    }

    fn publish(&self, message: Message) -> Result<(), SimError> {
        let producer = self.producer.as_ref().ok_or(ChannelError::NotSetUp)?;
        producer.produce(&output_topic(&self.id), message)?;
        Ok(())
    }

    /// Serve inputs until `shutdown` is cancelled. An input topic that
    /// closes before that is an error. Channel resources are released on
    /// every exit path.
    pub async fn run_forever(mut self, shutdown: CancellationToken) -> Result<(), SimError> {
        let result = match self.set_up().await {
            Ok(()) => self.receive_until(&shutdown).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!("Component {} stopped: {}", self.id, e);
        }
        let released = self.tear_down().await;
        result.and(released)
    }

    async fn receive_until(&mut self, shutdown: &CancellationToken) -> Result<(), SimError> {
        info!("Component {} running", self.id);
        loop {
            let consumer = self.consumer.as_mut().ok_or(ChannelError::NotSetUp)?;
            let message = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                message = consumer.recv() => message,
            };
            match message {
                Some(Message::Input(input)) => self.handle_input(input)?,
                Some(other) => warn!(
                    "Component {} ignoring unexpected message on its input topic: {:?}",
                    self.id, other
                ),
                None => {
                    let reason = consumer.close_reason().await;
                    error!("Input topic of {} closed unexpectedly: {}", self.id, reason);
                    return Err(reason.into());
                }
            }
        }
    }

    /// Close the subscription and flush the producer
    pub async fn tear_down(&mut self) -> Result<(), SimError> {
        if let Some(mut consumer) = self.consumer.take() {
            consumer.close();
        }
        if let Some(producer) = self.producer.take() {
            producer.close().await?;
        }
        debug!("Component {} released its channels", self.id);
        Ok(())
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("backend", &self.transport.name())
            .field("set_up", &self.is_set_up())
            .finish()
    }
}
