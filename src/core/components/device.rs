use crate::core::channels::StateProducer;
use crate::core::errors::{ChannelError, DeviceError};
use crate::core::topics::output_topic;
use crate::core::types::{Changes, ComponentId, Interrupt, Message, SimTime};
use std::sync::Arc;

/// Result of one device tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceUpdate {
    /// New values of the device's output ports
    pub changes: Changes,
    /// Tick again this long after the current time, even without new inputs
    pub callback_period: Option<SimTime>,
}

impl DeviceUpdate {
    pub fn new(changes: Changes, callback_period: Option<SimTime>) -> Self {
        Self {
            changes,
            callback_period,
        }
    }

    /// Nothing changed and no callback requested
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_callback(mut self, period: SimTime) -> Self {
        self.callback_period = Some(period);
        self
    }
}

/// Behaviour model plugged into a [`Component`](super::Component).
///
/// `on_tick` runs synchronously inside the component's message handling.
/// An error is fatal to the owning component; the device is never
/// ticked again because its state may be inconsistent.
pub trait Device: Send {
    fn on_tick(&mut self, time: SimTime, changes: &Changes) -> Result<DeviceUpdate, DeviceError> {
        let _ = (time, changes);
        Err(DeviceError::NotImplemented)
    }

    /// Called once the component's channels are open. Devices that change
    /// state on their own keep the handle to request an immediate tick.
    fn attach_interrupt(&mut self, handle: InterruptHandle) {
        let _ = handle;
    }
}

/// Cloneable capability to raise an interrupt for one component
#[derive(Clone)]
pub struct InterruptHandle {
    source: ComponentId,
    topic: String,
    producer: Arc<dyn StateProducer>,
}

impl InterruptHandle {
    pub fn new(source: ComponentId, producer: Arc<dyn StateProducer>) -> Self {
        let topic = output_topic(&source);
        Self {
            source,
            topic,
            producer,
        }
    }

    pub fn source(&self) -> &ComponentId {
        &self.source
    }

    /// Publish an `Interrupt` on the component's output topic
    pub fn raise(&self) -> Result<(), ChannelError> {
        let interrupt = Interrupt::new(self.source.clone());
        self.producer.produce(&self.topic, Message::Interrupt(interrupt))
    }
}

impl std::fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("source", &self.source)
            .field("topic", &self.topic)
            .finish()
    }
}
