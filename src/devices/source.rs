use crate::config::DeviceConfig;
use crate::core::components::{Device, DeviceUpdate};
use crate::core::errors::{ConfigurationError, DeviceError};
use crate::core::types::{Changes, SimTime, Value};

/// Output port of [`Source`]
pub const VALUE_PORT: &str = "value";

/// Emits a fixed value each time it is ticked
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    value: Value,
}

impl Source {
    pub fn new(value: impl Into<Value>) -> Self {
        Self { value: value.into() }
    }
}

impl Device for Source {
    fn on_tick(&mut self, _time: SimTime, _changes: &Changes) -> Result<DeviceUpdate, DeviceError> {
        Ok(DeviceUpdate::new(
            Changes::new().with(VALUE_PORT, self.value.clone()),
            None,
        ))
    }
}

pub fn build_source(config: &DeviceConfig) -> Result<Box<dyn Device>, ConfigurationError> {
    match config {
        DeviceConfig::Source { value } => Ok(Box::new(Source::new(value.clone()))),
        other => Err(ConfigurationError::DeviceKindMismatch {
            expected: "source",
            found: other.kind(),
        }),
    }
}
