use crate::config::DeviceConfig;
use crate::core::components::{Device, DeviceUpdate};
use crate::core::errors::{ConfigurationError, DeviceError};
use crate::core::types::{Changes, SimTime};
use log::info;

/// Logs every input it receives and produces nothing
#[derive(Debug, Clone, Default)]
pub struct Sink {
    received: u64,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ticks seen so far
    pub fn received(&self) -> u64 {
        self.received
    }
}

impl Device for Sink {
    fn on_tick(&mut self, time: SimTime, changes: &Changes) -> Result<DeviceUpdate, DeviceError> {
        self.received += 1;
        info!("sink @ {}: {}", time, changes);
        Ok(DeviceUpdate::none())
    }
}

pub fn build_sink(config: &DeviceConfig) -> Result<Box<dyn Device>, ConfigurationError> {
    match config {
        DeviceConfig::Sink => Ok(Box::new(Sink::new())),
        other => Err(ConfigurationError::DeviceKindMismatch {
            expected: "sink",
            found: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes;

    #[test]
    fn test_sink_counts_and_emits_nothing() {
        let mut device = Sink::new();
        assert_eq!(device.on_tick(0, &changes! {}).unwrap(), DeviceUpdate::none());
        assert_eq!(device.on_tick(3, &changes! {"input" => 7}).unwrap(), DeviceUpdate::none());
        assert_eq!(device.received(), 2);
    }
}
