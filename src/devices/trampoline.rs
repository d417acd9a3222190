use crate::config::DeviceConfig;
use crate::core::components::{Device, DeviceUpdate};
use crate::core::errors::{ConfigurationError, DeviceError};
use crate::core::types::{Changes, SimTime};
use rand::Rng;

/// Output port of [`RandomTrampoline`]
pub const OUTPUT_PORT: &str = "output";

/// Produces nothing and asks to be ticked again every `callback_period`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trampoline {
    callback_period: SimTime,
}

impl Trampoline {
    pub fn new(callback_period: SimTime) -> Self {
        Self { callback_period }
    }
}

impl Device for Trampoline {
    fn on_tick(&mut self, _time: SimTime, _changes: &Changes) -> Result<DeviceUpdate, DeviceError> {
        Ok(DeviceUpdate::none().with_callback(self.callback_period))
    }
}

/// A [`Trampoline`] that also emits a random byte on [`OUTPUT_PORT`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomTrampoline {
    callback_period: SimTime,
}

impl RandomTrampoline {
    pub fn new(callback_period: SimTime) -> Self {
        Self { callback_period }
    }
}

impl Device for RandomTrampoline {
    fn on_tick(&mut self, _time: SimTime, _changes: &Changes) -> Result<DeviceUpdate, DeviceError> {
        let byte: u8 = rand::thread_rng().gen();
        let changes = Changes::new().with(OUTPUT_PORT, byte);
        Ok(DeviceUpdate::new(changes, Some(self.callback_period)))
    }
}

pub fn build_trampoline(config: &DeviceConfig) -> Result<Box<dyn Device>, ConfigurationError> {
    match config {
        DeviceConfig::Trampoline { callback_period } => Ok(Box::new(Trampoline::new(*callback_period))),
        other => Err(ConfigurationError::DeviceKindMismatch {
            expected: "trampoline",
            found: other.kind(),
        }),
    }
}

pub fn build_random_trampoline(config: &DeviceConfig) -> Result<Box<dyn Device>, ConfigurationError> {
    match config {
        DeviceConfig::RandomTrampoline { callback_period } => {
            Ok(Box::new(RandomTrampoline::new(*callback_period)))
        }
        other => Err(ConfigurationError::DeviceKindMismatch {
            expected: "random_trampoline",
            found: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Value;

    #[test]
    fn test_trampoline_only_requests_callback() {
        let mut device = Trampoline::new(250);
        let update = device.on_tick(0, &Changes::new()).unwrap();
        assert!(update.changes.is_empty());
        assert_eq!(update.callback_period, Some(250));
    }

    #[test]
    fn test_random_trampoline_emits_byte() {
        let mut device = RandomTrampoline::new(10);
        for time in 0..20 {
            let update = device.on_tick(time * 10, &Changes::new()).unwrap();
            assert_eq!(update.callback_period, Some(10));
            assert_eq!(update.changes.len(), 1);
            match update.changes.get(OUTPUT_PORT) {
                Some(Value::Int(v)) => assert!((0..=255).contains(v), "out of range: {}", v),
                other => panic!("expected an int on {}, got {:?}", OUTPUT_PORT, other),
            }
        }
    }

    #[test]
    fn test_builders_check_kind() {
        let config = DeviceConfig::Trampoline { callback_period: 3 };
        assert!(build_trampoline(&config).is_ok());
        assert!(matches!(
            build_random_trampoline(&config),
            Err(ConfigurationError::DeviceKindMismatch {
                expected: "random_trampoline",
                found: "trampoline"
            })
        ));
    }
}
