use super::component::Component;
use super::device::Device;
use crate::config::{ComponentConfig, DeviceConfig};
use crate::core::channels::Transport;
use crate::core::errors::ConfigurationError;
use crate::devices;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

pub type DeviceConstructor = fn(&DeviceConfig) -> Result<Box<dyn Device>, ConfigurationError>;

/// Maps a device kind tag to the function that builds that device
pub struct DeviceRegistry {
    constructors: HashMap<&'static str, DeviceConstructor>,
}

impl DeviceRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry holding every device shipped with the crate
    pub fn with_builtin_devices() -> Self {
        let mut registry = Self::new();
        registry.register("trampoline", devices::trampoline::build_trampoline);
        registry.register("random_trampoline", devices::trampoline::build_random_trampoline);
        registry.register("source", devices::source::build_source);
        registry.register("sink", devices::sink::build_sink);
        registry
    }

    /// Register a constructor, replacing any previous one for `kind`
    pub fn register(&mut self, kind: &'static str, constructor: DeviceConstructor) {
        self.constructors.insert(kind, constructor);
    }

    pub fn has_device(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered kinds in sorted order
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.constructors.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Build the device described by `config`
    pub fn build(&self, config: &DeviceConfig) -> Result<Box<dyn Device>, ConfigurationError> {
        let constructor = self
            .constructors
            .get(config.kind())
            .ok_or_else(|| ConfigurationError::UnknownDevice(config.kind().to_string()))?;
        constructor(config)
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::with_builtin_devices()
    }
}

/// Build one component per config, all attached to `transport`
pub fn create_simulations(
    configs: &[ComponentConfig],
    registry: &DeviceRegistry,
    transport: Arc<dyn Transport>,
) -> Result<Vec<Component>, ConfigurationError> {
    configs
        .iter()
        .map(|config| {
            debug!("Creating component {} ({})", config.name, config.device.kind());
            let device = registry.build(&config.device)?;
            Ok(Component::new(config.name.clone(), device, transport.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channels::InternalTransport;
    use crate::core::components::device::DeviceUpdate;
    use crate::core::errors::DeviceError;
    use crate::core::types::{Changes, SimTime};

    struct Fixed;
    impl Device for Fixed {
        fn on_tick(&mut self, _time: SimTime, _changes: &Changes) -> Result<DeviceUpdate, DeviceError> {
            Ok(DeviceUpdate::none())
        }
    }

    fn build_fixed(_config: &DeviceConfig) -> Result<Box<dyn Device>, ConfigurationError> {
        Ok(Box::new(Fixed))
    }

    #[test]
    fn test_builtin_kinds() {
        let registry = DeviceRegistry::with_builtin_devices();
        assert_eq!(
            registry.kinds(),
            vec!["random_trampoline", "sink", "source", "trampoline"]
        );
    }

    #[test]
    fn test_unregistered_kind_is_rejected() {
        let registry = DeviceRegistry::new();
        let result = registry.build(&DeviceConfig::Sink);
        assert!(matches!(result, Err(ConfigurationError::UnknownDevice(kind)) if kind == "sink"));
    }

    #[test]
    fn test_registered_constructor_replaces_builtin() {
        let mut registry = DeviceRegistry::with_builtin_devices();
        registry.register("sink", build_fixed);
        let mut device = registry.build(&DeviceConfig::Sink).unwrap();
        assert_eq!(device.on_tick(0, &Changes::new()).unwrap(), DeviceUpdate::none());
    }

    #[test]
    fn test_create_simulations_creates_configured() {
        let configs = vec![
            ComponentConfig::new("a", DeviceConfig::Trampoline { callback_period: 5 }),
            ComponentConfig::new("b", DeviceConfig::Sink).with_input("input", "a", "output"),
        ];
        let transport: Arc<dyn Transport> = Arc::new(InternalTransport::new());
        let components =
            create_simulations(&configs, &DeviceRegistry::with_builtin_devices(), transport).unwrap();

        let names: Vec<&str> = components.iter().map(|c| c.id().as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(components.iter().all(|c| !c.is_set_up()));
    }

    #[test]
    fn test_create_simulations_fails_on_unknown_device() {
        let configs = vec![ComponentConfig::new("a", DeviceConfig::Sink)];
        let transport: Arc<dyn Transport> = Arc::new(InternalTransport::new());
        let result = create_simulations(&configs, &DeviceRegistry::new(), transport);
        assert!(matches!(result, Err(ConfigurationError::UnknownDevice(_))));
    }
}
