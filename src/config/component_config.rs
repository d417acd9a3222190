use crate::core::types::{ComponentId, InputPort, OutputPort, SimTime, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One second of simulated time
pub const DEFAULT_CALLBACK_PERIOD: SimTime = 1_000_000_000;

fn default_callback_period() -> SimTime {
    DEFAULT_CALLBACK_PERIOD
}

/// Upstream end of a wire: `port` on `component`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub component: ComponentId,
    pub port: String,
}

impl PortBinding {
    pub fn new(component: impl Into<ComponentId>, port: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            port: port.into(),
        }
    }

    pub fn output_port(&self) -> OutputPort {
        self.component.output(&self.port)
    }
}

/// Device model selection and its parameters, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceConfig {
    /// Does nothing but ask to be ticked again
    Trampoline {
        #[serde(default = "default_callback_period")]
        callback_period: SimTime,
    },
    /// Emits a random byte on `output` every callback period
    RandomTrampoline {
        #[serde(default = "default_callback_period")]
        callback_period: SimTime,
    },
    /// Emits a fixed value on `value` whenever ticked
    Source { value: Value },
    /// Logs its inputs
    Sink,
}

impl DeviceConfig {
    /// Tag used to look up the device constructor
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceConfig::Trampoline { .. } => "trampoline",
            DeviceConfig::RandomTrampoline { .. } => "random_trampoline",
            DeviceConfig::Source { .. } => "source",
            DeviceConfig::Sink => "sink",
        }
    }
}

/// Static declaration of one component: its name, device and wiring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: ComponentId,
    pub device: DeviceConfig,
    /// input port -> upstream output port
    #[serde(default)]
    pub inputs: BTreeMap<String, PortBinding>,
}

impl ComponentConfig {
    pub fn new(name: impl Into<ComponentId>, device: DeviceConfig) -> Self {
        Self {
            name: name.into(),
            device,
            inputs: BTreeMap::new(),
        }
    }

    /// Bind `input` to `port` on `upstream`
    pub fn with_input(
        mut self,
        input: impl Into<String>,
        upstream: impl Into<ComponentId>,
        port: impl Into<String>,
    ) -> Self {
        self.inputs.insert(input.into(), PortBinding::new(upstream, port));
        self
    }

    /// Declared bindings as (consumer input, producer output) pairs
    pub fn bindings(&self) -> impl Iterator<Item = (InputPort, OutputPort)> + '_ {
        self.inputs
            .iter()
            .map(move |(input, binding)| (self.name.input(input), binding.output_port()))
    }
}
