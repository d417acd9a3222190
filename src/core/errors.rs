use super::types::{ComponentId, InputPort, OutputPort};
use thiserror::Error;

/// Malformed or conflicting static configuration. Fatal at start-up.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Component '{0}' is declared more than once")]
    DuplicateComponent(ComponentId),

    #[error("Input port '{port}' is bound to both '{existing}' and '{conflicting}'")]
    ConflictingBinding {
        port: InputPort,
        existing: OutputPort,
        conflicting: OutputPort,
    },

    #[error("Input port '{port}' is bound to unknown component '{upstream}'")]
    UnknownUpstream { port: InputPort, upstream: ComponentId },

    #[error("No device registered for kind '{0}'")]
    UnknownDevice(String),

    #[error("Device constructor for '{expected}' was given a '{found}' config")]
    DeviceKindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Component '{0}' not found in configuration")]
    ComponentNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Failure inside a channel backend
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Unknown backend '{name}', expected one of: {available}")]
    UnknownBackend { name: String, available: String },

    #[error("Backend '{0}' cannot be used across processes")]
    NotRemote(String),

    #[error("Channel closed")]
    Closed,

    #[error("Not set up: call set_up() before using channel handles")]
    NotSetUp,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failure raised by a device model from `on_tick`
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("on_tick is not implemented for this device")]
    NotImplemented,

    #[error("{0}")]
    Failed(String),
}

/// Top-level error for scheduler and component hosts. None are retried.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Component '{component}' received an input addressed to '{target}'")]
    MisroutedMessage {
        component: ComponentId,
        target: ComponentId,
    },

    #[error("Device model of '{component}' failed at t={time}: {source}")]
    DeviceModel {
        component: ComponentId,
        time: u64,
        #[source]
        source: DeviceError,
    },

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
