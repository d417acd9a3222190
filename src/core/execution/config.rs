//! Runtime options for a simulation run
//!
//! Selects the channel backend and how far simulated time may advance.
//! Wiring and devices come from the component configuration files.

use crate::core::channels::ChannelConfig;
use crate::core::channels::InternalTransport;
use crate::core::types::SimTime;
use std::net::SocketAddr;

/// Configuration for running a scheduler and its components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Name of the channel backend, looked up in the backend registry
    pub backend: String,
    /// Settings handed to the backend constructor
    pub channel: ChannelConfig,
    /// Simulated time after which the scheduler stops advancing
    pub stop_at: Option<SimTime>,
}

impl RunConfig {
    /// Create a run configuration with default values
    ///
    /// Defaults to the in-process backend with no stop time
    pub fn new() -> Self {
        Self {
            backend: InternalTransport::NAME.to_string(),
            channel: ChannelConfig::default(),
            stop_at: None,
        }
    }

    /// Set the channel backend by registered name
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Set the address of the message broker
    ///
    /// # Note
    /// Only the broker backend reads this setting
    pub fn with_broker_addr(mut self, addr: SocketAddr) -> Self {
        self.channel.broker_addr = addr;
        self
    }

    /// Stop the scheduler before it advances past `time`
    pub fn with_stop_at(mut self, time: Option<SimTime>) -> Self {
        self.stop_at = time;
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new()
    }
}
