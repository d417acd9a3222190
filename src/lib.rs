pub mod config;
pub mod core;
pub mod devices;
pub mod macros;

// Re-export commonly used types
pub use crate::config::{read_configs, ComponentConfig, DeviceConfig};
pub use crate::core::channels::{BackendRegistry, ChannelConfig, StateConsumer, StateProducer, Transport};
pub use crate::core::components::{create_simulations, Component, Device, DeviceRegistry, DeviceUpdate};
pub use crate::core::connections::InverseWiring;
pub use crate::core::errors::{ChannelError, ConfigurationError, DeviceError, SimError};
pub use crate::core::execution::{run_all, MasterScheduler, RunConfig, Runnable, SchedulerState};
pub use crate::core::types::{Changes, ComponentId, Input, Interrupt, Message, Output, SimTime, Value};
