//! Static simulation configuration: component declarations and file loading.

pub mod component_config;
pub mod loading;

pub use component_config::{ComponentConfig, DeviceConfig, PortBinding};
pub use loading::{find_config, read_configs};
