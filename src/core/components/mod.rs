pub mod component;
pub mod device;
pub mod registry;

pub use component::Component;
pub use device::{Device, DeviceUpdate, InterruptHandle};
pub use registry::{create_simulations, DeviceConstructor, DeviceRegistry};
