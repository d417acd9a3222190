pub mod inverse_wiring;

pub use inverse_wiring::{InverseWiring, WiringStats};
