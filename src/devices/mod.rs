//! Toy device models used by the binary and the end-to-end tests

pub mod sink;
pub mod source;
pub mod trampoline;

pub use sink::Sink;
pub use source::Source;
pub use trampoline::{RandomTrampoline, Trampoline};
