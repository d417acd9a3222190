pub mod channels;
pub mod components;
pub mod connections;
pub mod errors;
pub mod execution;
pub mod topics;
pub mod types;
