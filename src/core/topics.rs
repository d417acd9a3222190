//! Deterministic topic names for a component's two channels.
//!
//! Names are injective in the component ID: the ID is embedded verbatim
//! between a fixed prefix and a direction suffix, and no suffix is a
//! suffix of the other.

use super::types::ComponentId;

const TOPIC_PREFIX: &str = "ticksim-";

/// Topic the scheduler publishes `Input`s for `id` on
pub fn input_topic(id: &ComponentId) -> String {
    format!("{}{}-in", TOPIC_PREFIX, id)
}

/// Topic `id` publishes its `Output`s and `Interrupt`s on
pub fn output_topic(id: &ComponentId) -> String {
    format!("{}{}-out", TOPIC_PREFIX, id)
}
