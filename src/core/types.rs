use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Logical simulation time in nanoseconds. Never wall-clock.
pub type SimTime = u64;

/// Unique name of one simulated component
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Create a new component ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create an output port handle
    pub fn output(&self, port: &str) -> OutputPort {
        OutputPort {
            component_id: self.clone(),
            port_name: port.to_string(),
        }
    }

    /// Create an input port handle
    pub fn input(&self, port: &str) -> InputPort {
        InputPort {
            component_id: self.clone(),
            port_name: port.to_string(),
        }
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ComponentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Handle for an output port
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputPort {
    pub(crate) component_id: ComponentId,
    pub(crate) port_name: String,
}

impl OutputPort {
    pub fn component_id(&self) -> &ComponentId {
        &self.component_id
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl std::fmt::Display for OutputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.component_id, self.port_name)
    }
}

/// Handle for an input port
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputPort {
    pub(crate) component_id: ComponentId,
    pub(crate) port_name: String,
}

impl InputPort {
    pub fn component_id(&self) -> &ComponentId {
        &self.component_id
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl std::fmt::Display for InputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.component_id, self.port_name)
    }
}

/// Opaque value carried by a port.
///
/// Equality and hashing are total: floats compare by bit pattern, so
/// `NaN == NaN` and `0.0 != -0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "float_repr")] f64),
    Str(String),
}

/// Finite floats are plain numbers. NaN and the infinities, which JSON
/// cannot hold, are written as `{"f64_bits": <bit pattern>}`.
mod float_repr {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Bits { f64_bits: u64 },
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            Repr::Bits {
                f64_bits: value.to_bits(),
            }
            .serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Number(value) => value,
            Repr::Bits { f64_bits } => f64::from_bits(f64_bits),
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Str(v) => v.hash(state),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Immutable mapping from port name to value.
///
/// Clones share storage; `insert` copies on write, so a clone handed to
/// another component never observes later writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Changes(Arc<BTreeMap<String, Value>>);

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, port: &str) -> Option<&Value> {
        self.0.get(port)
    }

    pub fn contains(&self, port: &str) -> bool {
        self.0.contains_key(port)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(port, value)| (port.as_str(), value))
    }

    /// Set one port, overwriting any previous value
    pub fn insert(&mut self, port: impl Into<String>, value: impl Into<Value>) {
        Arc::make_mut(&mut self.0).insert(port.into(), value.into());
    }

    /// Builder form of [`Changes::insert`]
    pub fn with(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(port, value);
        self
    }

    /// Union of both mappings; `other` wins on shared ports
    pub fn merge(&self, other: &Changes) -> Changes {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut merged = self.clone();
        let map = Arc::make_mut(&mut merged.0);
        for (port, value) in other.0.iter() {
            map.insert(port.clone(), value.clone());
        }
        merged
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Changes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = iter
            .into_iter()
            .map(|(port, value)| (port.into(), value.into()))
            .collect();
        Changes(Arc::new(map))
    }
}

impl std::fmt::Display for Changes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (port, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {}", port, value)?;
        }
        write!(f, "}}")
    }
}

/// Instruction to `target` that these input ports changed as of `time`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Input {
    pub target: ComponentId,
    pub time: SimTime,
    pub changes: Changes,
}

impl Input {
    pub fn new(target: ComponentId, time: SimTime, changes: Changes) -> Self {
        Self {
            target,
            time,
            changes,
        }
    }
}

/// New output-port values of `source` as of `time`, plus an optional
/// request to be ticked again `callback_period` after `time`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Output {
    pub source: ComponentId,
    pub time: SimTime,
    pub changes: Changes,
    pub callback_period: Option<SimTime>,
}

impl Output {
    pub fn new(
        source: ComponentId,
        time: SimTime,
        changes: Changes,
        callback_period: Option<SimTime>,
    ) -> Self {
        Self {
            source,
            time,
            changes,
            callback_period,
        }
    }
}

/// Out-of-band request from `source` to be ticked as soon as possible
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interrupt {
    pub source: ComponentId,
}

impl Interrupt {
    pub fn new(source: ComponentId) -> Self {
        Self { source }
    }
}

/// Everything that travels over a topic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    Input(Input),
    Output(Output),
    Interrupt(Interrupt),
}

impl Message {
    /// The component this message is addressed to or originates from
    pub fn component_id(&self) -> &ComponentId {
        match self {
            Message::Input(input) => &input.target,
            Message::Output(output) => &output.source,
            Message::Interrupt(interrupt) => &interrupt.source,
        }
    }
}

impl From<Input> for Message {
    fn from(input: Input) -> Self {
        Message::Input(input)
    }
}

impl From<Output> for Message {
    fn from(output: Output) -> Self {
        Message::Output(output)
    }
}

impl From<Interrupt> for Message {
    fn from(interrupt: Interrupt) -> Self {
        Message::Interrupt(interrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_changes_equal_by_contents() {
        let a = Changes::new().with("x", 1).with("y", "on");
        let b: Changes = vec![("y", Value::from("on")), ("x", Value::from(1))]
            .into_iter()
            .collect();

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_changes_insert_does_not_leak_into_clones() {
        let original = Changes::new().with("x", 1);
        let mut copy = original.clone();
        copy.insert("x", 2);

        assert_eq!(original.get("x"), Some(&Value::Int(1)));
        assert_eq!(copy.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_changes_merge_last_write_wins() {
        let first = Changes::new().with("a", 1).with("b", 1);
        let second = Changes::new().with("b", 2).with("c", 3);
        let merged = first.merge(&second);

        assert_eq!(merged, Changes::new().with("a", 1).with("b", 2).with("c", 3));
        assert_eq!(first.len(), 2, "merge must not modify its receiver");
    }

    #[test]
    fn test_float_values_hash_by_bits() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_eq!(hash_of(&Value::Float(2.5)), hash_of(&Value::Float(2.5)));
    }

    #[test]
    fn test_value_untagged_json() {
        let changes = Changes::new()
            .with("flag", true)
            .with("count", 5)
            .with("ratio", 0.5)
            .with("name", "pump");
        let json = serde_json::to_string(&changes).unwrap();
        assert_eq!(json, r#"{"count":5,"flag":true,"name":"pump","ratio":0.5}"#);

        let back: Changes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, changes);
    }

    #[test]
    fn test_non_finite_floats_survive_json() {
        let changes = Changes::new()
            .with("nan", f64::NAN)
            .with("neg_nan", -f64::NAN)
            .with("inf", f64::INFINITY)
            .with("neg_inf", f64::NEG_INFINITY);
        let json = serde_json::to_string(&changes).unwrap();
        assert!(!json.contains("null"), "got: {}", json);
        assert!(json.contains(&format!(r#""inf":{{"f64_bits":{}}}"#, f64::INFINITY.to_bits())));

        let back: Changes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, changes);
    }

    #[test]
    fn test_message_is_kind_tagged() {
        let message = Message::from(Interrupt::new(ComponentId::new("pump")));
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"kind":"interrupt","source":"pump"}"#);
        assert_eq!(message.component_id().as_str(), "pump");
    }

    #[test]
    fn test_port_handles() {
        let id = ComponentId::new("pump");
        let out = id.output("flow");
        assert_eq!(out.component_id(), &id);
        assert_eq!(out.port_name(), "flow");
        assert_eq!(out.to_string(), "pump.flow");
        assert_eq!(id.input("power").to_string(), "pump.power");
    }
}
