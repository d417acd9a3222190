use super::{BrokerTransport, InternalTransport, Transport};
use crate::core::errors::ChannelError;
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

/// Default address of the message broker
pub const DEFAULT_BROKER_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 7878);

/// Settings handed to every backend constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub broker_addr: SocketAddr,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            broker_addr: DEFAULT_BROKER_ADDR,
        }
    }
}

pub type BackendConstructor = fn(&ChannelConfig) -> Result<Arc<dyn Transport>, ChannelError>;

fn internal_backend(_config: &ChannelConfig) -> Result<Arc<dyn Transport>, ChannelError> {
    Ok(Arc::new(InternalTransport::new()))
}

fn broker_backend(config: &ChannelConfig) -> Result<Arc<dyn Transport>, ChannelError> {
    Ok(Arc::new(BrokerTransport::new(config.broker_addr)))
}

struct BackendEntry {
    constructor: BackendConstructor,
    remote: bool,
}

/// Table of channel backends, selected by name at start-up
pub struct BackendRegistry {
    backends: BTreeMap<&'static str, BackendEntry>,
}

impl BackendRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
        }
    }

    /// Registry holding the internal and broker backends
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(InternalTransport::NAME, false, internal_backend);
        registry.register(BrokerTransport::NAME, true, broker_backend);
        registry
    }

    /// Register a backend, replacing any previous one with the same name
    pub fn register(&mut self, name: &'static str, remote: bool, constructor: BackendConstructor) {
        self.backends.insert(name, BackendEntry { constructor, remote });
    }

    /// Names of registered backends, optionally only those usable across processes
    pub fn names(&self, remote_only: bool) -> Vec<&'static str> {
        self.backends
            .iter()
            .filter(|(_, entry)| entry.remote || !remote_only)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn has_backend(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Construct the backend registered as `name`
    pub fn create(&self, name: &str, config: &ChannelConfig) -> Result<Arc<dyn Transport>, ChannelError> {
        let entry = self
            .backends
            .get(name)
            .ok_or_else(|| ChannelError::UnknownBackend {
                name: name.to_string(),
                available: self.names(false).join(", "),
            })?;
        (entry.constructor)(config)
    }

    /// Like [`create`](Self::create), but refuses process-local backends
    pub fn create_remote(&self, name: &str, config: &ChannelConfig) -> Result<Arc<dyn Transport>, ChannelError> {
        let transport = self.create(name, config)?;
        if !transport.is_remote() {
            return Err(ChannelError::NotRemote(name.to_string()));
        }
        Ok(transport)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_names() {
        let registry = BackendRegistry::standard();
        assert_eq!(registry.names(false), vec!["broker", "internal"]);
        assert_eq!(registry.names(true), vec!["broker"]);
        assert!(registry.has_backend("internal"));
    }

    #[test]
    fn test_create_by_name() {
        let registry = BackendRegistry::standard();
        let config = ChannelConfig::default();

        let internal = registry.create("internal", &config).unwrap();
        assert_eq!(internal.name(), "internal");
        assert!(!internal.is_remote());

        let broker = registry.create("broker", &config).unwrap();
        assert_eq!(broker.name(), "broker");
        assert!(broker.is_remote());
    }

    #[test]
    fn test_unknown_backend_lists_available() {
        let registry = BackendRegistry::standard();
        let err = registry
            .create("kafka", &ChannelConfig::default())
            .err()
            .expect("kafka is not registered");
        assert!(err.to_string().contains("broker, internal"), "got: {}", err);
    }

    #[test]
    fn test_remote_only_rejects_internal() {
        let registry = BackendRegistry::standard();
        let result = registry.create_remote("internal", &ChannelConfig::default());
        assert!(matches!(result, Err(ChannelError::NotRemote(_))));
    }
}
