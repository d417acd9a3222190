use crate::config::ComponentConfig;
use crate::core::errors::ConfigurationError;
use crate::core::types::{ComponentId, InputPort, OutputPort};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Read-only index from each output port to the input ports wired to it.
///
/// Built once, before simulation starts, by inverting every component's
/// declared `inputs`. Each input port has at most one upstream source.
#[derive(Debug, Clone, Default)]
pub struct InverseWiring {
    /// producer -> output port -> consumers
    wiring: HashMap<ComponentId, HashMap<String, BTreeSet<InputPort>>>,
    /// consumer input -> producer output
    sources: BTreeMap<InputPort, OutputPort>,
    components: BTreeSet<ComponentId>,
}

impl InverseWiring {
    /// Build from a component set and its (input <- output) bindings
    pub fn new<C, B>(components: C, bindings: B) -> Result<Self, ConfigurationError>
    where
        C: IntoIterator<Item = ComponentId>,
        B: IntoIterator<Item = (InputPort, OutputPort)>,
    {
        let mut index = Self::default();
        for id in components {
            if !index.components.insert(id.clone()) {
                return Err(ConfigurationError::DuplicateComponent(id));
            }
        }
        for (input, output) in bindings {
            index.bind(input, output)?;
        }
        Ok(index)
    }

    /// Build from declared component configurations
    pub fn from_component_configs(configs: &[ComponentConfig]) -> Result<Self, ConfigurationError> {
        Self::new(
            configs.iter().map(|config| config.name.clone()),
            configs.iter().flat_map(|config| config.bindings()),
        )
    }

    fn bind(&mut self, input: InputPort, output: OutputPort) -> Result<(), ConfigurationError> {
        if !self.components.contains(input.component_id()) {
            return Err(ConfigurationError::ComponentNotFound(
                input.component_id().to_string(),
            ));
        }
        if !self.components.contains(output.component_id()) {
            let upstream = output.component_id().clone();
            return Err(ConfigurationError::UnknownUpstream { port: input, upstream });
        }

        if let Some(existing) = self.sources.get(&input) {
            if *existing == output {
                return Ok(());
            }
            return Err(ConfigurationError::ConflictingBinding {
                port: input,
                existing: existing.clone(),
                conflicting: output,
            });
        }

        self.wiring
            .entry(output.component_id().clone())
            .or_default()
            .entry(output.port_name().to_string())
            .or_default()
            .insert(input.clone());
        self.sources.insert(input, output);
        Ok(())
    }

    /// Input ports fed by `port` on `source`; empty when nothing is wired to it
    pub fn lookup<'a>(&'a self, source: &ComponentId, port: &str) -> impl Iterator<Item = &'a InputPort> + 'a {
        self.wiring
            .get(source)
            .and_then(|ports| ports.get(port))
            .into_iter()
            .flatten()
    }

    /// Upstream output port feeding `input`, if bound
    pub fn source_of(&self, input: &InputPort) -> Option<&OutputPort> {
        self.sources.get(input)
    }

    pub fn components(&self) -> impl Iterator<Item = &ComponentId> {
        self.components.iter()
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.components.contains(id)
    }

    /// Components without any wired input, in ID order. These seed the
    /// simulation at time zero.
    pub fn roots(&self) -> Vec<ComponentId> {
        let consumers: BTreeSet<&ComponentId> =
            self.sources.keys().map(|input| input.component_id()).collect();
        self.components
            .iter()
            .filter(|id| !consumers.contains(id))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> WiringStats {
        WiringStats {
            components: self.components.len(),
            bound_outputs: self.wiring.values().map(|ports| ports.len()).sum(),
            bound_inputs: self.sources.len(),
        }
    }
}

/// Wiring statistics for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WiringStats {
    pub components: usize,
    pub bound_outputs: usize,
    pub bound_inputs: usize,
}
