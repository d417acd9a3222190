//! Reading component configurations from YAML or JSON files.
//!
//! ```yaml
//! - name: tramp
//!   device: { type: random_trampoline, callback_period: 1000000000 }
//! - name: sink
//!   device: { type: sink }
//!   inputs:
//!     input: { component: tramp, port: output }
//! ```

use super::component_config::ComponentConfig;
use crate::core::errors::ConfigurationError;
use std::path::Path;

/// Load configs, choosing the parser from the file extension
pub fn read_configs<P: AsRef<Path>>(path: P) -> Result<Vec<ComponentConfig>, ConfigurationError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let contents = match ext.to_lowercase().as_str() {
        "yaml" | "yml" | "json" => std::fs::read_to_string(path)?,
        _ => return Err(ConfigurationError::UnknownFormat(ext.to_string())),
    };
    if ext.eq_ignore_ascii_case("json") {
        configs_from_json(&contents)
    } else {
        configs_from_yaml(&contents)
    }
}

pub fn configs_from_yaml(contents: &str) -> Result<Vec<ComponentConfig>, ConfigurationError> {
    Ok(serde_yaml::from_str(contents)?)
}

pub fn configs_from_json(contents: &str) -> Result<Vec<ComponentConfig>, ConfigurationError> {
    Ok(serde_json::from_str(contents)?)
}

/// Find the config named `name`
pub fn find_config<'a>(
    configs: &'a [ComponentConfig],
    name: &str,
) -> Result<&'a ComponentConfig, ConfigurationError> {
    configs
        .iter()
        .find(|config| config.name.as_str() == name)
        .ok_or_else(|| ConfigurationError::ComponentNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::component_config::{DeviceConfig, PortBinding, DEFAULT_CALLBACK_PERIOD};
    use crate::core::types::Value;

    const YAML: &str = r#"
- name: tramp
  device: { type: random_trampoline, callback_period: 500 }
- name: lamp
  device: { type: source, value: 3.5 }
- name: sink
  device:
    type: sink
  inputs:
    input: { component: tramp, port: output }
    level: { component: lamp, port: value }
"#;

    #[test]
    fn test_parse_yaml_configs() {
        let configs = configs_from_yaml(YAML).unwrap();
        assert_eq!(configs.len(), 3);

        assert_eq!(configs[0].name.as_str(), "tramp");
        assert_eq!(
            configs[0].device,
            DeviceConfig::RandomTrampoline { callback_period: 500 }
        );
        assert!(configs[0].inputs.is_empty());

        assert_eq!(configs[1].device, DeviceConfig::Source { value: Value::Float(3.5) });

        let sink = &configs[2];
        assert_eq!(sink.device, DeviceConfig::Sink);
        assert_eq!(sink.inputs["input"], PortBinding::new("tramp", "output"));
        assert_eq!(sink.inputs["level"], PortBinding::new("lamp", "value"));
    }

    #[test]
    fn test_callback_period_defaults() {
        let configs = configs_from_yaml("- name: t\n  device: { type: trampoline }\n").unwrap();
        assert_eq!(
            configs[0].device,
            DeviceConfig::Trampoline { callback_period: DEFAULT_CALLBACK_PERIOD }
        );
    }

    #[test]
    fn test_parse_json_configs() {
        let json = r#"[{"name": "s", "device": {"type": "source", "value": "on"}}]"#;
        let configs = configs_from_json(json).unwrap();
        assert_eq!(configs[0].device, DeviceConfig::Source { value: Value::from("on") });
    }

    #[test]
    fn test_unknown_device_type_is_rejected() {
        let result = configs_from_yaml("- name: x\n  device: { type: warp_drive }\n");
        assert!(matches!(result, Err(ConfigurationError::Yaml(_))));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = read_configs("simulation.toml");
        assert!(matches!(result, Err(ConfigurationError::UnknownFormat(ext)) if ext == "toml"));
    }

    #[test]
    fn test_find_config_by_name() {
        let configs = configs_from_yaml(YAML).unwrap();
        assert_eq!(find_config(&configs, "lamp").unwrap().name.as_str(), "lamp");
        assert!(matches!(
            find_config(&configs, "ghost"),
            Err(ConfigurationError::ComponentNotFound(_))
        ));
    }
}
