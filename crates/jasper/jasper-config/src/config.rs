use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct JasperConfig {
    #[serde(default = "defaults::device_name")]
    pub device_name: String,
    #[serde(default = "defaults::node_prefix")]
    pub node_prefix: String,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    /// Maximum number of handles open at once. Unbounded when absent.
    #[serde(default)]
    pub handle_budget: Option<usize>,
    #[serde(default)]
    pub workload: WorkloadConfig,
}

/// Shape of the demo traffic the engine drives through the device.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    #[serde(default = "defaults::clients")]
    pub clients: usize,
    #[serde(default = "defaults::rounds")]
    pub rounds: usize,
    #[serde(default = "defaults::payload")]
    pub payload: String,
    /// Every n-th client is opened write-only; 0 disables write-only clients.
    #[serde(default = "defaults::write_only_every")]
    pub write_only_every: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn device_name() -> String {
        "simpleFifo".into()
    }

    pub fn node_prefix() -> String {
        "simplefifo".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn clients() -> usize {
        3
    }

    pub fn rounds() -> usize {
        1_000
    }

    pub fn payload() -> String {
        "simple char".into()
    }

    pub fn write_only_every() -> usize {
        3
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            clients: defaults::clients(),
            rounds: defaults::rounds(),
            payload: defaults::payload(),
            write_only_every: defaults::write_only_every(),
        }
    }
}

impl Default for JasperConfig {
    fn default() -> Self {
        Self {
            device_name: defaults::device_name(),
            node_prefix: defaults::node_prefix(),
            log_level: defaults::log_level(),
            handle_budget: None,
            workload: WorkloadConfig::default(),
        }
    }
}

impl JasperConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&toml_to_str)
    }

    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let jasper_config: JasperConfig = toml::from_str(toml_str)?;
        Ok(jasper_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = JasperConfig::parse("").unwrap();
        assert_eq!(cfg, JasperConfig::default());
        assert_eq!(cfg.device_name, "simpleFifo");
        assert_eq!(cfg.workload.payload, "simple char");
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = JasperConfig::parse(
            r#"
            node_prefix = "fanout"
            log_level = "debug"
            handle_budget = 8

            [workload]
            clients = 5
            write_only_every = 0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.node_prefix, "fanout");
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.handle_budget, Some(8));
        assert_eq!(cfg.workload.clients, 5);
        assert_eq!(cfg.workload.write_only_every, 0);
        assert_eq!(cfg.workload.rounds, 1_000);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = JasperConfig::parse("handle_budget = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = JasperConfig::load("/nonexistent/jasper.toml").unwrap_err();
        match err {
            ConfigError::Read { path, .. } => assert_eq!(path, "/nonexistent/jasper.toml"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
