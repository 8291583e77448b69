//! Configuration loading seam for the process supervisor.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};

use exporter_config::Config;

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the exporter configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`], reading the process arguments,
/// environment and configuration file.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_loader_returns_its_configuration() {
        let config = Config {
            network: "unix".to_owned(),
            address: "/tmp/audit.sock".to_owned(),
            ..Config::default()
        };

        let loaded = StaticConfigLoader::new(config.clone())
            .load()
            .expect("static configuration");

        assert_eq!(loaded, config);
    }
}
