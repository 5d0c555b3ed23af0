//! File/env settings for the gate sync processes.
//!
//! ```toml
//! listen = "0.0.0.0:30120"
//! stats_interval_secs = 60
//!
//! [client]
//! tracking_radius_sq = 800.0
//!
//! [[gates]]
//! id = 0
//! model = "hei_prop_station_gate"
//! closed_position = { x = 488.895, y = -1017.21, z = 27.147 }
//! opening = "left_to_right"
//! heading = 90.0
//! access_range = 150.0
//! travel_distance = 5.4
//! permissions = ["Police.MissionRow"]
//! ```
//!
//! Environment variables override the file with the `GATE__` prefix, e.g.
//! `GATE__LISTEN` or `GATE__CLIENT__STEP_SIZE`.

use crate::error::Result;
use crate::registry::{GateCatalogEntry, GateRegistry, ModelDimensions};
use crate::types::GateSyncConfig;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    /// Server listen address.
    pub listen: String,
    pub stats_interval_secs: u64,
    pub client: GateSyncConfig,
    /// Empty means the built-in catalog.
    pub gates: Vec<GateCatalogEntry>,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:30120".to_string(),
            stats_interval_secs: 60,
            client: GateSyncConfig::default(),
            gates: Vec::new(),
        }
    }
}

impl GateSettings {
    /// Layer an optional TOML file and `GATE__*` env vars over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix("GATE").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }

    pub fn registry(&self, dims: &dyn ModelDimensions) -> Result<GateRegistry> {
        if self.gates.is_empty() {
            GateRegistry::builtin(dims)
        } else {
            GateRegistry::from_catalog(self.gates.iter().cloned(), dims)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoDimensions;
    use crate::types::OpeningDirection;

    #[test]
    fn empty_document_gives_defaults() {
        let settings = GateSettings::from_toml_str("").unwrap();
        assert_eq!(settings.listen, "0.0.0.0:30120");
        assert_eq!(settings.client.tracking_radius_sq, 800.0);
        assert!(settings.gates.is_empty());
        assert_eq!(settings.registry(&NoDimensions).unwrap().len(), 3);
    }

    #[test]
    fn catalog_and_client_overrides() {
        let settings = GateSettings::from_toml_str(
            r#"
            listen = "127.0.0.1:4000"

            [client]
            step_size = 0.03

            [[gates]]
            id = 7
            model = "prop_gate_airport_01"
            closed_position = { x = 1.0, y = 2.0, z = 3.0 }
            opening = "right_to_left"
            travel_distance = 6.0
            permissions = ["Staff"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.listen, "127.0.0.1:4000");
        assert!((settings.client.step_size - 0.03).abs() < 1e-6);
        assert_eq!(settings.client.control_interval_ms, 1_500);

        let registry = settings.registry(&NoDimensions).unwrap();
        assert_eq!(registry.len(), 1);
        let gate = registry.get(7).unwrap();
        assert_eq!(gate.opening, OpeningDirection::RightToLeft);
        assert_eq!(gate.travel_distance, 6.0);
        assert!(gate.default_locked);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let settings = GateSettings::load(Some(Path::new("/nonexistent/gate-sync.toml"))).unwrap();
        assert_eq!(settings.stats_interval(), Duration::from_secs(60));
    }
}
