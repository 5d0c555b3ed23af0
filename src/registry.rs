//! Gate registry: the static catalog of lockable gates.
//!
//! Built once at startup from [`GateCatalogEntry`] records (the built-in
//! catalog or a config file) and read-only afterwards.

use crate::error::{GateError, Result};
use crate::geometry::offset_position;
use crate::types::{GateId, ModelHash, OpeningDirection, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Substitute travel distance for models whose measured width is implausible.
pub const FALLBACK_TRAVEL_DISTANCE: f32 = 5.75;

/// Measured widths below this are treated as bad model metadata.
pub const MIN_MEASURED_TRAVEL: f32 = 2.0;

// ---------------------------------------------------------------------------
// Model dimensions
// ---------------------------------------------------------------------------

/// Source of model bounding boxes, used when an entry has no explicit
/// travel distance.
pub trait ModelDimensions {
    /// `(min, max)` corners of the model's bounding box.
    fn dimensions(&self, model: &str) -> Option<(Vec3, Vec3)>;
}

/// A dimensions source that knows nothing; every measured entry falls back.
pub struct NoDimensions;

impl ModelDimensions for NoDimensions {
    fn dimensions(&self, _model: &str) -> Option<(Vec3, Vec3)> {
        None
    }
}

// ---------------------------------------------------------------------------
// Catalog entry
// ---------------------------------------------------------------------------

/// One gate as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCatalogEntry {
    pub id: GateId,
    pub model: String,
    pub closed_position: Vec3,
    pub opening: OpeningDirection,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub heading: f32,
    /// Squared distance from the control point within which the gate can be
    /// operated.
    #[serde(default = "default_access_range")]
    pub access_range: f32,
    /// Explicit travel distance; measured from the model when absent.
    #[serde(default)]
    pub travel_distance: Option<f32>,
    #[serde(default = "default_locked")]
    pub locked: bool,
}

fn default_access_range() -> f32 {
    1.0
}

fn default_locked() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// Immutable description of a single gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDefinition {
    pub id: GateId,
    pub model: String,
    pub model_hash: ModelHash,
    pub closed_position: Vec3,
    pub opening: OpeningDirection,
    pub heading: f32,
    pub access_range: f32,
    pub travel_distance: f32,
    pub permissions: Vec<String>,
    /// Lock state a client assumes until the server says otherwise.
    pub default_locked: bool,
}

impl GateDefinition {
    fn from_entry(entry: GateCatalogEntry, dims: &dyn ModelDimensions) -> Result<Self> {
        let travel_distance = match entry.travel_distance {
            Some(d) if d > 0.0 && d.is_finite() => d,
            Some(d) => {
                return Err(GateError::InvalidCatalog(format!(
                    "gate {} has non-positive travel distance {}",
                    entry.id, d
                )))
            }
            None => measured_travel(&entry.model, dims),
        };

        Ok(Self {
            id: entry.id,
            model_hash: ModelHash::from_name(&entry.model),
            model: entry.model,
            closed_position: entry.closed_position,
            opening: entry.opening,
            heading: entry.heading,
            access_range: entry.access_range,
            travel_distance,
            permissions: entry.permissions,
            default_locked: entry.locked,
        })
    }

    /// Fully open position.
    pub fn open_position(&self) -> Vec3 {
        offset_position(
            self.closed_position,
            self.heading,
            self.opening,
            self.travel_distance,
        )
    }

    /// Where the gate rests for a given lock state.
    pub fn resting_position(&self, locked: bool) -> Vec3 {
        if locked {
            self.closed_position
        } else {
            self.open_position()
        }
    }
}

fn measured_travel(model: &str, dims: &dyn ModelDimensions) -> f32 {
    match dims.dimensions(model) {
        Some((_, max)) if max.x >= MIN_MEASURED_TRAVEL => max.x,
        _ => FALLBACK_TRAVEL_DISTANCE,
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds every gate definition, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct GateRegistry {
    gates: BTreeMap<GateId, GateDefinition>,
}

impl GateRegistry {
    pub fn from_catalog(
        entries: impl IntoIterator<Item = GateCatalogEntry>,
        dims: &dyn ModelDimensions,
    ) -> Result<Self> {
        let mut gates = BTreeMap::new();
        for entry in entries {
            let id = entry.id;
            let def = GateDefinition::from_entry(entry, dims)?;
            if gates.insert(id, def).is_some() {
                return Err(GateError::InvalidCatalog(format!("duplicate gate id {}", id)));
            }
        }
        Ok(Self { gates })
    }

    /// The built-in catalog.
    pub fn builtin(dims: &dyn ModelDimensions) -> Result<Self> {
        Self::from_catalog(builtin_catalog(), dims)
    }

    pub fn get(&self, id: GateId) -> Option<&GateDefinition> {
        self.gates.get(&id)
    }

    pub fn contains(&self, id: GateId) -> bool {
        self.gates.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GateDefinition> {
        self.gates.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = GateId> + '_ {
        self.gates.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

/// Mission Row station gate and the two Sandy Shores airfield gates.
pub fn builtin_catalog() -> Vec<GateCatalogEntry> {
    let airfield = || vec!["SSAirfield.Gates".to_string(), "Emergency.General".to_string()];
    vec![
        GateCatalogEntry {
            id: 0,
            model: "hei_prop_station_gate".into(),
            closed_position: Vec3::new(488.895, -1017.210, 27.147),
            opening: OpeningDirection::LeftToRight,
            permissions: vec!["Police.MissionRow".into()],
            heading: 90.0,
            access_range: 150.0,
            travel_distance: Some(5.4),
            locked: true,
        },
        GateCatalogEntry {
            id: 1,
            model: "prop_gate_airport_01".into(),
            closed_position: Vec3::new(1817.867, 3251.228, 42.487),
            opening: OpeningDirection::LeftToRight,
            permissions: airfield(),
            heading: 249.186,
            access_range: 100.0,
            travel_distance: Some(7.0),
            locked: true,
        },
        GateCatalogEntry {
            id: 2,
            model: "prop_gate_airport_01".into(),
            closed_position: Vec3::new(1796.939, 3313.328, 40.925),
            opening: OpeningDirection::LeftToRight,
            permissions: airfield(),
            heading: 299.949,
            access_range: 100.0,
            travel_distance: Some(7.0),
            locked: true,
        },
    ]
}
