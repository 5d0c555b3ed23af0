//! Core gate types shared across all modules.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Catalog key of a gate.  Carried as a plain integer on the wire.
pub type GateId = i32;

/// A connected peer, as seen by the server.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ObserverId(pub u32);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Opaque handle to an entity in the host's world simulation.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct EntityHandle(pub i32);

impl std::fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Engine model identity: Jenkins one-at-a-time hash of the lower-cased
/// model name.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ModelHash(pub u32);

impl ModelHash {
    pub fn from_name(name: &str) -> Self {
        let mut hash: u32 = 0;
        for byte in name.bytes() {
            hash = hash.wrapping_add(u32::from(byte.to_ascii_lowercase()));
            hash = hash.wrapping_add(hash << 10);
            hash ^= hash >> 6;
        }
        hash = hash.wrapping_add(hash << 3);
        hash ^= hash >> 11;
        hash = hash.wrapping_add(hash << 15);
        Self(hash)
    }
}

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Squared distance on the ground plane (z ignored).
    pub fn distance_squared_2d(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn offset(&self, by: Vec3) -> Vec3 {
        Vec3::new(self.x + by.x, self.y + by.y, self.z + by.z)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Opening direction
// ---------------------------------------------------------------------------

/// Which way a gate slides when it opens.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpeningDirection {
    RightToLeft,
    LeftToRight,
}

impl OpeningDirection {
    /// Direction multiplier applied to the heading vector.
    pub fn sign(self) -> f32 {
        match self {
            OpeningDirection::RightToLeft => 1.0,
            OpeningDirection::LeftToRight => -1.0,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            OpeningDirection::RightToLeft => OpeningDirection::LeftToRight,
            OpeningDirection::LeftToRight => OpeningDirection::RightToLeft,
        }
    }
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorityStats {
    pub tracked_gates: usize,
    pub connected_observers: usize,
    pub toggles: u64,
    pub breaches: u64,
    pub snapshots_sent: u64,
}

/// Every tunable of the client tick routines.
///
/// Distances are squared world units unless named otherwise; intervals are
/// milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSyncConfig {
    /// Observer leaves the active context beyond this (strictly greater).
    pub tracking_radius_sq: f32,
    /// Coarse radius within which idle gates are considered at all.
    pub search_radius_sq: f32,
    /// Minimum spacing between idle re-homes of the same gate.
    pub idle_refresh_ms: u64,
    /// Control tick spacing after a scan or a toggle.
    pub control_interval_ms: u64,
    /// Spacing of "next frame" re-runs.
    pub frame_interval_ms: u64,
    /// Spacing of both routines until the observer has joined.
    pub unjoined_interval_ms: u64,
    /// Motion tick spacing while no gate is active.
    pub motion_idle_interval_ms: u64,
    /// Motion tick spacing while the gate rests on its target.
    pub motion_at_target_interval_ms: u64,
    /// Re-check spacing while an obstruction holds the gate.
    pub obstruction_retry_interval_ms: u64,
    /// Minimum spacing between occupant re-queries.
    pub obstruction_poll_interval_ms: u64,
    /// Search radius for the occupant of the closed position (plain units).
    pub obstruction_radius: f32,
    /// Distance moved per motion step (plain units).
    pub step_size: f32,
    /// Below this the gate snaps onto its target.
    pub arrival_threshold_sq: f32,
    /// Slack added to travel² before a runaway position is clamped.
    pub clamp_epsilon: f32,
    /// Offset from the gate entity to its control point.
    pub control_offset: Vec3,
}

impl Default for GateSyncConfig {
    fn default() -> Self {
        Self {
            tracking_radius_sq: 800.0,
            search_radius_sq: 3000.0,
            idle_refresh_ms: 5_000,
            control_interval_ms: 1_500,
            frame_interval_ms: 16,
            unjoined_interval_ms: 5_000,
            motion_idle_interval_ms: 1_000,
            motion_at_target_interval_ms: 500,
            obstruction_retry_interval_ms: 100,
            obstruction_poll_interval_ms: 250,
            obstruction_radius: 100.0,
            step_size: 0.015,
            arrival_threshold_sq: 0.01,
            clamp_epsilon: 0.5,
            control_offset: Vec3::new(-4.0, -1.0, 0.0),
        }
    }
}

impl GateSyncConfig {
    pub fn idle_refresh(&self) -> Duration {
        Duration::from_millis(self.idle_refresh_ms)
    }
    pub fn control_interval(&self) -> Duration {
        Duration::from_millis(self.control_interval_ms)
    }
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
    pub fn unjoined_interval(&self) -> Duration {
        Duration::from_millis(self.unjoined_interval_ms)
    }
    pub fn motion_idle_interval(&self) -> Duration {
        Duration::from_millis(self.motion_idle_interval_ms)
    }
    pub fn motion_at_target_interval(&self) -> Duration {
        Duration::from_millis(self.motion_at_target_interval_ms)
    }
    pub fn obstruction_retry_interval(&self) -> Duration {
        Duration::from_millis(self.obstruction_retry_interval_ms)
    }
    pub fn obstruction_poll_interval(&self) -> Duration {
        Duration::from_millis(self.obstruction_poll_interval_ms)
    }
}
