//! Collaborator seams: everything the client routines ask of the host game.
//!
//! The host owns the world simulation, the permission system and the input
//! devices; the gate client only reads and writes through these traits.

use crate::error::{GateError, Result};
use crate::types::{EntityHandle, ModelHash, Vec3};

/// World-simulation queries and entity control.
pub trait GameWorld {
    /// Position of the local observer.
    fn observer_position(&self) -> Vec3;

    /// Existing entities of the given model.
    fn entities_with_model(&self, model: ModelHash) -> Vec<EntityHandle>;

    fn exists(&self, entity: EntityHandle) -> bool;

    fn position(&self, entity: EntityHandle) -> Option<Vec3>;

    fn set_position(&mut self, entity: EntityHandle, position: Vec3) -> Result<()>;

    /// Lock the entity's position against the physics simulation.
    fn set_position_frozen(&mut self, entity: EntityHandle, frozen: bool) -> Result<()>;

    fn set_recording_collisions(&mut self, entity: EntityHandle, recording: bool) -> Result<()>;

    /// Closest vehicle to `position` within `radius`.
    fn nearest_vehicle(&self, position: Vec3, radius: f32) -> Option<EntityHandle>;

    /// Whether the entity has recorded a collision with anything.
    fn has_collided(&self, entity: EntityHandle) -> bool;

    fn is_touching(&self, entity: EntityHandle, other: EntityHandle) -> bool;

    /// Position of an entity that must still exist.
    fn require_position(&self, entity: EntityHandle) -> Result<Vec3> {
        self.position(entity)
            .ok_or(GateError::EntityUnavailable(entity))
    }
}

/// Permission predicate for the local observer.
pub trait AccessControl {
    fn has_permission(&self, tag: &str) -> bool;

    /// True when any of the tags is granted.
    fn has_any_permission(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.has_permission(t))
    }
}

/// The gate activation control.
pub trait ActivationInput {
    fn activation_pressed(&self) -> bool;
}
