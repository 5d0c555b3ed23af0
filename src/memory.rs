//! `MemoryWorld` – an in-process stand-in for the host game.
//!
//! Implements every collaborator trait over plain maps so the client
//! routines can run headless (bots, replay tools, tests).  Nothing here
//! simulates physics: collisions and touches are whatever the caller says.

use crate::error::{GateError, Result};
use crate::registry::{GateRegistry, ModelDimensions};
use crate::types::{EntityHandle, ModelHash, Vec3};
use crate::world::{AccessControl, ActivationInput, GameWorld};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct MemoryEntity {
    pub model: Option<ModelHash>,
    pub position: Vec3,
    pub frozen: bool,
    pub recording_collisions: bool,
    pub vehicle: bool,
}

#[derive(Debug, Default)]
pub struct MemoryWorld {
    pub observer: Vec3,
    entities: HashMap<EntityHandle, MemoryEntity>,
    next_handle: i32,
    collided: HashSet<EntityHandle>,
    touching: HashSet<(EntityHandle, EntityHandle)>,
    permissions: HashSet<String>,
    pressed: bool,
    dimensions: HashMap<String, (Vec3, Vec3)>,
    /// Number of position writes, per entity.
    pub writes: HashMap<EntityHandle, usize>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Self::default()
        }
    }

    fn insert(&mut self, entity: MemoryEntity) -> EntityHandle {
        let handle = EntityHandle(self.next_handle);
        self.next_handle += 1;
        self.entities.insert(handle, entity);
        handle
    }

    pub fn spawn_prop(&mut self, model: ModelHash, position: Vec3) -> EntityHandle {
        self.insert(MemoryEntity {
            model: Some(model),
            position,
            frozen: false,
            recording_collisions: false,
            vehicle: false,
        })
    }

    pub fn spawn_vehicle(&mut self, position: Vec3) -> EntityHandle {
        self.insert(MemoryEntity {
            model: None,
            position,
            frozen: false,
            recording_collisions: false,
            vehicle: true,
        })
    }

    /// Spawn one prop per catalog gate at its closed position.
    pub fn spawn_gates(&mut self, registry: &GateRegistry) -> Vec<EntityHandle> {
        registry
            .iter()
            .map(|g| self.spawn_prop(g.model_hash, g.closed_position))
            .collect()
    }

    pub fn despawn(&mut self, entity: EntityHandle) {
        self.entities.remove(&entity);
        self.collided.remove(&entity);
        self.touching.retain(|(a, b)| *a != entity && *b != entity);
    }

    pub fn entity(&self, entity: EntityHandle) -> Option<&MemoryEntity> {
        self.entities.get(&entity)
    }

    pub fn move_entity(&mut self, entity: EntityHandle, position: Vec3) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.position = position;
        }
    }

    pub fn set_collided(&mut self, entity: EntityHandle, collided: bool) {
        if collided {
            self.collided.insert(entity);
        } else {
            self.collided.remove(&entity);
        }
    }

    pub fn set_touching(&mut self, a: EntityHandle, b: EntityHandle, touching: bool) {
        if touching {
            self.touching.insert((a, b));
        } else {
            self.touching.remove(&(a, b));
            self.touching.remove(&(b, a));
        }
    }

    pub fn grant(&mut self, tag: &str) {
        self.permissions.insert(tag.to_string());
    }

    pub fn revoke(&mut self, tag: &str) {
        self.permissions.remove(tag);
    }

    pub fn set_pressed(&mut self, pressed: bool) {
        self.pressed = pressed;
    }

    pub fn set_dimensions(&mut self, model: &str, min: Vec3, max: Vec3) {
        self.dimensions.insert(model.to_string(), (min, max));
    }

    fn entity_mut(&mut self, entity: EntityHandle) -> Result<&mut MemoryEntity> {
        self.entities
            .get_mut(&entity)
            .ok_or(GateError::EntityUnavailable(entity))
    }
}

impl GameWorld for MemoryWorld {
    fn observer_position(&self) -> Vec3 {
        self.observer
    }

    fn entities_with_model(&self, model: ModelHash) -> Vec<EntityHandle> {
        let mut found: Vec<_> = self
            .entities
            .iter()
            .filter(|(_, e)| e.model == Some(model))
            .map(|(h, _)| *h)
            .collect();
        found.sort_by_key(|h| h.0);
        found
    }

    fn exists(&self, entity: EntityHandle) -> bool {
        self.entities.contains_key(&entity)
    }

    fn position(&self, entity: EntityHandle) -> Option<Vec3> {
        self.entities.get(&entity).map(|e| e.position)
    }

    fn set_position(&mut self, entity: EntityHandle, position: Vec3) -> Result<()> {
        self.entity_mut(entity)?.position = position;
        *self.writes.entry(entity).or_default() += 1;
        Ok(())
    }

    fn set_position_frozen(&mut self, entity: EntityHandle, frozen: bool) -> Result<()> {
        self.entity_mut(entity)?.frozen = frozen;
        Ok(())
    }

    fn set_recording_collisions(&mut self, entity: EntityHandle, recording: bool) -> Result<()> {
        self.entity_mut(entity)?.recording_collisions = recording;
        Ok(())
    }

    fn nearest_vehicle(&self, position: Vec3, radius: f32) -> Option<EntityHandle> {
        let radius_sq = radius * radius;
        self.entities
            .iter()
            .filter(|(_, e)| e.vehicle)
            .map(|(h, e)| (*h, e.position.distance_squared_2d(&position)))
            .filter(|(_, d)| *d <= radius_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0 .0.cmp(&b.0 .0)))
            .map(|(h, _)| h)
    }

    fn has_collided(&self, entity: EntityHandle) -> bool {
        self.collided.contains(&entity)
    }

    fn is_touching(&self, entity: EntityHandle, other: EntityHandle) -> bool {
        self.touching.contains(&(entity, other)) || self.touching.contains(&(other, entity))
    }
}

impl AccessControl for MemoryWorld {
    fn has_permission(&self, tag: &str) -> bool {
        self.permissions.contains(tag)
    }
}

impl ActivationInput for MemoryWorld {
    fn activation_pressed(&self) -> bool {
        self.pressed
    }
}

impl ModelDimensions for MemoryWorld {
    fn dimensions(&self, model: &str) -> Option<(Vec3, Vec3)> {
        self.dimensions.get(model).copied()
    }
}
