//! Per-observer gate state: lock/breach flags for every catalog gate, the
//! single active gate context, and the handlers that reconcile local toggles
//! with server broadcasts.
//!
//! ## Reconciliation
//!
//! A local toggle flips the lock bit and retargets the gate immediately,
//! then reports the new state.  The server echoes it back to everyone,
//! including us; the echo recomputes the same target we already hold and is
//! dropped.  A broadcast from another peer computes a different target and
//! retargets the active gate.  So does a lock table that arrives after the
//! active gate was promoted with its catalog default.

use crate::error::{GateError, Result};
use crate::protocol::{ClientEvent, GateBreach, GateToggle, InitializeGateLocks, LockSnapshot, ToggleBreach, ToggleLock};
use crate::registry::{GateDefinition, GateRegistry};
use crate::types::{EntityHandle, GateId, GateSyncConfig, Vec3};
use crate::world::{AccessControl, GameWorld};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Mutable flags of one gate, as this observer knows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateRuntimeState {
    pub locked: bool,
    /// Access is granted regardless of permissions.  Independent of `locked`.
    pub breached: bool,
    /// Earliest time the idle scanner may re-home this gate again.
    pub next_idle_refresh: Option<Instant>,
}

impl GateRuntimeState {
    fn from_definition(def: &GateDefinition) -> Self {
        Self {
            locked: def.default_locked,
            breached: false,
            next_idle_refresh: None,
        }
    }
}

/// Motion paused behind an obstruction until it clears or the target moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstructionHold {
    pub captured_target: Vec3,
    pub obstruction: EntityHandle,
}

/// The gate this observer is currently standing at.
///
/// While present it is the only writer of the entity's position and freeze
/// flag in this observer's simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveGateContext {
    pub gate_id: GateId,
    pub entity: EntityHandle,
    pub target: Vec3,
    /// Resting position, freeze and collision recording applied.
    pub resting_applied: bool,
    /// Entity occupying the closed position, if any.
    pub obstruction: Option<EntityHandle>,
    pub obstruction_check_position: Vec3,
    pub next_obstruction_poll: Option<Instant>,
    pub hold: Option<ObstructionHold>,
}

impl ActiveGateContext {
    pub fn new(gate_id: GateId, entity: EntityHandle, target: Vec3, closed: Vec3) -> Self {
        Self {
            gate_id,
            entity,
            target,
            resting_applied: false,
            obstruction: None,
            obstruction_check_position: closed,
            next_obstruction_poll: None,
            hold: None,
        }
    }

    /// Point the gate at `target` and re-evaluate what occupies the closed
    /// position.
    fn retarget<W: GameWorld + ?Sized>(
        &mut self,
        def: &GateDefinition,
        target: Vec3,
        world: &W,
        config: &GateSyncConfig,
    ) {
        self.target = target;
        self.obstruction_check_position = def.closed_position;
        self.obstruction = world.nearest_vehicle(def.closed_position, config.obstruction_radius);
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct ObserverSession {
    registry: Arc<GateRegistry>,
    config: GateSyncConfig,
    gates: BTreeMap<GateId, GateRuntimeState>,
    active: Option<ActiveGateContext>,
    joined: bool,
    requested_locks: bool,
    outbox: Vec<ClientEvent>,
}

impl ObserverSession {
    pub fn new(registry: Arc<GateRegistry>, config: GateSyncConfig) -> Self {
        let gates = registry
            .iter()
            .map(|def| (def.id, GateRuntimeState::from_definition(def)))
            .collect();
        Self {
            registry,
            config,
            gates,
            active: None,
            joined: false,
            requested_locks: false,
            outbox: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn mark_joined(&mut self) {
        if !self.joined {
            info!("Observer joined; gate routines active");
        }
        self.joined = true;
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// New connection: the lock table must be requested again.
    pub fn reconnect(&mut self) {
        self.requested_locks = false;
        self.active = None;
    }

    /// Queue the one-shot lock table request; true when it was queued now.
    pub(crate) fn request_locks_once(&mut self) -> bool {
        if self.requested_locks {
            return false;
        }
        self.requested_locks = true;
        self.outbox.push(ClientEvent::InitializeLocks);
        true
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &GateRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GateSyncConfig {
        &self.config
    }

    pub fn gate_state(&self, id: GateId) -> Option<&GateRuntimeState> {
        self.gates.get(&id)
    }

    pub(crate) fn gate_state_mut(&mut self, id: GateId) -> Option<&mut GateRuntimeState> {
        self.gates.get_mut(&id)
    }

    pub fn is_locked(&self, id: GateId) -> Option<bool> {
        self.gates.get(&id).map(|s| s.locked)
    }

    pub fn is_breached(&self, id: GateId) -> Option<bool> {
        self.gates.get(&id).map(|s| s.breached)
    }

    pub fn active(&self) -> Option<&ActiveGateContext> {
        self.active.as_ref()
    }

    pub(crate) fn active_mut(&mut self) -> Option<&mut ActiveGateContext> {
        self.active.as_mut()
    }

    pub(crate) fn set_active(&mut self, ctx: ActiveGateContext) {
        debug!("Tracking gate {} ({})", ctx.gate_id, ctx.entity);
        self.active = Some(ctx);
    }

    pub(crate) fn clear_active(&mut self) {
        if let Some(ctx) = self.active.take() {
            debug!("Released gate {} ({})", ctx.gate_id, ctx.entity);
        }
    }

    /// Resting position implied by the gate's current lock flag.
    pub fn resting_target(&self, id: GateId) -> Option<Vec3> {
        let def = self.registry.get(id)?;
        let locked = self.is_locked(id)?;
        Some(def.resting_position(locked))
    }

    /// Whether the local observer may operate the gate.
    pub fn may_operate<A: AccessControl + ?Sized>(&self, id: GateId, access: &A) -> bool {
        let Some(def) = self.registry.get(id) else {
            return false;
        };
        self.is_breached(id).unwrap_or(false) || access.has_any_permission(&def.permissions)
    }

    /// Take every event queued for the server since the last drain.
    pub fn drain_outbound(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.outbox)
    }

    // -----------------------------------------------------------------------
    // Local operations
    // -----------------------------------------------------------------------

    /// Flip the active gate's lock, retarget it and report to the server.
    ///
    /// Returns the new lock state, or `None` when no gate is active.
    pub fn toggle_gate_lock<W: GameWorld + ?Sized>(&mut self, world: &W) -> Option<bool> {
        let registry = Arc::clone(&self.registry);
        let ctx = self.active.as_mut()?;
        let def = registry.get(ctx.gate_id)?;
        let state = self.gates.get_mut(&ctx.gate_id)?;

        state.locked = !state.locked;
        let locked = state.locked;
        ctx.retarget(def, def.resting_position(locked), world, &self.config);

        info!(
            "Toggled gate {} to isLocked={} (obstruction: {:?})",
            def.id, locked, ctx.obstruction
        );
        self.outbox.push(ClientEvent::Toggle(GateToggle {
            gate_id: def.id,
            locked,
        }));
        Some(locked)
    }

    /// Report that this observer forced a gate.
    pub fn report_breach(&mut self, id: GateId) -> Result<()> {
        if !self.registry.contains(id) {
            return Err(GateError::UnknownGate(id));
        }
        self.outbox.push(ClientEvent::Breach(GateBreach { gate_id: id }));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Server events
    // -----------------------------------------------------------------------

    /// Apply an authoritative lock broadcast.
    pub fn handle_toggle_lock<W: GameWorld + ?Sized>(&mut self, world: &W, msg: ToggleLock) {
        let Some(state) = self.gates.get_mut(&msg.gate_id) else {
            debug!("Ignoring lock update for unknown gate {}", msg.gate_id);
            return;
        };
        state.locked = msg.locked;
        self.follow_lock(world, msg.gate_id, msg.locked);
    }

    /// Retarget the active gate if it is `gate_id` and now rests elsewhere.
    fn follow_lock<W: GameWorld + ?Sized>(&mut self, world: &W, gate_id: GateId, locked: bool) {
        let Some(ctx) = self.active.as_mut() else {
            return;
        };
        if ctx.gate_id != gate_id {
            return;
        }
        let Some(def) = self.registry.get(gate_id) else {
            return;
        };

        let target = def.resting_position(locked);
        // Exact comparison: our own echo recomputes the identical value.
        if ctx.target == target {
            return;
        }

        debug!(
            "Remote update retargets gate {} to {} (isLocked={})",
            gate_id, target, locked
        );
        ctx.retarget(def, target, world, &self.config);
    }

    pub fn handle_toggle_breach(&mut self, msg: ToggleBreach) {
        match self.gates.get_mut(&msg.gate_id) {
            Some(state) => {
                state.breached = true;
                info!("Gate {} breached", msg.gate_id);
            }
            None => debug!("Ignoring breach for unknown gate {}", msg.gate_id),
        }
    }

    /// Seed lock flags from the server's table.  Ids not in the catalog are
    /// skipped; catalog ids absent from the table keep their defaults.  An
    /// active gate whose flag changed is retargeted like a broadcast.
    pub fn handle_initialize_gate_locks<W: GameWorld + ?Sized>(
        &mut self,
        world: &W,
        msg: InitializeGateLocks,
    ) -> Result<()> {
        let snapshot = LockSnapshot::decode(&msg.snapshot)?;
        let mut applied = 0usize;
        for (id, locked) in snapshot.0 {
            if let Some(state) = self.gates.get_mut(&id) {
                state.locked = locked;
                applied += 1;
            }
        }
        info!("Initialized {} gate lock(s) from server", applied);

        if let Some(id) = self.active.as_ref().map(|ctx| ctx.gate_id) {
            if let Some(locked) = self.is_locked(id) {
                self.follow_lock(world, id, locked);
            }
        }
        Ok(())
    }
}
