//! Proximity scanner: finds the gate the observer is standing at.
//!
//! Gates in the coarse search radius but outside tracking range are
//! re-homed to their resting position now and then so they look right from
//! a distance.  The first gate within tracking range is promoted into the
//! session's active context and the scan stops.

use crate::error::Result;
use crate::registry::GateDefinition;
use crate::session::{ActiveGateContext, ObserverSession};
use crate::types::{EntityHandle, GateId, Vec3};
use crate::world::GameWorld;
use log::debug;
use std::time::Instant;

/// What a single scan pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// Idle gates re-homed this pass.
    pub refreshed: Vec<GateId>,
    /// Gate promoted into the active context, if any.
    pub promoted: Option<GateId>,
}

/// Scan the catalog around the observer.
pub fn scan<W: GameWorld + ?Sized>(
    session: &mut ObserverSession,
    world: &mut W,
    now: Instant,
) -> Result<ScanReport> {
    let observer = world.observer_position();
    let tracking_radius_sq = session.config().tracking_radius_sq;
    let search_radius_sq = session.config().search_radius_sq;
    let idle_refresh = session.config().idle_refresh();
    let mut report = ScanReport::default();

    let candidates: Vec<GateDefinition> = session
        .registry()
        .iter()
        .filter(|g| observer.distance_squared_2d(&g.closed_position) <= search_radius_sq)
        .cloned()
        .collect();

    for gate in candidates {
        let Some(entity) = nearest_instance(world, &gate, observer) else {
            continue;
        };

        let Some(state) = session.gate_state_mut(gate.id) else {
            continue;
        };
        let locked = state.locked;

        if observer.distance_squared_2d(&gate.closed_position) > tracking_radius_sq {
            if state.next_idle_refresh.is_some_and(|at| now < at) {
                continue;
            }
            state.next_idle_refresh = Some(now + idle_refresh);
            apply_resting_position(world, entity, &gate, locked)?;
            report.refreshed.push(gate.id);
            continue;
        }

        let target = gate.resting_position(locked);
        world.set_position(entity, target)?;
        session.set_active(ActiveGateContext::new(
            gate.id,
            entity,
            target,
            gate.closed_position,
        ));
        report.promoted = Some(gate.id);
        break;
    }

    Ok(report)
}

/// Closest existing instance of the gate's model to the observer.
fn nearest_instance<W: GameWorld + ?Sized>(
    world: &W,
    gate: &GateDefinition,
    observer: Vec3,
) -> Option<EntityHandle> {
    world
        .entities_with_model(gate.model_hash)
        .into_iter()
        .filter(|e| world.exists(*e))
        .filter_map(|e| world.position(e).map(|p| (e, p.distance_squared_2d(&observer))))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(e, _)| e)
}

/// Snap a gate to where it rests for `locked`, freeze it against physics and
/// turn on collision recording.
pub fn apply_resting_position<W: GameWorld + ?Sized>(
    world: &mut W,
    entity: EntityHandle,
    gate: &GateDefinition,
    locked: bool,
) -> Result<()> {
    let resting = gate.resting_position(locked);
    debug!("Resting gate {} ({}) at {}", gate.id, entity, resting);
    world.set_position(entity, resting)?;
    world.set_position_frozen(entity, true)?;
    world.set_recording_collisions(entity, true)?;
    Ok(())
}
