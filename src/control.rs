//! Control tick: decides which gate is active and whether the observer may
//! operate it.
//!
//! ```text
//! Idle ──closed position ≤ 800u²──▶ Tracking ──closed position > 800u²──▶ Idle
//! ```
//!
//! While tracking, the tick re-runs every frame so the prompt stays current;
//! after a scan or a toggle it backs off for the control interval.

use crate::error::Result;
use crate::scanner::{scan, ScanReport};
use crate::session::ObserverSession;
use crate::types::GateId;
use crate::world::{AccessControl, ActivationInput, GameWorld};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    Lock,
    Unlock,
}

/// What the observer can do at the tracked gate this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// No permission and not breached.
    NoAccess,
    /// Too far from the control point.
    OutOfReach,
    /// Prompt offered, activation not pressed.
    Offered(GateAction),
    /// Activation pressed; the gate is now `locked`.
    Toggled { locked: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlState {
    Unjoined,
    /// No active gate; the scanner ran.
    Idle(ScanReport),
    /// The active gate was dropped (out of range or gone).
    Released(GateId),
    Tracking(GateId, Interaction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlReport {
    pub state: ControlState,
    /// Delay until the control tick should run again.
    pub next_tick: Duration,
}

impl ControlReport {
    fn new(state: ControlState, next_tick: Duration) -> Self {
        Self { state, next_tick }
    }
}

pub fn control_tick<H>(session: &mut ObserverSession, host: &mut H, now: Instant) -> Result<ControlReport>
where
    H: GameWorld + AccessControl + ActivationInput + ?Sized,
{
    let config = session.config().clone();
    if !session.is_joined() {
        return Ok(ControlReport::new(ControlState::Unjoined, config.unjoined_interval()));
    }

    session.request_locks_once();
    let observer = host.observer_position();

    let Some((gate_id, entity)) = session.active().map(|c| (c.gate_id, c.entity)) else {
        let report = scan(session, host, now)?;
        return Ok(ControlReport::new(ControlState::Idle(report), config.control_interval()));
    };

    let released = ControlReport::new(ControlState::Released(gate_id), config.frame_interval());
    let Some((closed_position, access_range)) = session
        .registry()
        .get(gate_id)
        .map(|g| (g.closed_position, g.access_range))
    else {
        session.clear_active();
        return Ok(released);
    };
    let Some(gate_position) = host.position(entity) else {
        session.clear_active();
        return Ok(released);
    };
    // Measured from the closed position, as in the scanner.
    if observer.distance_squared_2d(&closed_position) > config.tracking_radius_sq {
        session.clear_active();
        return Ok(released);
    }

    let tracking = |interaction| {
        ControlReport::new(ControlState::Tracking(gate_id, interaction), config.frame_interval())
    };

    if !session.may_operate(gate_id, &*host) {
        return Ok(tracking(Interaction::NoAccess));
    }

    let control_point = gate_position.offset(config.control_offset);
    if observer.distance_squared_2d(&control_point) >= access_range {
        return Ok(tracking(Interaction::OutOfReach));
    }

    let action = if session.is_locked(gate_id).unwrap_or(true) {
        GateAction::Unlock
    } else {
        GateAction::Lock
    };
    if !host.activation_pressed() {
        return Ok(tracking(Interaction::Offered(action)));
    }

    match session.toggle_gate_lock(&*host) {
        Some(locked) => Ok(ControlReport::new(
            ControlState::Tracking(gate_id, Interaction::Toggled { locked }),
            config.control_interval(),
        )),
        None => Ok(tracking(Interaction::Offered(action))),
    }
}
