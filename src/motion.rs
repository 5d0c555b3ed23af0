//! Motion & obstruction engine: walks the active gate toward its target.
//!
//! Each tick moves the gate at most one fixed step.  After a step the
//! occupant of the closed position is re-polled (rate limited); if the gate
//! is in contact with it, motion is held and re-checked on a short retry
//! cadence.  A hold never reverses the gate and has no timeout: it ends when
//! contact ends, when the occupant leaves, or when the target changes.

use crate::error::Result;
use crate::geometry::offset_position;
use crate::scanner::apply_resting_position;
use crate::session::{ActiveGateContext, ObserverSession, ObstructionHold};
use crate::types::{EntityHandle, GateSyncConfig};
use crate::world::GameWorld;
use log::debug;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    Unjoined,
    /// No active gate.
    NoGate,
    /// The active gate's entity disappeared; context dropped.
    Lost,
    /// Sitting exactly on target.
    AtTarget,
    /// Runaway position snapped onto target.
    Clamped,
    Stepped,
    /// Close enough; snapped onto target.
    Arrived,
    /// Waiting on an obstruction.
    Held,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReport {
    pub phase: MotionPhase,
    /// Delay until the motion tick should run again.
    pub next_tick: Duration,
}

impl MotionReport {
    fn new(phase: MotionPhase, next_tick: Duration) -> Self {
        Self { phase, next_tick }
    }
}

pub fn motion_tick<W: GameWorld + ?Sized>(
    session: &mut ObserverSession,
    world: &mut W,
    now: Instant,
) -> Result<MotionReport> {
    let config = session.config().clone();
    if !session.is_joined() {
        return Ok(MotionReport::new(MotionPhase::Unjoined, config.unjoined_interval()));
    }

    let Some(gate_id) = session.active().map(|c| c.gate_id) else {
        return Ok(MotionReport::new(MotionPhase::NoGate, config.motion_idle_interval()));
    };
    let (Some(gate), Some(locked)) = (
        session.registry().get(gate_id).cloned(),
        session.is_locked(gate_id),
    ) else {
        session.clear_active();
        return Ok(MotionReport::new(MotionPhase::NoGate, config.motion_idle_interval()));
    };

    let entity = match session.active() {
        Some(ctx) if world.exists(ctx.entity) => ctx.entity,
        _ => {
            session.clear_active();
            return Ok(MotionReport::new(MotionPhase::Lost, config.motion_idle_interval()));
        }
    };
    let Some(ctx) = session.active_mut() else {
        return Ok(MotionReport::new(MotionPhase::NoGate, config.motion_idle_interval()));
    };

    if let Some(hold) = ctx.hold {
        if hold.captured_target != ctx.target {
            debug!("Gate {} retargeted while held; resuming", gate_id);
            ctx.hold = None;
        } else {
            poll_obstruction(ctx, world, &config, now);
            if ctx.obstruction == Some(hold.obstruction)
                && world.exists(hold.obstruction)
                && is_blocking(world, entity, hold.obstruction)
            {
                return Ok(MotionReport::new(MotionPhase::Held, config.obstruction_retry_interval()));
            }
            debug!("Gate {} obstruction {} cleared", gate_id, hold.obstruction);
            ctx.hold = None;
        }
    }

    if !ctx.resting_applied {
        apply_resting_position(world, entity, &gate, locked)?;
        ctx.resting_applied = true;
    }

    let position = world.require_position(entity)?;
    let target = ctx.target;
    if position == target {
        return Ok(MotionReport::new(MotionPhase::AtTarget, config.motion_at_target_interval()));
    }

    let max_distance_sq = gate.travel_distance * gate.travel_distance;
    if position.distance_squared_2d(&target) > max_distance_sq + config.clamp_epsilon {
        debug!("Gate {} at {} is beyond travel of {}; clamping", gate_id, position, target);
        world.set_position(entity, target)?;
        return Ok(MotionReport::new(MotionPhase::Clamped, config.frame_interval()));
    }

    if position.distance_squared_2d(&target) < config.arrival_threshold_sq {
        world.set_position(entity, target)?;
        return Ok(MotionReport::new(MotionPhase::Arrived, config.frame_interval()));
    }

    let direction = if locked {
        gate.opening.reversed()
    } else {
        gate.opening
    };
    let next = offset_position(position, gate.heading, direction, config.step_size);
    world.set_position(entity, next)?;

    poll_obstruction(ctx, world, &config, now);
    if let Some(obstruction) = ctx.obstruction {
        if world.exists(obstruction) && is_blocking(world, entity, obstruction) {
            debug!("Gate {} obstructed by {} at {}", gate_id, obstruction, next);
            ctx.hold = Some(ObstructionHold {
                captured_target: target,
                obstruction,
            });
            return Ok(MotionReport::new(MotionPhase::Held, config.obstruction_retry_interval()));
        }
    }

    Ok(MotionReport::new(MotionPhase::Stepped, config.frame_interval()))
}

/// Re-query the occupant of the closed position, at most once per poll
/// interval.
fn poll_obstruction<W: GameWorld + ?Sized>(
    ctx: &mut ActiveGateContext,
    world: &W,
    config: &GateSyncConfig,
    now: Instant,
) {
    if ctx.next_obstruction_poll.is_some_and(|at| now < at) {
        return;
    }
    ctx.next_obstruction_poll = Some(now + config.obstruction_poll_interval());
    ctx.obstruction = world.nearest_vehicle(ctx.obstruction_check_position, config.obstruction_radius);
}

/// Collision-or-touch between the gate and the obstruction.
fn is_blocking<W: GameWorld + ?Sized>(world: &W, gate: EntityHandle, obstruction: EntityHandle) -> bool {
    world.has_collided(gate) || world.is_touching(gate, obstruction)
}
