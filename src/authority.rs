//! LockAuthority – canonical lock table, observer roster, and the outbound
//! dispatches produced by each inbound gate event.
//!
//! The authority trusts the `locked` value a client reports; it does not
//! check that the reporter was anywhere near the gate.

use crate::error::{GateError, Result};
use crate::handlers::HandlerRegistry;
use crate::protocol::{
    subjects, Envelope, GateBreach, GateToggle, InitializeGateLocks, LockSnapshot, ToggleBreach, ToggleLock,
};
use crate::types::{AuthorityStats, GateId, ObserverId};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Where an outbound envelope goes.
///
/// Callers (typically [`AuthorityBusAgent`](crate::bus::AuthorityBusAgent))
/// route these to connections.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Every connected observer, the originator included.
    Broadcast(Envelope),
    /// A single observer.
    To(ObserverId, Envelope),
}

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct LockAuthority {
    locks: BTreeMap<GateId, bool>,
    observers: HashMap<ObserverId, String>,
    /// Observers that already received the lock table on this connection.
    initialized: HashSet<ObserverId>,
    outbox: Vec<Dispatch>,
    toggles: u64,
    breaches: u64,
    snapshots_sent: u64,
}

impl LockAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Observer roster
    // -----------------------------------------------------------------------

    pub fn connect(&mut self, observer: ObserverId, display_name: impl Into<String>) {
        let name = display_name.into();
        info!("{} connected as '{}'", observer, name);
        self.observers.insert(observer, name);
        self.initialized.remove(&observer);
    }

    pub fn disconnect(&mut self, observer: ObserverId) -> bool {
        self.initialized.remove(&observer);
        let known = self.observers.remove(&observer).is_some();
        if known {
            info!("{} disconnected", observer);
        }
        known
    }

    pub fn is_connected(&self, observer: ObserverId) -> bool {
        self.observers.contains_key(&observer)
    }

    fn display_name(&self, observer: ObserverId) -> Result<&str> {
        self.observers
            .get(&observer)
            .map(String::as_str)
            .ok_or(GateError::UnknownObserver(observer))
    }

    // -----------------------------------------------------------------------
    // Lock table
    // -----------------------------------------------------------------------

    /// Last recorded state; `None` until some client reports the gate.
    pub fn lock_state(&self, id: GateId) -> Option<bool> {
        self.locks.get(&id).copied()
    }

    pub fn snapshot(&self) -> LockSnapshot {
        LockSnapshot(self.locks.clone())
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Record a client's toggle and broadcast it to everyone.  Last write
    /// wins.
    pub fn toggle_lock(&mut self, observer: ObserverId, id: GateId, locked: bool) -> Result<()> {
        let name = self.display_name(observer)?;
        info!("{} toggled gateLock[{}] to isLocked={}", name, id, locked);

        let envelope = Envelope::new(subjects::TOGGLE_LOCK, &ToggleLock { gate_id: id, locked })?;
        self.locks.insert(id, locked);
        self.toggles += 1;
        self.outbox.push(Dispatch::Broadcast(envelope));
        Ok(())
    }

    /// Force the gate closed in the table and confirm the breach to the
    /// originator only.
    pub fn breach(&mut self, observer: ObserverId, id: GateId) -> Result<()> {
        let name = self.display_name(observer)?;
        warn!("{} breached gateLock[{}]", name, id);

        let envelope = Envelope::new(subjects::TOGGLE_BREACH, &ToggleBreach { gate_id: id })?;
        self.locks.insert(id, true);
        self.breaches += 1;
        self.outbox.push(Dispatch::To(observer, envelope));
        Ok(())
    }

    /// Send the lock table to a joining observer, once per connection and
    /// only if any gate was ever reported.
    pub fn request_initial_state(&mut self, observer: ObserverId) -> Result<()> {
        self.display_name(observer)?;
        if self.locks.is_empty() {
            debug!("{} requested gate locks; none recorded", observer);
            return Ok(());
        }
        if self.initialized.contains(&observer) {
            debug!("{} already received gate locks on this connection", observer);
            return Ok(());
        }

        let snapshot = self.snapshot().encode()?;
        let envelope = Envelope::new(
            subjects::INITIALIZE_GATE_LOCKS,
            &InitializeGateLocks { snapshot },
        )?;
        self.initialized.insert(observer);
        self.snapshots_sent += 1;
        self.outbox.push(Dispatch::To(observer, envelope));
        Ok(())
    }

    /// Handle one inbound envelope.  Failures are logged and dropped so a
    /// bad event never affects other observers.
    pub fn handle(
        &mut self,
        handlers: &HandlerRegistry<LockAuthority, ObserverId>,
        observer: ObserverId,
        envelope: &Envelope,
    ) {
        if let Err(e) = handlers.dispatch(self, observer, envelope) {
            error!(
                "Failed to handle '{}' from {}: {}",
                envelope.channel, observer, e
            );
        }
    }

    /// Take every dispatch produced since the last drain, in order.
    pub fn drain_dispatches(&mut self) -> Vec<Dispatch> {
        std::mem::take(&mut self.outbox)
    }

    pub fn stats(&self) -> AuthorityStats {
        AuthorityStats {
            tracked_gates: self.locks.len(),
            connected_observers: self.observers.len(),
            toggles: self.toggles,
            breaches: self.breaches,
            snapshots_sent: self.snapshots_sent,
        }
    }

    // -----------------------------------------------------------------------
    // Inbound surface
    // -----------------------------------------------------------------------

    /// `Gate.*` channel handlers.
    pub fn handlers() -> HandlerRegistry<LockAuthority, ObserverId> {
        let mut registry = HandlerRegistry::new();
        registry
            .on(subjects::GATE_TOGGLE, |auth: &mut LockAuthority, from: ObserverId, m: GateToggle| {
                auth.toggle_lock(from, m.gate_id, m.locked)
            })
            .on(subjects::GATE_BREACH, |auth: &mut LockAuthority, from: ObserverId, m: GateBreach| {
                auth.breach(from, m.gate_id)
            })
            .on(
                subjects::GATE_INITIALIZE_LOCKS,
                |auth: &mut LockAuthority, from: ObserverId, _: serde_json::Value| {
                    auth.request_initial_state(from)
                },
            );
        registry
    }
}
