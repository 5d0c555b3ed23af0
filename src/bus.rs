//! Bus integration – AuthorityBusAgent serialises every inbound gate event
//! through the [`LockAuthority`] and routes the resulting dispatches.
//!
//! ## Event contract (inbound)
//!
//! | Channel                | Payload keys      | Effect                   |
//! |------------------------|-------------------|--------------------------|
//! | `Gate.Toggle`          | gate_id, locked   | `toggle_lock` + broadcast |
//! | `Gate.Breach`          | gate_id           | `breach` + reply         |
//! | `Gate.InitializeLocks` | *(empty)*         | snapshot reply, if any   |
//!
//! ## Event contract (outbound)
//!
//! | Channel                           | Delivery            |
//! |-----------------------------------|---------------------|
//! | `GateManager.ToggleLock`          | every connection    |
//! | `GateManager.ToggleBreach`        | originator only     |
//! | `GateManager.InitializeGateLocks` | requester only      |

use crate::authority::{Dispatch, LockAuthority};
use crate::handlers::HandlerRegistry;
use crate::protocol::Envelope;
use crate::types::ObserverId;
use anyhow::Result;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Inbound messages
// ---------------------------------------------------------------------------

/// What a transport feeds into the agent.
#[derive(Debug)]
pub enum Inbound {
    Connect {
        observer: ObserverId,
        name: String,
        outbound: mpsc::UnboundedSender<Envelope>,
    },
    Event {
        observer: ObserverId,
        envelope: Envelope,
    },
    Disconnect {
        observer: ObserverId,
    },
}

// ---------------------------------------------------------------------------
// Config for AuthorityBusAgent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AuthorityBusConfig {
    /// How often the agent logs authority stats.
    pub stats_interval: Duration,
}

impl Default for AuthorityBusConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthorityBusAgent
// ---------------------------------------------------------------------------

/// Wraps a [`LockAuthority`] and drives it from transport events.
///
/// Call [`AuthorityBusAgent::run`] inside a Tokio task to start the agent.
pub struct AuthorityBusAgent {
    config: AuthorityBusConfig,
    authority: Arc<Mutex<LockAuthority>>,
    connections: HashMap<ObserverId, mpsc::UnboundedSender<Envelope>>,
}

impl AuthorityBusAgent {
    pub fn new(config: AuthorityBusConfig, authority: Arc<Mutex<LockAuthority>>) -> Self {
        Self {
            config,
            authority,
            connections: HashMap::new(),
        }
    }

    /// Process inbound messages one at a time until the channel closes.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Inbound>) -> Result<()> {
        let handlers = LockAuthority::handlers();
        let period = self.config.stats_interval;
        let mut stats_timer = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        info!("AuthorityBusAgent active");
        loop {
            tokio::select! {
                msg = inbound.recv() => match msg {
                    Some(msg) => self.handle(&handlers, msg),
                    None => break,
                },
                _ = stats_timer.tick() => {
                    let stats = self.authority.lock().stats();
                    info!(
                        "Gate authority: {} gate(s), {} observer(s), {} toggle(s), {} breach(es), {} snapshot(s)",
                        stats.tracked_gates,
                        stats.connected_observers,
                        stats.toggles,
                        stats.breaches,
                        stats.snapshots_sent
                    );
                }
            }
        }

        info!("AuthorityBusAgent stopped (inbound closed)");
        Ok(())
    }

    fn handle(&mut self, handlers: &HandlerRegistry<LockAuthority, ObserverId>, msg: Inbound) {
        match msg {
            Inbound::Connect {
                observer,
                name,
                outbound,
            } => {
                self.authority.lock().connect(observer, name);
                self.connections.insert(observer, outbound);
            }
            Inbound::Event { observer, envelope } => {
                // Hold the lock only long enough to handle, then release before routing.
                let dispatches = {
                    let mut authority = self.authority.lock();
                    authority.handle(handlers, observer, &envelope);
                    authority.drain_dispatches()
                };
                for dispatch in dispatches {
                    self.route(dispatch);
                }
            }
            Inbound::Disconnect { observer } => {
                self.authority.lock().disconnect(observer);
                self.connections.remove(&observer);
            }
        }
    }

    fn route(&mut self, dispatch: Dispatch) {
        let mut closed = Vec::new();
        match dispatch {
            Dispatch::Broadcast(envelope) => {
                debug!("Broadcasting {} to {} observer(s)", envelope.channel, self.connections.len());
                for (observer, tx) in &self.connections {
                    if tx.send(envelope.clone()).is_err() {
                        closed.push(*observer);
                    }
                }
            }
            Dispatch::To(observer, envelope) => match self.connections.get(&observer) {
                Some(tx) => {
                    if tx.send(envelope).is_err() {
                        closed.push(observer);
                    }
                }
                None => warn!("Dropping {} for unconnected {}", envelope.channel, observer),
            },
        }

        for observer in closed {
            warn!("Connection to {} closed; removing", observer);
            self.connections.remove(&observer);
            self.authority.lock().disconnect(observer);
        }
    }
}
