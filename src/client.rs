//! GateClient – one observer's session bound to its host game.
//!
//! Wraps [`ObserverSession`] with the host collaborators and exposes the two
//! tick routines plus inbound delivery.  The `*_tick` methods return the
//! raw reports; [`GateClient::control`] / [`GateClient::motion`] are the
//! scheduler-facing forms that log and swallow failures and only return the
//! delay until the next run.

use crate::control::{control_tick, ControlReport};
use crate::error::Result;
use crate::handlers::HandlerRegistry;
use crate::motion::{motion_tick, MotionReport};
use crate::protocol::{subjects, Envelope, InitializeGateLocks, ToggleBreach, ToggleLock};
use crate::session::ObserverSession;
use crate::world::{AccessControl, ActivationInput, GameWorld};
use log::{error, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct GateClient<H> {
    session: ObserverSession,
    host: H,
    handlers: Arc<HandlerRegistry<GateClient<H>>>,
}

impl<H> GateClient<H>
where
    H: GameWorld + AccessControl + ActivationInput + 'static,
{
    pub fn new(session: ObserverSession, host: H) -> Self {
        Self {
            session,
            host,
            handlers: Arc::new(Self::inbound_handlers()),
        }
    }

    /// `GateManager.*` channel handlers.
    fn inbound_handlers() -> HandlerRegistry<GateClient<H>> {
        let mut registry = HandlerRegistry::new();
        registry
            .on(subjects::TOGGLE_LOCK, |c: &mut GateClient<H>, _: (), m: ToggleLock| {
                c.session.handle_toggle_lock(&c.host, m);
                Ok(())
            })
            .on(subjects::TOGGLE_BREACH, |c: &mut GateClient<H>, _: (), m: ToggleBreach| {
                c.session.handle_toggle_breach(m);
                Ok(())
            })
            .on(
                subjects::INITIALIZE_GATE_LOCKS,
                |c: &mut GateClient<H>, _: (), m: InitializeGateLocks| {
                    c.session.handle_initialize_gate_locks(&c.host, m)
                },
            );
        registry
    }

    pub fn session(&self) -> &ObserverSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ObserverSession {
        &mut self.session
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_parts(self) -> (ObserverSession, H) {
        (self.session, self.host)
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    pub fn try_deliver(&mut self, envelope: &Envelope) -> Result<()> {
        let handlers = Arc::clone(&self.handlers);
        handlers.dispatch(self, (), envelope)
    }

    /// Apply a server event; failures are logged and dropped.
    pub fn deliver(&mut self, envelope: &Envelope) {
        if let Err(e) = self.try_deliver(envelope) {
            error!("Failed to handle '{}': {}", envelope.channel, e);
        }
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    pub fn control_tick(&mut self, now: Instant) -> Result<ControlReport> {
        control_tick(&mut self.session, &mut self.host, now)
    }

    pub fn motion_tick(&mut self, now: Instant) -> Result<MotionReport> {
        motion_tick(&mut self.session, &mut self.host, now)
    }

    /// Run the control routine; returns the delay until its next run.
    pub fn control(&mut self, now: Instant) -> Duration {
        match self.control_tick(now) {
            Ok(report) => report.next_tick,
            Err(e) => {
                error!("Gate control tick failed: {}", e);
                self.session.config().control_interval()
            }
        }
    }

    /// Run the motion routine; returns the delay until its next run.
    pub fn motion(&mut self, now: Instant) -> Duration {
        match self.motion_tick(now) {
            Ok(report) => report.next_tick,
            Err(e) => {
                error!("Gate motion tick failed: {}", e);
                self.session.config().motion_idle_interval()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Encode every queued client event for the transport.
    pub fn drain_outbound(&mut self) -> Vec<Envelope> {
        self.session
            .drain_outbound()
            .into_iter()
            .filter_map(|event| match event.into_envelope() {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    warn!("Dropping unencodable {:?}: {}", event, e);
                    None
                }
            })
            .collect()
    }
}
