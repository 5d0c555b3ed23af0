//! ClientRuntime – cooperative scheduler for one [`GateClient`].
//!
//! ## Scheduling model
//!
//! ```text
//! loop
//!   select (biased)
//!     inbound envelope  → GateClient::deliver
//!     earliest deadline → control and/or motion routine
//!   flush outbound events
//! ```
//!
//! Everything runs on one task: a routine's returned delay is its "sleep",
//! and nothing else can interleave inside a routine.

use crate::client::GateClient;
use crate::protocol::Envelope;
use crate::world::{AccessControl, ActivationInput, GameWorld};
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::time::Instant;

pub struct ClientRuntime<H> {
    client: GateClient<H>,
}

impl<H> ClientRuntime<H>
where
    H: GameWorld + AccessControl + ActivationInput + 'static,
{
    pub fn new(client: GateClient<H>) -> Self {
        Self { client }
    }

    /// Drive both routines and inbound delivery until `inbound` closes.
    /// Returns the client so callers can inspect or resume it.
    pub async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<Envelope>,
        outbound: mpsc::UnboundedSender<Envelope>,
    ) -> GateClient<H> {
        let start = Instant::now();
        let mut control_at = start;
        let mut motion_at = start;

        info!("Gate client runtime started");
        loop {
            let next = control_at.min(motion_at);
            tokio::select! {
                biased;
                msg = inbound.recv() => match msg {
                    Some(envelope) => self.client.deliver(&envelope),
                    None => break,
                },
                _ = tokio::time::sleep_until(next) => {
                    let now = Instant::now();
                    if now >= control_at {
                        control_at = now + self.client.control(now.into_std());
                    }
                    if now >= motion_at {
                        motion_at = now + self.client.motion(now.into_std());
                    }
                }
            }

            for envelope in self.client.drain_outbound() {
                if outbound.send(envelope).is_err() {
                    warn!("Outbound channel closed; dropping gate event");
                }
            }
        }

        info!("Gate client runtime stopped (inbound closed)");
        self.client
    }
}
