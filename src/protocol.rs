//! `Gate.*` and `GateManager.*` wire protocol.
//!
//! This module owns **every message that crosses the transport** between the
//! lock authority and a client.
//!
//! ## Channel namespaces
//!
//! | Namespace       | Direction        | Delivery                         |
//! |-----------------|------------------|----------------------------------|
//! | `Gate.*`        | client → server  | to the authority                 |
//! | `GateManager.*` | server → client  | broadcast, or to one observer    |
//!
//! ## Design rules
//!
//! 1. Every payload is a `Serialize + Deserialize` struct with snake_case JSON.
//! 2. Payloads carry gate ids and lock bits only; no positions cross the wire.
//! 3. The lock snapshot travels as text (a JSON object keyed by gate id).

use crate::error::Result;
use crate::types::GateId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A named event as carried by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new<T: Serialize>(channel: &str, payload: &T) -> Result<Self> {
        Ok(Self {
            channel: channel.to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Client → server  (channels: Gate.*)
// ---------------------------------------------------------------------------

/// Client flipped a gate's lock locally and reports the resulting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateToggle {
    pub gate_id: GateId,
    pub locked: bool,
}

/// Client forced a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateBreach {
    pub gate_id: GateId,
}

/// Client asks for the current lock table (sent once after joining).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InitializeLocks {}

/// Outbound client events, in the order the session produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    Toggle(GateToggle),
    Breach(GateBreach),
    InitializeLocks,
}

impl ClientEvent {
    pub fn into_envelope(self) -> Result<Envelope> {
        match self {
            ClientEvent::Toggle(m) => Envelope::new(subjects::GATE_TOGGLE, &m),
            ClientEvent::Breach(m) => Envelope::new(subjects::GATE_BREACH, &m),
            ClientEvent::InitializeLocks => {
                Envelope::new(subjects::GATE_INITIALIZE_LOCKS, &InitializeLocks {})
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client  (channels: GateManager.*)
// ---------------------------------------------------------------------------

/// Authoritative lock state for one gate; broadcast to every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleLock {
    pub gate_id: GateId,
    pub locked: bool,
}

/// Breach confirmation; sent to the breaching client only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleBreach {
    pub gate_id: GateId,
}

/// Full lock table for a late joiner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeGateLocks {
    /// Encoded [`LockSnapshot`].
    pub snapshot: String,
}

// ---------------------------------------------------------------------------
// Lock snapshot
// ---------------------------------------------------------------------------

/// Gate id → locked, as held by the authority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockSnapshot(pub BTreeMap<GateId, bool>);

impl LockSnapshot {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    pub fn decode(text: &str) -> Result<Self> {
        Ok(Self(serde_json::from_str(text)?))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, id: GateId) -> Option<bool> {
        self.0.get(&id).copied()
    }
}

// ---------------------------------------------------------------------------
// Subject helpers
// ---------------------------------------------------------------------------

/// Every channel name used by the gate protocol, as constants.
pub mod subjects {
    pub const GATE_TOGGLE: &str = "Gate.Toggle";
    pub const GATE_BREACH: &str = "Gate.Breach";
    pub const GATE_INITIALIZE_LOCKS: &str = "Gate.InitializeLocks";

    pub const TOGGLE_LOCK: &str = "GateManager.ToggleLock";
    pub const TOGGLE_BREACH: &str = "GateManager.ToggleBreach";
    pub const INITIALIZE_GATE_LOCKS: &str = "GateManager.InitializeGateLocks";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips() {
        let mut map = BTreeMap::new();
        map.insert(0, true);
        map.insert(2, false);
        map.insert(-7, true);
        map.insert(1_000_000, false);
        let snap = LockSnapshot(map);

        let text = snap.encode().unwrap();
        let back = LockSnapshot::decode(&text).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn snapshot_is_a_textual_map() {
        let snap = LockSnapshot([(0, true), (1, false)].into_iter().collect());
        assert_eq!(snap.encode().unwrap(), r#"{"0":true,"1":false}"#);
    }

    #[test]
    fn snapshot_decode_ignores_key_order() {
        let a = LockSnapshot::decode(r#"{"2":false,"0":true}"#).unwrap();
        let b = LockSnapshot::decode(r#"{"0":true,"2":false}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get(2), Some(false));
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        assert!(LockSnapshot::decode(r#"{"zero":true}"#).is_err());
        assert!(LockSnapshot::decode("not json").is_err());
    }

    #[test]
    fn client_events_map_to_channels() {
        let env = ClientEvent::Toggle(GateToggle { gate_id: 1, locked: false })
            .into_envelope()
            .unwrap();
        assert_eq!(env.channel, subjects::GATE_TOGGLE);
        assert_eq!(env.payload["gate_id"], 1);
        assert_eq!(env.payload["locked"], false);

        let env = ClientEvent::InitializeLocks.into_envelope().unwrap();
        assert_eq!(env.channel, subjects::GATE_INITIALIZE_LOCKS);
    }
}
