//! Gate Sync
//!
//! Server-authoritative lock state for sliding world gates, with the
//! client-side proximity scan, control prompt and motion/obstruction engine
//! that every observer runs locally.
//!
//! ## Architecture
//!
//! ```text
//! server                              client (one per observer)
//! ------                              -------------------------
//! transport::serve  (transport.rs)    ClientRuntime      (runtime.rs)
//!   └── AuthorityBusAgent (bus.rs)      └── GateClient   (client.rs)
//!         └── LockAuthority               ├── ObserverSession (session.rs)
//!               (authority.rs)            ├── control_tick    (control.rs)
//!                                         │     └── scan      (scanner.rs)
//!                                         └── motion_tick     (motion.rs)
//!
//! shared: GateRegistry (registry.rs), Envelope + channels (protocol.rs),
//!         HandlerRegistry (handlers.rs)
//! ```
//!
//! The core (registry, protocol, session and both tick routines) is plain
//! synchronous code driven by an explicit `now`; the host game is reached
//! only through the traits in [`world`].

// Core – always available.
pub mod authority;
pub mod client;
pub mod control;
pub mod error;
pub mod geometry;
pub mod handlers;
pub mod memory;
pub mod motion;
pub mod protocol;
pub mod registry;
pub mod scanner;
pub mod session;
pub mod settings;
pub mod types;
pub mod world;

// Server-side modules require the `server` feature.
#[cfg(feature = "server")]
pub mod bus;
#[cfg(feature = "server")]
pub mod transport;

// Scheduled client runtime requires the `client` feature.
#[cfg(feature = "client")]
pub mod runtime;

pub use authority::{Dispatch, LockAuthority};
pub use client::GateClient;
pub use control::{ControlReport, ControlState, GateAction, Interaction};
pub use error::{GateError, Result};
pub use handlers::HandlerRegistry;
pub use memory::MemoryWorld;
pub use motion::{MotionPhase, MotionReport};
pub use protocol::{ClientEvent, Envelope, LockSnapshot};
pub use registry::{GateCatalogEntry, GateDefinition, GateRegistry, ModelDimensions};
pub use session::ObserverSession;
pub use settings::GateSettings;
pub use types::{
    AuthorityStats, EntityHandle, GateId, GateSyncConfig, ModelHash, ObserverId, OpeningDirection, Vec3,
};
pub use world::{AccessControl, ActivationInput, GameWorld};

// Convenience re-exports (server only)
#[cfg(feature = "server")]
pub use bus::{AuthorityBusAgent, AuthorityBusConfig, Inbound};

// Client runtime re-export (client only)
#[cfg(feature = "client")]
pub use runtime::ClientRuntime;
