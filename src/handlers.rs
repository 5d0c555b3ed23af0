//! Named-handler registry: routes an [`Envelope`] to the typed handler
//! registered for its channel.
//!
//! Both peers build their inbound surface this way: the authority with the
//! sending [`ObserverId`](crate::types::ObserverId) as origin, a client with
//! `()`.

use crate::error::{GateError, Result};
use crate::protocol::Envelope;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

type Handler<C, O> = Box<dyn Fn(&mut C, O, serde_json::Value) -> Result<()> + Send + Sync>;

pub struct HandlerRegistry<C, O = ()> {
    handlers: HashMap<&'static str, Handler<C, O>>,
}

impl<C: 'static, O: 'static> HandlerRegistry<C, O> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `channel`, replacing any previous one.  The
    /// payload is decoded into `M` before the handler runs.
    pub fn on<M, F>(&mut self, channel: &'static str, handler: F) -> &mut Self
    where
        M: DeserializeOwned + 'static,
        F: Fn(&mut C, O, M) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(
            channel,
            Box::new(move |ctx: &mut C, origin: O, payload: serde_json::Value| {
                let msg: M = serde_json::from_value(payload)?;
                handler(ctx, origin, msg)
            }),
        );
        self
    }

    pub fn dispatch(&self, ctx: &mut C, origin: O, envelope: &Envelope) -> Result<()> {
        let handler = self
            .handlers
            .get(envelope.channel.as_str())
            .ok_or_else(|| GateError::UnknownChannel(envelope.channel.clone()))?;
        handler(ctx, origin, envelope.payload.clone())
    }

    pub fn handles(&self, channel: &str) -> bool {
        self.handlers.contains_key(channel)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<C: 'static, O: 'static> Default for HandlerRegistry<C, O> {
    fn default() -> Self {
        Self::new()
    }
}
