//! Relay (pipe) and acknowledgement hooks.

use std::sync::Arc;

use async_trait::async_trait;

use sigrelay_core::error::{Result, SignalError};
use sigrelay_core::protocol::Message;

use super::{MessageHook, Next};
use crate::context::ConnCtx;
use crate::presence::PresenceRegistry;
use crate::session::IdSource;

/// Forward the command (and optionally its payload) to the target.
///
/// The relayed message gets a fresh id and the sender's identity as `origin`;
/// client-supplied `origin` and `target` are never copied.
pub struct Pipe {
    registry: Arc<dyn PresenceRegistry>,
    ids: Arc<dyn IdSource>,
    forward_data: bool,
}

impl Pipe {
    pub fn new(registry: Arc<dyn PresenceRegistry>, ids: Arc<dyn IdSource>, forward_data: bool) -> Self {
        Self {
            registry,
            ids,
            forward_data,
        }
    }
}

#[async_trait]
impl MessageHook for Pipe {
    fn name(&self) -> &'static str {
        "pipe"
    }

    async fn handle(&self, msg: &Message, ctx: &ConnCtx, next: Next<'_>) -> Result<()> {
        let target = msg.target().ok_or(SignalError::MissingTarget)?;
        let cmd = msg.cmd().ok_or(SignalError::MissingCommand)?;

        let data = if self.forward_data { msg.data.clone() } else { None };
        let relayed = Message::relay(self.ids.next_id(), cmd, ctx.peer_id(), data);
        let relayed_id = relayed.id.clone().unwrap_or_default();

        self.registry.send(target, relayed).await?;
        tracing::debug!(%cmd, %target, relayed_id = %relayed_id, "relayed");

        next.run(msg, ctx).await
    }
}

/// Acknowledge the request. Terminal: does not call `next`.
pub struct SendOk;

#[async_trait]
impl MessageHook for SendOk {
    fn name(&self) -> &'static str {
        "send_ok"
    }

    async fn handle(&self, msg: &Message, ctx: &ConnCtx, _next: Next<'_>) -> Result<()> {
        let id = msg.id().ok_or(SignalError::MissingId)?;
        ctx.send(Message::ack(id)).await
    }
}
