//! Envelope validators. Pure guards: pass to `next` or fail with a coded
//! `SignalError`, before any side effect.

use std::sync::Arc;

use async_trait::async_trait;

use sigrelay_core::error::{Result, SignalError};
use sigrelay_core::protocol::{Command, Message, PayloadKind, SignalPayload};

use super::{MessageHook, Next};
use crate::context::ConnCtx;
use crate::presence::{ClientStatus, PresenceRegistry};

/// Message must carry an `id`.
pub struct AssertId;

#[async_trait]
impl MessageHook for AssertId {
    fn name(&self) -> &'static str {
        "assert_id"
    }

    async fn handle(&self, msg: &Message, ctx: &ConnCtx, next: Next<'_>) -> Result<()> {
        if msg.id().is_none() {
            return Err(SignalError::MissingId.into());
        }
        next.run(msg, ctx).await
    }
}

/// Target must be set, not the sender, known and online.
pub struct AssertTarget {
    registry: Arc<dyn PresenceRegistry>,
}

impl AssertTarget {
    pub fn new(registry: Arc<dyn PresenceRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl MessageHook for AssertTarget {
    fn name(&self) -> &'static str {
        "assert_target"
    }

    async fn handle(&self, msg: &Message, ctx: &ConnCtx, next: Next<'_>) -> Result<()> {
        let target = msg.target().ok_or(SignalError::MissingTarget)?;
        if target == ctx.peer_id() {
            return Err(SignalError::SelfTarget.into());
        }

        match self.registry.info(target).await? {
            None => return Err(SignalError::PeerNotFound.into()),
            Some(info) if info.status == ClientStatus::Offline => {
                return Err(SignalError::PeerOffline.into())
            }
            Some(_) => {}
        }

        next.run(msg, ctx).await
    }
}

/// Negotiation payload required by `cmd` must decode.
pub struct AssertPayload {
    cmd: Command,
}

impl AssertPayload {
    pub fn new(cmd: Command) -> Self {
        Self { cmd }
    }
}

#[async_trait]
impl MessageHook for AssertPayload {
    fn name(&self) -> &'static str {
        match SignalPayload::required_for(self.cmd) {
            Some(PayloadKind::IceCandidate) => "assert_candidate",
            Some(PayloadKind::Sdp) => "assert_sdp",
            None => "assert_payload",
        }
    }

    async fn handle(&self, msg: &Message, ctx: &ConnCtx, next: Next<'_>) -> Result<()> {
        SignalPayload::decode(self.cmd, msg.data())?;
        next.run(msg, ctx).await
    }
}
