//! Response/error tiers.
//!
//! Outermost first: `CatchErrors` → `CatchRegistryErrors` →
//! `CatchProtocolErrors`. An error that escapes all three terminates the
//! connection with its close code.

use std::collections::HashSet;

use async_trait::async_trait;

use sigrelay_core::error::{ErrorKind, Result, SigRelayError, SignalError};
use sigrelay_core::protocol::Message;

use super::{MessageHook, Next};
use crate::context::ConnCtx;

/// Fixed text for unclassified failures.
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// Which protocol conditions are answered (`ok:false`) and which close the
/// connection. `missing-id` always closes: there is no id to answer with.
#[derive(Debug, Clone)]
pub struct ExposurePolicy {
    close_on: HashSet<ErrorKind>,
}

impl ExposurePolicy {
    pub fn new(close_on: impl IntoIterator<Item = ErrorKind>) -> Self {
        Self {
            close_on: close_on.into_iter().collect(),
        }
    }

    /// Policy that answers every condition except `missing-id`.
    pub fn expose_all() -> Self {
        Self::new([])
    }

    pub fn exposes(&self, e: &SignalError) -> bool {
        let kind = e.kind();
        kind != ErrorKind::MissingId && !self.close_on.contains(&kind)
    }
}

impl Default for ExposurePolicy {
    fn default() -> Self {
        Self::new([ErrorKind::MissingTarget, ErrorKind::MissingPayload])
    }
}

/// Last-resort tier.
///
/// With an `id`: unclassified errors become a generic failure response, fatal
/// protocol errors pass through with their own close code. Without an `id`
/// nothing can be answered, so the failure is fatal as `MissingId`.
pub struct CatchErrors;

#[async_trait]
impl MessageHook for CatchErrors {
    fn name(&self) -> &'static str {
        "catch_errors"
    }

    async fn handle(&self, msg: &Message, ctx: &ConnCtx, next: Next<'_>) -> Result<()> {
        let err = match next.run(msg, ctx).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        let Some(id) = msg.id() else {
            if !matches!(err, SigRelayError::Signal(SignalError::MissingId)) {
                tracing::warn!(error = %err, "unattributable failure");
            }
            return Err(SignalError::MissingId.into());
        };

        match err {
            SigRelayError::Signal(e) => Err(e.into()),
            other => {
                tracing::error!(error = %other, %id, "unhandled pipeline error");
                ctx.send(Message::nack(id, INTERNAL_SERVER_ERROR)?).await
            }
        }
    }
}

/// Registry failures are answered with the registry's own text.
pub struct CatchRegistryErrors;

#[async_trait]
impl MessageHook for CatchRegistryErrors {
    fn name(&self) -> &'static str {
        "catch_registry_errors"
    }

    async fn handle(&self, msg: &Message, ctx: &ConnCtx, next: Next<'_>) -> Result<()> {
        match next.run(msg, ctx).await {
            Err(SigRelayError::Registry(e)) => match msg.id() {
                Some(id) => {
                    tracing::debug!(error = %e, client = %e.client_id(), %id, "registry error");
                    ctx.send(Message::nack(id, &e.to_string())?).await
                }
                None => Err(e.into()),
            },
            other => other,
        }
    }
}

/// Exposable protocol conditions are answered with their description.
pub struct CatchProtocolErrors {
    policy: ExposurePolicy,
}

impl CatchProtocolErrors {
    pub fn new(policy: ExposurePolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl MessageHook for CatchProtocolErrors {
    fn name(&self) -> &'static str {
        "catch_protocol_errors"
    }

    async fn handle(&self, msg: &Message, ctx: &ConnCtx, next: Next<'_>) -> Result<()> {
        match next.run(msg, ctx).await {
            Err(SigRelayError::Signal(e)) => match msg.id() {
                Some(id) if self.policy.exposes(&e) => {
                    tracing::debug!(condition = e.kind().as_str(), %id, "rejected");
                    ctx.send(Message::nack(id, &e.to_string())?).await
                }
                _ => Err(e.into()),
            },
            other => other,
        }
    }
}
