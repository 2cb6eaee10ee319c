//! Per-message hook pipeline.
//!
//! A [`Chain`] is an ordered list of [`MessageHook`]s. Each hook receives the
//! message, the connection context and a [`Next`] continuation; it may run
//! logic before and after `next.run(..)`, or return without calling it to
//! short-circuit the rest of the chain. The whole chain for one message is a
//! single `async` call stack, so a connection's next message is never started
//! before the current one fully resolves.
//!
//! The application chain is
//! `[CatchErrors, CatchRegistryErrors, CatchProtocolErrors, CommandRouter]`.

pub mod catch;
pub mod commands;
pub mod relay;
pub mod validate;

use std::sync::Arc;

use async_trait::async_trait;

use sigrelay_core::error::Result;
use sigrelay_core::protocol::Message;

use crate::context::ConnCtx;
use crate::presence::PresenceRegistry;
use crate::session::IdSource;

pub use catch::{CatchErrors, CatchProtocolErrors, CatchRegistryErrors, ExposurePolicy};
pub use commands::{CommandRouter, Route, ROUTES};
pub use relay::{Pipe, SendOk};
pub use validate::{AssertId, AssertPayload, AssertTarget};

/// One pipeline stage.
#[async_trait]
pub trait MessageHook: Send + Sync {
    /// Stable name, used in logs and tests.
    fn name(&self) -> &'static str;

    async fn handle(&self, msg: &Message, ctx: &ConnCtx, next: Next<'_>) -> Result<()>;
}

pub type Hook = Arc<dyn MessageHook>;

/// Continuation over the hooks that follow the current one.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    rest: &'a [Hook],
}

impl<'a> Next<'a> {
    pub async fn run(self, msg: &Message, ctx: &ConnCtx) -> Result<()> {
        match self.rest.split_first() {
            Some((hook, rest)) => hook.handle(msg, ctx, Next { rest }).await,
            None => Ok(()),
        }
    }
}

/// Ordered hook list.
#[derive(Clone, Default)]
pub struct Chain {
    hooks: Vec<Hook>,
}

impl Chain {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn with(mut self, hook: impl MessageHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub async fn run(&self, msg: &Message, ctx: &ConnCtx) -> Result<()> {
        Next { rest: &self.hooks }.run(msg, ctx).await
    }
}

/// Build the per-message application chain.
pub fn app_chain(
    registry: Arc<dyn PresenceRegistry>,
    ids: Arc<dyn IdSource>,
    policy: ExposurePolicy,
) -> Chain {
    Chain::new()
        .with(CatchErrors)
        .with(CatchRegistryErrors)
        .with(CatchProtocolErrors::new(policy))
        .with(CommandRouter::new(registry, ids))
}
