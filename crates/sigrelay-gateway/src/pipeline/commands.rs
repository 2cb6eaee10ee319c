//! Command router: a declarative table from `cmd` to a hook chain.
//!
//! Every row compiles to `[AssertId, AssertTarget, (AssertPayload)?, Pipe, SendOk]`;
//! adding a command is adding a row.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use sigrelay_core::error::{Result, SignalError};
use sigrelay_core::protocol::{Command, Message, SignalPayload};

use super::{AssertId, AssertPayload, AssertTarget, Chain, MessageHook, Next, Pipe, SendOk};
use crate::context::ConnCtx;
use crate::presence::PresenceRegistry;
use crate::session::IdSource;

/// One routing table row.
#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub cmd: Command,
    /// Relay `data` verbatim to the target.
    pub forward_data: bool,
}

pub const ROUTES: [Route; 7] = [
    Route {
        cmd: Command::SessionStart,
        forward_data: false,
    },
    Route {
        cmd: Command::SessionAccept,
        forward_data: false,
    },
    Route {
        cmd: Command::SessionReject,
        forward_data: false,
    },
    Route {
        cmd: Command::SessionCancel,
        forward_data: false,
    },
    Route {
        cmd: Command::Ice,
        forward_data: true,
    },
    Route {
        cmd: Command::Offer,
        forward_data: true,
    },
    Route {
        cmd: Command::Answer,
        forward_data: true,
    },
];

impl Route {
    fn compile(&self, registry: &Arc<dyn PresenceRegistry>, ids: &Arc<dyn IdSource>) -> Chain {
        let mut chain = Chain::new()
            .with(AssertId)
            .with(AssertTarget::new(Arc::clone(registry)));
        if SignalPayload::required_for(self.cmd).is_some() {
            chain = chain.with(AssertPayload::new(self.cmd));
        }
        chain
            .with(Pipe::new(Arc::clone(registry), Arc::clone(ids), self.forward_data))
            .with(SendOk)
    }
}

/// Dispatches a request to its command chain. Terminal: does not call `next`.
pub struct CommandRouter {
    routes: HashMap<Command, Chain>,
}

impl CommandRouter {
    pub fn new(registry: Arc<dyn PresenceRegistry>, ids: Arc<dyn IdSource>) -> Self {
        let routes = ROUTES
            .iter()
            .map(|r| (r.cmd, r.compile(&registry, &ids)))
            .collect();
        Self { routes }
    }

    /// Hook names of a command's chain, in order.
    pub fn chain_for(&self, cmd: Command) -> Option<Vec<&'static str>> {
        self.routes.get(&cmd).map(|c| c.names())
    }
}

#[async_trait]
impl MessageHook for CommandRouter {
    fn name(&self) -> &'static str {
        "commands"
    }

    async fn handle(&self, msg: &Message, ctx: &ConnCtx, _next: Next<'_>) -> Result<()> {
        if msg.is_response() {
            tracing::debug!(id = ?msg.id(), "ignoring client response");
            return Ok(());
        }

        let name = msg.cmd().ok_or(SignalError::MissingCommand)?;
        let chain = Command::parse(name)
            .and_then(|cmd| self.routes.get(&cmd))
            .ok_or_else(|| SignalError::UnknownCommand(name.to_owned()))?;

        tracing::debug!(cmd = %name, id = ?msg.id(), "dispatch");
        chain.run(msg, ctx).await
    }
}
