//! Shared error type across sigRelay crates.
//!
//! Three families are kept apart because the gateway answers them differently:
//! - [`SignalError`]: coded protocol conditions raised by validators.
//! - [`RegistryError`]: failures surfaced by the presence registry.
//! - everything else (`BadRequest`, `Internal`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// WebSocket close codes (stable API).
///
/// 4xxx codes are application-defined, 1xxx are RFC 6455 codes.
pub mod close {
    pub const MISSING_ID: u16 = 4400;
    pub const MISSING_TARGET: u16 = 4401;
    pub const SELF_TARGET: u16 = 4403;
    pub const PEER_NOT_FOUND: u16 = 4404;
    pub const PEER_OFFLINE: u16 = 4405;
    pub const UNKNOWN_COMMAND: u16 = 4406;
    pub const MISSING_COMMAND: u16 = 4407;
    pub const IDLE_TIMEOUT: u16 = 4408;
    pub const IDENTITY_IN_USE: u16 = 4409;
    pub const MISSING_PAYLOAD: u16 = 4422;

    pub const GOING_AWAY: u16 = 1001;
    pub const UNSUPPORTED_DATA: u16 = 1003;
    pub const INVALID_PAYLOAD: u16 = 1007;
    pub const MESSAGE_TOO_BIG: u16 = 1009;
    pub const INTERNAL: u16 = 1011;
}

/// Stable names for protocol conditions, used by the exposure policy config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    MissingId,
    MissingTarget,
    SelfTarget,
    PeerNotFound,
    PeerOffline,
    UnknownCommand,
    MissingCommand,
    MissingPayload,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingId => "missing-id",
            ErrorKind::MissingTarget => "missing-target",
            ErrorKind::SelfTarget => "self-target",
            ErrorKind::PeerNotFound => "peer-not-found",
            ErrorKind::PeerOffline => "peer-offline",
            ErrorKind::UnknownCommand => "unknown-command",
            ErrorKind::MissingCommand => "missing-command",
            ErrorKind::MissingPayload => "missing-payload",
        }
    }
}

/// Coded protocol conditions. `Display` is the text sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("Missing Message ID")]
    MissingId,
    #[error("Missing Target")]
    MissingTarget,
    #[error("Cannot Target Self")]
    SelfTarget,
    #[error("Peer Not Found")]
    PeerNotFound,
    #[error("Peer Offline")]
    PeerOffline,
    #[error("Unknown Command")]
    UnknownCommand(String),
    #[error("Missing Command")]
    MissingCommand,
    #[error("Missing ICE Candidate")]
    MissingCandidate,
    #[error("Missing SDP")]
    MissingSdp,
}

impl SignalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SignalError::MissingId => ErrorKind::MissingId,
            SignalError::MissingTarget => ErrorKind::MissingTarget,
            SignalError::SelfTarget => ErrorKind::SelfTarget,
            SignalError::PeerNotFound => ErrorKind::PeerNotFound,
            SignalError::PeerOffline => ErrorKind::PeerOffline,
            SignalError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            SignalError::MissingCommand => ErrorKind::MissingCommand,
            SignalError::MissingCandidate | SignalError::MissingSdp => ErrorKind::MissingPayload,
        }
    }

    /// Close code used when this condition terminates the connection.
    pub fn close_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::MissingId => close::MISSING_ID,
            ErrorKind::MissingTarget => close::MISSING_TARGET,
            ErrorKind::SelfTarget => close::SELF_TARGET,
            ErrorKind::PeerNotFound => close::PEER_NOT_FOUND,
            ErrorKind::PeerOffline => close::PEER_OFFLINE,
            ErrorKind::UnknownCommand => close::UNKNOWN_COMMAND,
            ErrorKind::MissingCommand => close::MISSING_COMMAND,
            ErrorKind::MissingPayload => close::MISSING_PAYLOAD,
        }
    }
}

/// Failures surfaced by the presence registry. `Display` is exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Client Already Exists")]
    AlreadyExists(String),
    #[error("Client Already Online")]
    AlreadyOnline(String),
    #[error("Client Not Found")]
    NotFound(String),
    #[error("Client Offline")]
    Offline(String),
    #[error("Client Busy")]
    Backpressure(String),
    #[error("Client Connection Closed")]
    Closed(String),
    #[error("Client Still Online")]
    StillOnline(String),
}

impl RegistryError {
    /// Identity the failure refers to.
    pub fn client_id(&self) -> &str {
        match self {
            RegistryError::AlreadyExists(id)
            | RegistryError::AlreadyOnline(id)
            | RegistryError::NotFound(id)
            | RegistryError::Offline(id)
            | RegistryError::Backpressure(id)
            | RegistryError::Closed(id)
            | RegistryError::StillOnline(id) => id,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, SigRelayError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum SigRelayError {
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl SigRelayError {
    /// Close code used when this error ends up terminating a connection.
    pub fn close_code(&self) -> u16 {
        match self {
            SigRelayError::Signal(e) => e.close_code(),
            SigRelayError::BadRequest(_) => close::INVALID_PAYLOAD,
            SigRelayError::Registry(RegistryError::AlreadyOnline(_)) => close::IDENTITY_IN_USE,
            SigRelayError::Registry(_) | SigRelayError::Internal(_) => close::INTERNAL,
        }
    }

    /// Close reason text. Internal detail is never put on the wire.
    pub fn close_reason(&self) -> String {
        match self {
            SigRelayError::Signal(e) => e.to_string(),
            SigRelayError::BadRequest(_) => "Invalid Message".into(),
            SigRelayError::Registry(RegistryError::AlreadyOnline(_)) => "Identity In Use".into(),
            SigRelayError::Registry(_) | SigRelayError::Internal(_) => "Internal Error".into(),
        }
    }
}
