//! Signaling wire protocol (JSON over WebSocket text frames).
//!
//! - `message`: the envelope shared by requests, responses and relayed messages.
//! - `command`: the closed set of command names.
//! - `payload`: typed per-command payloads, decoded at the wire boundary.
//! - `rtc`: the negotiated session configuration announced in `welcome`.
//!
//! Decoding never panics: malformed input is reported as `SigRelayError` or a
//! coded `SignalError`.

pub mod command;
pub mod message;
pub mod payload;
pub mod rtc;

pub use command::Command;
pub use message::Message;
pub use payload::{IceCandidate, PayloadKind, SdpType, SessionDescription, SignalPayload};
pub use rtc::{IceServer, RtcConfiguration};
