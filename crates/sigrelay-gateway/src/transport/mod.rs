//! Transport layer (WebSocket).
//!
//! Exposes the WS upgrade handler and the codec that turns socket frames into
//! signaling messages (and queued `Outbound` items back into frames).

pub mod codec;
pub mod ws;
