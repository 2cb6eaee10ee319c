//! sigRelay gateway library entry.
//!
//! Wires the WebSocket transport, connection lifecycle, presence registry and
//! the per-message hook pipeline into a signaling relay. Used by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod context;
pub mod obs;
pub mod ops;
pub mod pipeline;
pub mod presence;
pub mod router;
pub mod session;
pub mod transport;
