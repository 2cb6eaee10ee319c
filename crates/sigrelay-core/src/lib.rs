//! sigRelay core: transport-agnostic signaling protocol primitives and errors.
//!
//! This crate defines the wire-level contracts (message envelope, command set,
//! typed negotiation payloads, RTC configuration) and the error surface shared
//! by the gateway. It carries no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `SigRelayError`/`SignalError` so a hostile client cannot crash
//! the relay with malformed frames.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{Result, SigRelayError};
