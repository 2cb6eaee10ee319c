//! Top-level facade crate for sigRelay.
//!
//! Re-exports the protocol types and the gateway library so users can depend
//! on a single crate.

pub mod core {
    pub use sigrelay_core::*;
}

pub mod gateway {
    pub use sigrelay_gateway::*;
}
