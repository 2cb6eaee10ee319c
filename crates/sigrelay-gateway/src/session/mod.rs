//! Connection lifecycle: identity, registry presence and cleanup.

mod ids;
mod lifecycle;

pub use ids::{is_valid_identity, IdSource, UuidIds, MAX_IDENTITY_LEN};
pub use lifecycle::{CloseHandler, ConnState, Lifecycle};
