use uuid::Uuid;

/// Longest identity a client may request or an operator may provision.
pub const MAX_IDENTITY_LEN: usize = 128;

/// Charset shared by `?id=` and provisioned identities.
pub fn is_valid_identity(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_IDENTITY_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Source of collision-free opaque identifiers (peer ids and message ids).
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// UUID v4, simple (hyphenless) form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
