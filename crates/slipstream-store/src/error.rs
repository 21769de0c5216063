//! Error types for the store layer.

/// Errors that can occur while reading or mutating state records.
///
/// The first three variants are operation rejections: the triggering
/// message is refused but the connection stays open. [`Backend`] wraps
/// store I/O failures; those are logged and never surfaced to peers,
/// and the prior record state is left unchanged.
///
/// [`Backend`]: StoreError::Backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The identity does not own the record and is not the admin.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The record (or its ownership root) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The update attempts to change an immutable field.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The underlying keyed store failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// `true` for rejections that refuse one operation without closing
    /// the connection.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotAuthorized(_) | Self::NotFound(_) | Self::BadRequest(_)
        )
    }
}
