//! Error taxonomy for the moderation engine.
//!
//! Each collaborator seam has its own error enum so recovery policy can
//! differ per seam: storage errors surface to the triggering caller,
//! delivery and directory errors are recovered where escalation runs,
//! validation errors are rejected before any mutation.

use thiserror::Error;

/// Errors returned by [`crate::store::RecordStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached, including after reconnection
    /// attempts were exhausted.
    #[error("storage connection error: {0}")]
    Connection(String),

    /// A compare-and-swap write observed a concurrent update.
    #[error("concurrent write conflict")]
    Conflict,

    /// Encoding to or from the persisted representation failed.
    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors from the outbound notification channel.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The recipient cannot receive direct messages.
    #[error("recipient unreachable")]
    Unreachable,

    /// Transport-level delivery failure.
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Errors from the membership/role directory of the hosting platform.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The platform refused the action (e.g. subject already excluded).
    #[error("directory action rejected: {0}")]
    Rejected(String),

    /// The directory could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous input validation failures. No mutation has occurred when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Attempt to add a filter term that is already configured.
    #[error("term `{0}` is already in the filter list")]
    DuplicateTerm(String),

    /// Attempt to remove or update a filter term that is not configured.
    #[error("term `{0}` is not in the filter list")]
    UnknownTerm(String),

    /// Point values attached to filter terms must be positive.
    #[error("point value must be positive, got {0}")]
    InvalidPoints(i64),

    /// The operation requires an existing user record.
    #[error("no record for user {user} in community {community}")]
    UnknownRecord {
        /// Community the lookup ran against.
        community: u64,
        /// Subject user.
        user: u64,
    },

    /// A threshold table failed construction-time validation.
    #[error("invalid tier table: {0}")]
    InvalidTierTable(String),
}

/// Top-level error type for engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Persistence failure; nothing was committed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Input rejected before any mutation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A platform directory action failed for an operation where the
    /// caller must know (manual exclusion, readmission).
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
