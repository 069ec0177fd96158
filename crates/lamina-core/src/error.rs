use thiserror::Error as ThisError;

///
/// Error
///
/// Operational errors for the record layer. Evolution findings are *not*
/// errors of this kind; they are accumulated as values by the schema
/// validator and never abort validation.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid serialized data: {0}")]
    InvalidSerializedData(String),

    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    #[error("index not found: '{0}'")]
    IndexNotFound(String),

    #[error("invalid rank {rank}: {message}")]
    InvalidRank { rank: u64, message: String },

    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("a migration is already in progress")]
    MigrationInProgress,

    #[error("no migration path from {from} toward {target}")]
    NoMigrationPath { from: String, target: String },

    #[error("uniqueness violation on index '{index}': key already owned by {existing}, attempted by {attempted}")]
    UniquenessViolation {
        index: String,
        existing: String,
        attempted: String,
    },

    /// Contract violation by a collaborator. Detected at construction where
    /// possible and always fatal.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    #[must_use]
    pub const fn is_uniqueness_violation(&self) -> bool {
        matches!(self, Self::UniquenessViolation { .. })
    }
}
