//! Error types.
use thiserror::Error;

/// Errors raised while sizing, building, loading or configuring a filter.
///
/// Failures on individual molecules are never reported through this type:
/// invalid dataset lines are skipped and invalid query items score as absent.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument is outside the domain of the operation, eg. sizing a filter for zero items.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The filter could not be constructed from the given configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A named kind (eg. a hash function) is not one of the supported variants.
    #[error("unsupported {kind} '{name}'")]
    UnsupportedKind {
        /// What was being looked up.
        kind: &'static str,
        /// The name that was not recognised.
        name: String,
    },

    /// A persisted filter could not be written, read or decoded.
    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
