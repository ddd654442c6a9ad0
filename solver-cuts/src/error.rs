//! Error types for cut generation.

use thiserror::Error;

/// Errors that can occur during a cut-generation round.
///
/// Numeric overflow and time-limit expiry are not errors; both end in fewer
/// cuts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CutError {
    /// A constraint violated a structural precondition of its consumer.
    #[error("Malformed constraint: {0}")]
    MalformedConstraint(String),

    /// The snapshot belongs to a round that has already completed.
    #[error("Stale snapshot: built for round {snapshot_round}, but round {completed_round} already completed")]
    StaleSnapshot {
        /// Round the snapshot was built for.
        snapshot_round: u64,
        /// Most recent round the manager completed.
        completed_round: u64,
    },

    /// Settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Result type for cut operations.
pub type CutResult<T> = Result<T, CutError>;
