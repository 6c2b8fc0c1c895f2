//! Domain errors raised by the habit computations and state transitions.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HabitError {
    /// Month lookups accept zero-based indices 0 through 11 only.
    #[error("month index {index} is out of range (expected 0-11)")]
    OutOfRange { index: i64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid habit: {0}")]
    InvalidHabit(String),

    #[error("no habit matches '{0}'")]
    UnknownHabit(String),

    #[error("'{0}' matches more than one habit")]
    AmbiguousHabit(String),

    #[error("habit id '{0}' already exists")]
    DuplicateHabit(String),

    /// Import input failed validation. Existing state is left untouched.
    #[error("import rejected: {0}")]
    ImportRejected(String),
}
