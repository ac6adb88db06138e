//! Error types for the resus_core library.

use crate::types::{DoseUnit, Drug, Mode, Procedure};
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for resus_core operations
///
/// Clinical refusals are validation errors: the engine state is left
/// untouched and the operator may retry. See [`Error::is_validation`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored session state error
    #[error("State error: {0}")]
    State(String),

    /// Dose would push the cumulative total past the drug ceiling
    #[error("{drug} {requested} {unit} refused: only {remaining} {unit} remaining before the ceiling")]
    DoseCeiling {
        drug: Drug,
        requested: f64,
        remaining: f64,
        unit: DoseUnit,
    },

    /// Dose is zero, negative or not a number
    #[error("Invalid {drug} dose: {dose}")]
    InvalidDose { drug: Drug, dose: f64 },

    /// Coach mode allows a single shock per cycle
    #[error("Shock refused: a shock was already delivered in cycle {cycle}")]
    ShockRefused { cycle: u32 },

    /// Shock energy must be positive
    #[error("Invalid shock energy: {0} J")]
    InvalidEnergy(u16),

    /// Mode changes alter alarm behavior and must be confirmed
    #[error("Switching to {0} mode requires confirmation")]
    ConfirmationRequired(Mode),

    #[error("Adrenaline frequency must be 3, 4 or 5 minutes (got {0})")]
    InvalidFrequency(u8),

    #[error("Session has not been started")]
    NotStarted,

    #[error("Session has ended")]
    SessionEnded,

    #[error("{0} has already been recorded")]
    ProcedureAlreadyRecorded(Procedure),

    #[error("Notes exceed {max} characters")]
    NotesTooLong { max: usize },

    #[error("Nothing to undo")]
    NothingToUndo,

    /// The undo window for the most recent entry has closed
    #[error("Undo window for the last '{0}' event has expired")]
    UndoExpired(&'static str),

    /// Operator input could not be interpreted
    #[error("Invalid input: {0}")]
    Parse(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for operator-recoverable refusals, false for I/O and
    /// configuration faults.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::DoseCeiling { .. }
                | Error::InvalidDose { .. }
                | Error::ShockRefused { .. }
                | Error::InvalidEnergy(_)
                | Error::ConfirmationRequired(_)
                | Error::InvalidFrequency(_)
                | Error::NotStarted
                | Error::SessionEnded
                | Error::ProcedureAlreadyRecorded(_)
                | Error::NotesTooLong { .. }
                | Error::NothingToUndo
                | Error::UndoExpired(_)
                | Error::Parse(_)
        )
    }
}
