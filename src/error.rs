//! Error taxonomy for the wave simulation core.
//!
//! Configuration problems surface here at construction time. Numerical
//! trouble inside a tick never does: kernels guard and zero bad values in
//! place so one texel cannot halt the simulation.

use crate::sim::SimKind;

/// Centralized error type for simulation setup, queries and export
#[derive(thiserror::Error, Debug)]
pub enum OceanError {
    #[error("Invalid LOD settings: {0}")]
    InvalidLodSettings(String),

    #[error("Invalid spectrum settings: {0}")]
    InvalidSpectrum(String),

    #[error("Invalid {kind:?} simulation: {reason}")]
    InvalidSimulation { kind: SimKind, reason: String },

    #[error("Query issued before any simulation tick completed")]
    QueryNotReady,

    #[error("Query was cancelled before results were delivered")]
    QueryCancelled,

    #[error("Export error: {0}")]
    Export(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OceanError {
    /// Convenience constructor for simulation configuration errors
    pub fn simulation<T: ToString>(kind: SimKind, reason: T) -> Self {
        OceanError::InvalidSimulation {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, OceanError>;
