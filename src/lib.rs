//! wavecascade - cascaded ocean wave simulation and query engine
//!
//! A stack of nested square grids follows the viewer. Each tick, wave
//! sources (FFT spectra or Gerstner components) fill every grid with its
//! own octave of detail, a fixed sequence of simulations (depth, flow,
//! dynamic waves, shape combine, foam and friends) updates the grids, and
//! the result is published as an immutable snapshot for the renderer and
//! for batched point queries.

pub mod cascade;
pub mod error;
pub mod export;
pub mod fft;
pub mod ocean;
pub mod params;
pub mod query;
pub mod sim;
pub mod spectrum;
pub mod viewer;
pub mod waves;

pub use error::{OceanError, Result};
pub use ocean::{FrameSnapshot, OceanSystem};
