//! Spectral ocean surface: synthesis, time evolution, transform and evaluation.
//!
//! ```text
//! SimulationConfig ──synthesize──▶ Spectrum (h0, h0(-k))
//!                                     │ advance(StepParams)
//!                                     ▼
//!                               FrequencyFields ──InverseTransform──▶ SurfaceFrame ──▶ EvalResult
//! ```

mod evolve;
mod grid;
mod spectrum;
mod surface;
mod system;
mod transform;

pub use evolve::{advance, htilda, FrequencyFields, StepParams};
pub use grid::{Complex64, FrequencyField, SpatialField};
pub use spectrum::{dispersion, Spectrum, SpectrumShape, WaveNumbers};
pub use surface::{foam_from_jminus, EvalResult, JacobianEigen, SurfaceChannels, SurfaceFrame};
pub use system::{Ocean, OceanSnapshot};
pub use transform::InverseTransform;
