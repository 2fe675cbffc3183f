//! Parameter definitions with physical units and documented semantics.
//!
//! All tunable numbers live here with:
//! - Physical units (meters, seconds, radians)
//! - Documented ranges and meanings
//! - Validation returning typed errors instead of silent clamping

mod bake;
mod simulation;

// Re-export all types
pub use bake::{BakeSettings, FoamParams, FrameTiming};
pub use simulation::{Features, SimulationConfig, SpectrumModel, GRAVITY_M_PER_S2};
