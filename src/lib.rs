//! Wavebake library - spectral ocean surface simulation with frame baking

pub mod cache;
pub mod cli;
pub mod error;
pub mod ocean;
pub mod params;
