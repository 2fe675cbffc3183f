//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::ocean::StepParams;
use crate::params::{
    BakeSettings, Features, FoamParams, FrameTiming, SimulationConfig, SpectrumModel,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "wavebake")]
#[command(about = "Spectral ocean surface simulator and frame baker", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bake a frame range into per-channel EXR files
    Bake(BakeArgs),
    /// Render the height field at one instant to a grayscale PNG
    Preview(PreviewArgs),
    /// Print the surface sample at one point, live or from a bake
    Probe(ProbeArgs),
}

/// Ocean spectrum and grid
#[derive(clap::Args, Debug, Clone)]
pub struct SimArgs {
    /// Grid cells along X
    #[arg(long, value_name = "CELLS", default_value_t = 64)]
    pub resolution_x: usize,

    /// Grid cells along Z
    #[arg(long, value_name = "CELLS", default_value_t = 64)]
    pub resolution_z: usize,

    /// Tile extent along X (meters)
    #[arg(long, value_name = "METERS", default_value_t = 50.0)]
    pub size_x: f64,

    /// Tile extent along Z (meters)
    #[arg(long, value_name = "METERS", default_value_t = 50.0)]
    pub size_z: f64,

    /// Wind speed (m/s)
    #[arg(long, value_name = "M_PER_S", default_value_t = 30.0)]
    pub wind_speed: f64,

    /// Wind heading (degrees, 0 = +X)
    #[arg(long, value_name = "DEGREES", default_value_t = 0.0)]
    pub wind_direction: f64,

    /// Suppress waves shorter than this (meters)
    #[arg(long, value_name = "METERS", default_value_t = 0.01)]
    pub smallest_wave: f64,

    /// Fraction of energy removed from waves against the wind [0, 1]
    #[arg(long, default_value_t = 0.5)]
    pub damp_reflections: f64,

    /// Exponent on the wind alignment term
    #[arg(long, default_value_t = 2.0)]
    pub wave_alignment: f64,

    /// Water depth (meters)
    #[arg(long, value_name = "METERS", default_value_t = 200.0)]
    pub depth: f64,

    /// Spectrum: phillips, pierson-moskowitz, jonswap, tma
    #[arg(long, default_value = "phillips")]
    pub spectrum: SpectrumModel,

    /// Fetch length for jonswap/tma (meters)
    #[arg(long, value_name = "METERS", default_value_t = 120_000.0)]
    pub fetch: f64,

    /// JONSWAP peak enhancement
    #[arg(long, default_value_t = 3.3)]
    pub sharpen_peak: f64,

    /// Phillips amplitude constant
    #[arg(long, default_value_t = 1.0)]
    pub amplitude: f64,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Disable vertical displacement
    #[arg(long)]
    pub no_height: bool,

    /// Disable horizontal displacement
    #[arg(long)]
    pub no_chop: bool,

    /// Disable normals
    #[arg(long)]
    pub no_normals: bool,

    /// Compute the jacobian (required for foam)
    #[arg(long)]
    pub jacobian: bool,

    /// Report jacobian eigenvectors (implies --jacobian)
    #[arg(long)]
    pub spray: bool,
}

impl SimArgs {
    pub fn features(&self) -> Features {
        let mut features = Features::NONE;
        if !self.no_height {
            features = features | Features::HEIGHT;
        }
        if !self.no_chop {
            features = features | Features::CHOP;
        }
        if !self.no_normals {
            features = features | Features::NORMALS;
        }
        if self.jacobian || self.spray {
            features = features | Features::JACOBIAN;
        }
        if self.spray {
            features = features | Features::SPRAY;
        }
        features
    }

    pub fn to_config(&self) -> SimulationConfig {
        SimulationConfig {
            resolution_x: self.resolution_x,
            resolution_z: self.resolution_z,
            size_x_m: self.size_x,
            size_z_m: self.size_z,
            wind_speed_m_per_s: self.wind_speed,
            wind_direction_rad: self.wind_direction.to_radians(),
            smallest_wave_m: self.smallest_wave,
            damp_reflections: self.damp_reflections,
            wave_alignment: self.wave_alignment,
            depth_m: self.depth,
            spectrum: self.spectrum,
            fetch_m: self.fetch,
            sharpen_peak: self.sharpen_peak,
            phillips_amplitude: self.amplitude,
            seed: self.seed,
            features: self.features(),
        }
    }
}

/// Per-step scales and foam shaping
#[derive(clap::Args, Debug, Clone)]
pub struct StepArgs {
    /// Vertical amplitude multiplier
    #[arg(long, default_value_t = 1.0)]
    pub wave_scale: f64,

    /// Horizontal displacement multiplier
    #[arg(long, default_value_t = 1.0)]
    pub chop: f64,

    /// Maximum foam intensity [0, 1]
    #[arg(long, default_value_t = 0.0)]
    pub foam_coverage: f64,

    /// Foam falloff exponent
    #[arg(long, default_value_t = 1.0)]
    pub foam_fade: f64,
}

impl StepArgs {
    pub fn foam(&self) -> FoamParams {
        FoamParams {
            coverage: self.foam_coverage,
            fade: self.foam_fade,
        }
    }

    pub fn at(&self, time_s: f64) -> StepParams {
        StepParams {
            time_s,
            wave_scale: self.wave_scale,
            chop_amount: self.chop,
            foam: self.foam(),
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct BakeArgs {
    #[command(flatten)]
    pub sim: SimArgs,

    #[command(flatten)]
    pub step: StepArgs,

    /// Output directory
    #[arg(long, value_name = "DIR", default_value = "ocean_cache")]
    pub output: PathBuf,

    /// First frame (inclusive)
    #[arg(long, default_value_t = 1)]
    pub start: i32,

    /// Last frame (inclusive)
    #[arg(long, default_value_t = 250)]
    pub end: i32,

    /// Frames per simulated second
    #[arg(long, default_value_t = 24.0)]
    pub fps: f64,

    /// Simulation time at frame 0 (seconds)
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0)]
    pub time_offset: f64,

    /// Fraction of foam carried into the next frame [0, 1]
    #[arg(long, default_value_t = 0.0)]
    pub foam_persistence: f64,

    /// Keep valid frames from an earlier bake
    #[arg(long)]
    pub resume: bool,
}

impl BakeArgs {
    pub fn to_settings(&self) -> BakeSettings {
        BakeSettings {
            wave_scale: self.step.wave_scale,
            chop_amount: self.step.chop,
            foam: self.step.foam(),
            foam_persistence: self.foam_persistence,
            timing: FrameTiming {
                time_per_frame_s: 1.0 / self.fps,
                time_offset_s: self.time_offset,
            },
            resume: self.resume,
            ..BakeSettings::new(&self.output, self.start, self.end)
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub sim: SimArgs,

    /// Simulation time (seconds)
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0)]
    pub time: f64,

    /// Vertical amplitude multiplier
    #[arg(long, default_value_t = 1.0)]
    pub wave_scale: f64,

    /// Output file path
    #[arg(long, default_value = "ocean_height.png")]
    pub output: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub sim: SimArgs,

    #[command(flatten)]
    pub step: StepArgs,

    /// Simulation time (seconds)
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0)]
    pub time: f64,

    /// Normalized X coordinate
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub u: f64,

    /// Normalized Z coordinate
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub v: f64,

    /// Read the sample from this bake directory instead of simulating
    #[arg(long, value_name = "DIR")]
    pub cache: Option<PathBuf>,

    /// Baked frame to read with --cache
    #[arg(long, default_value_t = 1)]
    pub frame: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bake_arguments_map_to_settings() {
        let args = Args::try_parse_from([
            "wavebake",
            "bake",
            "--start",
            "3",
            "--end",
            "9",
            "--fps",
            "10",
            "--output",
            "out",
            "--jacobian",
            "--foam-coverage",
            "0.6",
            "--spectrum",
            "jonswap",
        ])
        .unwrap();
        let Command::Bake(bake) = args.command else {
            panic!("expected bake subcommand");
        };
        let settings = bake.to_settings();
        assert_eq!(settings.frames(), 3..=9);
        assert_eq!(settings.output_dir, PathBuf::from("out"));
        assert!((settings.timing.time_per_frame_s - 0.1).abs() < 1e-12);
        assert_eq!(settings.foam.coverage, 0.6);

        let config = bake.sim.to_config();
        assert_eq!(config.spectrum, SpectrumModel::Jonswap);
        assert!(config.features.jacobian());
        assert!(config.features.height() && config.features.chop());
    }

    #[test]
    fn test_feature_flags() {
        let args = Args::try_parse_from(["wavebake", "preview", "--no-chop", "--spray"]).unwrap();
        let Command::Preview(preview) = args.command else {
            panic!("expected preview subcommand");
        };
        let features = preview.sim.features();
        assert!(!features.chop());
        assert!(features.spray());
        assert!(features.normals());
    }

    #[test]
    fn test_unknown_spectrum_rejected() {
        assert!(Args::try_parse_from(["wavebake", "probe", "--spectrum", "gerstner"]).is_err());
    }

    #[test]
    fn test_wind_direction_in_degrees() {
        let args = Args::try_parse_from(["wavebake", "probe", "--wind-direction", "90"]).unwrap();
        let Command::Probe(probe) = args.command else {
            panic!("expected probe subcommand");
        };
        let config = probe.sim.to_config();
        assert!((config.wind_direction_rad - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
