//! Ocean spectrum and grid configuration.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use crate::error::ConfigError;

/// Standard gravity (m/s²)
pub const GRAVITY_M_PER_S2: f64 = 9.81;

/// Statistical wave spectrum used to seed the frequency field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum SpectrumModel {
    /// Tessendorf's Phillips spectrum, defined directly over wavenumber
    #[default]
    Phillips,
    /// Fully developed sea, no fetch limit
    PiersonMoskowitz,
    /// Fetch-limited sea with a sharpened peak
    Jonswap,
    /// JONSWAP attenuated for shallow water (Texel, Marsen, Arsloe)
    TexelMarsenArsloe,
}

impl SpectrumModel {
    pub fn name(self) -> &'static str {
        match self {
            Self::Phillips => "phillips",
            Self::PiersonMoskowitz => "pierson-moskowitz",
            Self::Jonswap => "jonswap",
            Self::TexelMarsenArsloe => "tma",
        }
    }
}

impl fmt::Display for SpectrumModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpectrumModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phillips" => Ok(Self::Phillips),
            "pierson-moskowitz" | "piersonmoskowitz" | "pm" => Ok(Self::PiersonMoskowitz),
            "jonswap" => Ok(Self::Jonswap),
            "tma" | "texel-marsen-arsloe" => Ok(Self::TexelMarsenArsloe),
            other => Err(ConfigError::UnknownSpectrum(other.to_string())),
        }
    }
}

/// Set of output channels the simulation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Features(u8);

impl Features {
    pub const NONE: Self = Self(0);
    /// Vertical displacement
    pub const HEIGHT: Self = Self(1 << 0);
    /// Horizontal (choppy) displacement
    pub const CHOP: Self = Self(1 << 1);
    /// Jacobian eigenvectors in eval results (needs `JACOBIAN`)
    pub const SPRAY: Self = Self(1 << 2);
    /// Surface normals
    pub const NORMALS: Self = Self(1 << 3);
    /// Displacement jacobian, the foam source
    pub const JACOBIAN: Self = Self(1 << 4);
    pub const ALL: Self = Self(0b1_1111);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn height(self) -> bool {
        self.contains(Self::HEIGHT)
    }

    pub fn chop(self) -> bool {
        self.contains(Self::CHOP)
    }

    pub fn normals(self) -> bool {
        self.contains(Self::NORMALS)
    }

    pub fn jacobian(self) -> bool {
        self.contains(Self::JACOBIAN)
    }

    /// Spray only makes sense on top of the jacobian
    pub fn spray(self) -> bool {
        self.contains(Self::SPRAY) && self.jacobian()
    }
}

impl Default for Features {
    fn default() -> Self {
        Self::HEIGHT | Self::CHOP | Self::NORMALS
    }
}

impl BitOr for Features {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

/// Immutable description of one synthesized ocean.
///
/// Changing any field requires re-synthesis. Time, wave scale and chop amount
/// are per-step inputs and live in [`crate::ocean::StepParams`] instead.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimulationConfig {
    /// Grid cells along X (M)
    pub resolution_x: usize,

    /// Grid cells along Z (N)
    pub resolution_z: usize,

    /// Tile extent along X (meters)
    pub size_x_m: f64,

    /// Tile extent along Z (meters)
    pub size_z_m: f64,

    /// Wind speed (m/s), sets the largest wave L = V²/g
    pub wind_speed_m_per_s: f64,

    /// Wind heading in the XZ plane (radians, 0 = +X)
    pub wind_direction_rad: f64,

    /// Waves shorter than this are suppressed (meters)
    pub smallest_wave_m: f64,

    /// Fraction of energy removed from waves travelling against the wind [0, 1]
    pub damp_reflections: f64,

    /// Exponent on |cos(k, wind)|; 0 = isotropic, 2 = classic Phillips
    pub wave_alignment: f64,

    /// Water depth (meters), enters the dispersion relation
    pub depth_m: f64,

    pub spectrum: SpectrumModel,

    /// Fetch length for JONSWAP/TMA (meters)
    pub fetch_m: f64,

    /// JONSWAP peak enhancement γ (1 = Pierson-Moskowitz shape)
    pub sharpen_peak: f64,

    /// Phillips amplitude constant A
    pub phillips_amplitude: f64,

    pub seed: u64,

    pub features: Features,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            resolution_x: 64,
            resolution_z: 64,
            size_x_m: 50.0,
            size_z_m: 50.0,
            wind_speed_m_per_s: 30.0,
            wind_direction_rad: 0.0,
            smallest_wave_m: 0.01,
            damp_reflections: 0.5,
            wave_alignment: 2.0,
            depth_m: 200.0,
            spectrum: SpectrumModel::Phillips,
            fetch_m: 120_000.0,
            sharpen_peak: 3.3,
            phillips_amplitude: 1.0,
            seed: 0,
            features: Features::default(),
        }
    }
}

impl SimulationConfig {
    /// Square grid of `resolution²` cells per side, the way hosts expose it
    pub fn from_resolution(resolution: usize) -> Self {
        let cells = resolution * resolution;
        Self {
            resolution_x: cells,
            resolution_z: cells,
            ..Self::default()
        }
    }

    /// Number of stored half-spectrum columns (N/2 + 1)
    pub fn half_columns(&self) -> usize {
        self.resolution_z / 2 + 1
    }

    /// Largest wave sustained by the wind (meters)
    pub fn largest_wave_m(&self) -> f64 {
        self.wind_speed_m_per_s * self.wind_speed_m_per_s / GRAVITY_M_PER_S2
    }

    /// Unit wind vector as (x, z)
    pub fn wind_vector(&self) -> (f64, f64) {
        (self.wind_direction_rad.cos(), self.wind_direction_rad.sin())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution_x == 0 {
            return Err(ConfigError::InvalidResolution {
                axis: "x",
                value: self.resolution_x,
            });
        }
        if self.resolution_z == 0 {
            return Err(ConfigError::InvalidResolution {
                axis: "z",
                value: self.resolution_z,
            });
        }
        for (axis, value) in [("x", self.size_x_m), ("z", self.size_z_m)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidSize { axis, value });
            }
        }

        positive("wind_speed_m_per_s", self.wind_speed_m_per_s)?;
        positive("depth_m", self.depth_m)?;
        finite("wind_direction_rad", self.wind_direction_rad)?;
        non_negative("smallest_wave_m", self.smallest_wave_m)?;
        non_negative("wave_alignment", self.wave_alignment)?;
        positive("phillips_amplitude", self.phillips_amplitude)?;
        if !(0.0..=1.0).contains(&self.damp_reflections) {
            return Err(ConfigError::InvalidParameter {
                name: "damp_reflections",
                value: self.damp_reflections,
                expected: "a value in [0, 1]",
            });
        }
        if matches!(
            self.spectrum,
            SpectrumModel::Jonswap | SpectrumModel::TexelMarsenArsloe
        ) {
            positive("fetch_m", self.fetch_m)?;
            positive("sharpen_peak", self.sharpen_peak)?;
        }
        Ok(())
    }
}

fn finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value,
            expected: "a finite value",
        })
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value,
            expected: "a positive value",
        })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value,
            expected: "a non-negative value",
        })
    }
}
