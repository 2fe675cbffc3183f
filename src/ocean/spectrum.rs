//! Static wave-amplitude field synthesis.
//!
//! The initial field `h0(k)` is drawn once per configuration. Every bin seeds
//! its own ChaCha8 stream from `(seed, signed kx index, signed kz index)`, so
//! rows can be filled in parallel and a given physical wavenumber keeps its
//! random draw when the grid resolution changes.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use super::evolve::{self, StepParams};
use super::grid::{grid_len, try_filled, Complex64, FrequencyField};
use super::transform::InverseTransform;
use crate::error::OceanResult;
use crate::params::{SimulationConfig, SpectrumModel, GRAVITY_M_PER_S2};

/// Pierson-Moskowitz Phillips constant
const PM_ALPHA: f64 = 0.0081;

/// Angular frequency of a wave with wavenumber `k` over water `depth_m` deep
#[inline]
pub fn dispersion(k: f64, depth_m: f64) -> f64 {
    (GRAVITY_M_PER_S2 * k * (k * depth_m).tanh()).sqrt()
}

/// dω/dk of [`dispersion`]
fn dispersion_slope(k: f64, depth_m: f64) -> f64 {
    let omega = dispersion(k, depth_m);
    if omega == 0.0 {
        return 0.0;
    }
    let kh = k * depth_m;
    let tanh = kh.tanh();
    GRAVITY_M_PER_S2 * (tanh + kh * (1.0 - tanh * tanh)) / (2.0 * omega)
}

/// FFT-order signed frequency index: `0, 1, .., n/2, -(n-1)/2, .., -1`
#[inline]
pub(crate) fn signed_index(i: usize, n: usize) -> i64 {
    if 2 * i <= n {
        i as i64
    } else {
        i as i64 - n as i64
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed of the Gaussian stream for one wavenumber bin
fn bin_seed(seed: u64, kx_index: i64, kz_index: i64) -> u64 {
    let h = splitmix64(seed ^ splitmix64(kx_index as u64));
    splitmix64(h ^ (kz_index as u64).rotate_left(32))
}

/// Discrete wavenumbers of the half-spectrum grid
#[derive(Debug, Clone)]
pub struct WaveNumbers {
    rows: usize,
    cols: usize,
    half: usize,
    size_x_m: f64,
    size_z_m: f64,
    kx: Vec<f64>,
    kz: Vec<f64>,
    k: Vec<f64>,
}

impl WaveNumbers {
    pub fn new(config: &SimulationConfig) -> OceanResult<Self> {
        let rows = config.resolution_x;
        let cols = config.resolution_z;
        let half = config.half_columns();
        let mut kx = try_filled(rows, 0.0)?;
        for (i, value) in kx.iter_mut().enumerate() {
            *value = 2.0 * PI * signed_index(i, rows) as f64 / config.size_x_m;
        }
        let mut kz = try_filled(half, 0.0)?;
        for (j, value) in kz.iter_mut().enumerate() {
            *value = 2.0 * PI * signed_index(j, cols) as f64 / config.size_z_m;
        }
        let mut k = try_filled(grid_len(rows, half)?, 0.0)?;
        for (row, &x) in k.chunks_mut(half).zip(&kx) {
            for (value, &z) in row.iter_mut().zip(&kz) {
                *value = (x * x + z * z).sqrt();
            }
        }
        Ok(Self {
            rows,
            cols,
            half,
            size_x_m: config.size_x_m,
            size_z_m: config.size_z_m,
            kx,
            kz,
            k,
        })
    }

    #[inline]
    pub fn kx(&self, i: usize) -> f64 {
        self.kx[i]
    }

    #[inline]
    pub fn kz(&self, j: usize) -> f64 {
        self.kz[j]
    }

    /// |k| for half-spectrum bin (i, j)
    #[inline]
    pub fn k(&self, i: usize, j: usize) -> f64 {
        self.k[i * self.half + j]
    }

    /// Full-grid bin holding the wavenumber `-k` of bin (i, j)
    #[inline]
    pub fn mirror(&self, i: usize, j: usize) -> (usize, usize) {
        ((self.rows - i) % self.rows, (self.cols - j) % self.cols)
    }

    /// Physical wavevector of any full-grid bin
    fn wavevector(&self, i: usize, j: usize) -> (f64, f64, i64, i64) {
        let si = signed_index(i, self.rows);
        let sj = signed_index(j, self.cols);
        (
            2.0 * PI * si as f64 / self.size_x_m,
            2.0 * PI * sj as f64 / self.size_z_m,
            si,
            sj,
        )
    }
}

/// Directional wave energy density P(kx, kz) for one configuration
#[derive(Debug, Clone)]
pub struct SpectrumShape {
    model: SpectrumModel,
    wind: (f64, f64),
    wind_speed: f64,
    largest_wave_m: f64,
    smallest_wave_m: f64,
    alignment: f64,
    reflection_gain: f64,
    depth_m: f64,
    fetch_m: f64,
    gamma: f64,
    amplitude: f64,
}

impl SpectrumShape {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            model: config.spectrum,
            wind: config.wind_vector(),
            wind_speed: config.wind_speed_m_per_s,
            largest_wave_m: config.largest_wave_m(),
            smallest_wave_m: config.smallest_wave_m,
            alignment: config.wave_alignment,
            reflection_gain: 1.0 - config.damp_reflections,
            depth_m: config.depth_m,
            fetch_m: config.fetch_m,
            gamma: config.sharpen_peak,
            amplitude: config.phillips_amplitude,
        }
    }

    /// Energy density at wavevector (kx, kz); zero at k = 0
    pub fn density(&self, kx: f64, kz: f64) -> f64 {
        let k2 = kx * kx + kz * kz;
        if k2 == 0.0 {
            return 0.0;
        }
        let k = k2.sqrt();

        let base = match self.model {
            SpectrumModel::Phillips => {
                let l2 = self.largest_wave_m * self.largest_wave_m;
                self.amplitude * (-1.0 / (k2 * l2)).exp() / (k2 * k2)
            }
            _ => {
                let omega = dispersion(k, self.depth_m);
                if omega == 0.0 {
                    return 0.0;
                }
                self.frequency_density(omega) * dispersion_slope(k, self.depth_m) / k
            }
        };

        let small_wave_cutoff = (-k2 * self.smallest_wave_m * self.smallest_wave_m).exp();
        base * small_wave_cutoff * self.directional(kx, kz, k)
    }

    /// Bias toward the wind, damping waves travelling against it
    fn directional(&self, kx: f64, kz: f64, k: f64) -> f64 {
        let cos = (self.wind.0 * kx + self.wind.1 * kz) / k;
        let spread = cos.abs().powf(self.alignment);
        if cos < 0.0 {
            spread * self.reflection_gain
        } else {
            spread
        }
    }

    /// S(ω) for the frequency-domain models
    fn frequency_density(&self, omega: f64) -> f64 {
        let g = GRAVITY_M_PER_S2;
        match self.model {
            SpectrumModel::Phillips => 0.0,
            SpectrumModel::PiersonMoskowitz => {
                let peak = 0.87 * g / self.wind_speed;
                alpha_beta(PM_ALPHA, omega, peak)
            }
            SpectrumModel::Jonswap => self.jonswap(omega),
            SpectrumModel::TexelMarsenArsloe => {
                let omega_h = omega * (self.depth_m / g).sqrt();
                let kitaigorodskii = 0.5 + 0.5 * (1.8 * (omega_h - 1.125)).tanh();
                self.jonswap(omega) * kitaigorodskii
            }
        }
    }

    fn jonswap(&self, omega: f64) -> f64 {
        let g = GRAVITY_M_PER_S2;
        let dimensionless_fetch = g * self.fetch_m / (self.wind_speed * self.wind_speed);
        let alpha = 0.076 * dimensionless_fetch.powf(-0.22);
        let peak = 22.0 * g / self.wind_speed * dimensionless_fetch.powf(-0.33);
        let sigma = if omega <= peak { 0.07 } else { 0.09 };
        let r = (-(omega - peak).powi(2) / (2.0 * sigma * sigma * peak * peak)).exp();
        alpha_beta(alpha, omega, peak) * self.gamma.powf(r)
    }
}

/// α g² ω⁻⁵ exp(-5/4 (ωp/ω)⁴)
fn alpha_beta(alpha: f64, omega: f64, peak: f64) -> f64 {
    let g = GRAVITY_M_PER_S2;
    alpha * g * g / omega.powi(5) * (-1.25 * (peak / omega).powi(4)).exp()
}

/// Time-invariant spectrum of one configuration, plus its transform plan
#[derive(Debug)]
pub struct Spectrum {
    config: SimulationConfig,
    waves: WaveNumbers,
    h0: FrequencyField,
    h0_minus: FrequencyField,
    normalize_factor: f64,
    transform: InverseTransform,
}

impl Spectrum {
    /// Validate `config` and draw `h0`.
    ///
    /// Non-Phillips spectra are rescaled so the tallest wave at t = 0 is one
    /// unit high before `wave_scale`.
    pub fn synthesize(config: SimulationConfig) -> OceanResult<Self> {
        config.validate()?;

        let waves = WaveNumbers::new(&config)?;
        let shape = SpectrumShape::new(&config);
        let rows = config.resolution_x;
        let cols = config.half_columns();
        let mut h0 = FrequencyField::zeros(rows, cols)?;
        let mut h0_minus = FrequencyField::zeros(rows, cols)?;

        let amplitude = |i: usize, j: usize| -> Complex64 {
            let (kx, kz, si, sj) = waves.wavevector(i, j);
            let p = shape.density(kx, kz);
            if p.is_nan() || p <= 0.0 {
                return Complex64::new(0.0, 0.0);
            }
            let mut rng = ChaCha8Rng::seed_from_u64(bin_seed(config.seed, si, sj));
            let r1: f64 = rng.sample(StandardNormal);
            let r2: f64 = rng.sample(StandardNormal);
            Complex64::new(r1, r2) * (p / 2.0).sqrt()
        };

        h0.as_mut_slice()
            .par_chunks_mut(cols)
            .zip(h0_minus.as_mut_slice().par_chunks_mut(cols))
            .enumerate()
            .for_each(|(i, (row, row_minus))| {
                for j in 0..cols {
                    row[j] = amplitude(i, j);
                    let (mi, mj) = waves.mirror(i, j);
                    row_minus[j] = amplitude(mi, mj);
                }
            });

        let transform = InverseTransform::new(config.resolution_x, config.resolution_z);
        let mut spectrum = Self {
            config,
            waves,
            h0,
            h0_minus,
            normalize_factor: 1.0,
            transform,
        };

        if spectrum.config.spectrum != SpectrumModel::Phillips {
            let heights = evolve::htilda(&spectrum, &StepParams::default())?;
            let max_height = spectrum.transform.process(&heights)?.max_abs();
            if max_height > 0.0 {
                spectrum.normalize_factor = 1.0 / max_height;
            }
        }

        log::info!(
            "synthesized {} spectrum on {}x{} grid ({}m x {}m, seed {})",
            spectrum.config.spectrum,
            rows,
            spectrum.config.resolution_z,
            spectrum.config.size_x_m,
            spectrum.config.size_z_m,
            spectrum.config.seed
        );
        Ok(spectrum)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn waves(&self) -> &WaveNumbers {
        &self.waves
    }

    pub fn h0(&self) -> &FrequencyField {
        &self.h0
    }

    /// `h0(-k)` stored at the index of `k`
    pub fn h0_minus(&self) -> &FrequencyField {
        &self.h0_minus
    }

    pub fn normalize_factor(&self) -> f64 {
        self.normalize_factor
    }

    pub fn transform(&self) -> &InverseTransform {
        &self.transform
    }
}
