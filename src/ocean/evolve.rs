//! Time evolution of the spectrum and derived frequency fields.

use rayon::prelude::*;

use super::grid::{Complex64, FrequencyField};
use super::spectrum::{dispersion, Spectrum};
use crate::error::{ConfigError, OceanResult};
use crate::params::FoamParams;

/// Per-step inputs; changing these never requires re-synthesis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    /// Simulation time (seconds)
    pub time_s: f64,

    /// Vertical amplitude multiplier
    pub wave_scale: f64,

    /// Horizontal displacement multiplier (λ)
    pub chop_amount: f64,

    /// Foam curve applied when evaluating this step
    pub foam: FoamParams,
}

impl Default for StepParams {
    fn default() -> Self {
        Self {
            time_s: 0.0,
            wave_scale: 1.0,
            chop_amount: 1.0,
            foam: FoamParams::default(),
        }
    }
}

impl StepParams {
    pub fn at(time_s: f64) -> Self {
        Self {
            time_s,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("time_s", self.time_s),
            ("wave_scale", self.wave_scale),
            ("chop_amount", self.chop_amount),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name,
                    value,
                    expected: "a finite value",
                });
            }
        }
        self.foam.validate()
    }
}

/// Frequency-domain fields for one step, `None` where the feature is off
#[derive(Debug, Default)]
pub struct FrequencyFields {
    pub height: Option<FrequencyField>,
    pub chop_x: Option<FrequencyField>,
    pub chop_z: Option<FrequencyField>,
    pub jxx: Option<FrequencyField>,
    pub jzz: Option<FrequencyField>,
    pub jxz: Option<FrequencyField>,
    pub normal_x: Option<FrequencyField>,
    pub normal_z: Option<FrequencyField>,
}

/// Time-evolved height spectrum:
/// `h(k, t) = h0(k) e^{iωt} + conj(h0(-k)) e^{-iωt}`, scaled by
/// `wave_scale * normalize_factor`
pub fn htilda(spectrum: &Spectrum, step: &StepParams) -> OceanResult<FrequencyField> {
    let h0 = spectrum.h0();
    let h0_minus = spectrum.h0_minus();
    let waves = spectrum.waves();
    let depth = spectrum.config().depth_m;
    let scale = step.wave_scale * spectrum.normalize_factor();
    let cols = h0.cols();

    let mut out = FrequencyField::zeros(h0.rows(), cols)?;
    out.as_mut_slice()
        .par_chunks_mut(cols)
        .enumerate()
        .for_each(|(i, row)| {
            for (j, value) in row.iter_mut().enumerate() {
                let omega = dispersion(waves.k(i, j), depth);
                let phase = Complex64::cis(omega * step.time_s);
                let h = h0.get(i, j) * phase + h0_minus.get(i, j).conj() * phase.conj();
                *value = h * scale;
            }
        });
    Ok(out)
}

/// Multiply `h` bin-wise by a function of (kx, kz, |k|); k = 0 yields zero
fn derive<F>(spectrum: &Spectrum, h: &FrequencyField, coefficient: F) -> OceanResult<FrequencyField>
where
    F: Fn(f64, f64, f64) -> Complex64 + Sync,
{
    let waves = spectrum.waves();
    let cols = h.cols();
    let mut out = FrequencyField::zeros(h.rows(), cols)?;
    out.as_mut_slice()
        .par_chunks_mut(cols)
        .enumerate()
        .for_each(|(i, row)| {
            for (j, value) in row.iter_mut().enumerate() {
                let k = waves.k(i, j);
                if k > 0.0 {
                    *value = h.get(i, j) * coefficient(waves.kx(i), waves.kz(j), k);
                }
            }
        });
    Ok(out)
}

/// Evolve the spectrum to `step.time_s` and build every enabled field
pub fn advance(spectrum: &Spectrum, step: &StepParams) -> OceanResult<FrequencyFields> {
    let features = spectrum.config().features;
    let mut fields = FrequencyFields::default();
    if features.is_empty() {
        return Ok(fields);
    }

    let h = htilda(spectrum, step)?;
    let chop = step.chop_amount;

    if features.chop() {
        fields.chop_x = Some(derive(spectrum, &h, |kx, _, k| {
            Complex64::new(0.0, chop * kx / k)
        })?);
        fields.chop_z = Some(derive(spectrum, &h, |_, kz, k| {
            Complex64::new(0.0, chop * kz / k)
        })?);
    }
    if features.jacobian() {
        fields.jxx = Some(derive(spectrum, &h, |kx, _, k| {
            Complex64::new(-chop * kx * kx / k, 0.0)
        })?);
        fields.jzz = Some(derive(spectrum, &h, |_, kz, k| {
            Complex64::new(-chop * kz * kz / k, 0.0)
        })?);
        fields.jxz = Some(derive(spectrum, &h, |kx, kz, k| {
            Complex64::new(-chop * kx * kz / k, 0.0)
        })?);
    }
    if features.normals() {
        fields.normal_x = Some(derive(spectrum, &h, |kx, _, _| Complex64::new(0.0, -kx))?);
        fields.normal_z = Some(derive(spectrum, &h, |_, kz, _| Complex64::new(0.0, -kz))?);
    }
    if features.height() {
        fields.height = Some(h);
    }
    Ok(fields)
}
