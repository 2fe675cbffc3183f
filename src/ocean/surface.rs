//! Spatial surface frame and point evaluation.

use glam::DVec3;

use super::evolve::{self, StepParams};
use super::grid::{FrequencyField, SpatialField};
use super::spectrum::Spectrum;
use super::transform::InverseTransform;
use crate::error::{OceanError, OceanResult};
use crate::params::{Features, FoamParams, SimulationConfig};

/// Below this |jxz| the jacobian is treated as diagonal
const DIAGONAL_EPSILON: f64 = 1e-12;

/// Surface state at one point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalResult {
    /// Displacement from the rest position (x, height, z), meters
    pub disp: DVec3,
    /// Unit surface normal
    pub normal: DVec3,
    /// Foam intensity [0, 1]
    pub foam: f64,
    /// Smaller jacobian eigenvalue; < 0 where the surface folds
    pub jminus: f64,
    pub jplus: f64,
    /// Eigenvector of `jminus`, zero unless spray is enabled
    pub eminus: DVec3,
    /// Eigenvector of `jplus`, zero unless spray is enabled
    pub eplus: DVec3,
}

impl Default for EvalResult {
    fn default() -> Self {
        Self {
            disp: DVec3::ZERO,
            normal: DVec3::Y,
            foam: 0.0,
            jminus: 1.0,
            jplus: 1.0,
            eminus: DVec3::ZERO,
            eplus: DVec3::ZERO,
        }
    }
}

impl EvalResult {
    /// Rescale displacement for display: height by `height_scale`, x/z by `chop_scale`
    pub fn scaled(mut self, height_scale: f64, chop_scale: f64) -> Self {
        self.disp.y *= height_scale;
        self.disp.x *= chop_scale;
        self.disp.z *= chop_scale;
        self
    }

    /// Blend two results; eigenvectors come from the nearer sample
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        let normal = self.normal.lerp(other.normal, t).normalize_or_zero();
        let (eminus, eplus) = if t < 0.5 {
            (self.eminus, self.eplus)
        } else {
            (other.eminus, other.eplus)
        };
        Self {
            disp: self.disp.lerp(other.disp, t),
            normal: if normal == DVec3::ZERO { DVec3::Y } else { normal },
            foam: self.foam + (other.foam - self.foam) * t,
            jminus: self.jminus + (other.jminus - self.jminus) * t,
            jplus: self.jplus + (other.jplus - self.jplus) * t,
            eminus,
            eplus,
        }
    }
}

/// Eigen-decomposition of the symmetric 2×2 jacobian `[[jxx, jxz], [jxz, jzz]]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobianEigen {
    pub jminus: f64,
    pub jplus: f64,
    pub eminus: DVec3,
    pub eplus: DVec3,
}

impl JacobianEigen {
    pub fn new(jxx: f64, jzz: f64, jxz: f64) -> Self {
        let trace = jxx + jzz;
        let spread = ((jxx - jzz) * (jxx - jzz) + 4.0 * jxz * jxz).sqrt();
        let jminus = 0.5 * (trace - spread);
        let jplus = 0.5 * (trace + spread);

        let (eminus, eplus) = if jxz.abs() < DIAGONAL_EPSILON {
            if jxx >= jzz {
                (DVec3::Z, DVec3::X)
            } else {
                (DVec3::X, DVec3::Z)
            }
        } else {
            let qminus = (jminus - jxx) / jxz;
            let qplus = (jplus - jxx) / jxz;
            (
                DVec3::new(1.0, 0.0, qminus).normalize(),
                DVec3::new(1.0, 0.0, qplus).normalize(),
            )
        };

        Self {
            jminus,
            jplus,
            eminus,
            eplus,
        }
    }
}

/// Foam from crest compression: `coverage * clamp(1 - jminus, 0, 1)^fade`
pub fn foam_from_jminus(jminus: f64, params: &FoamParams) -> f64 {
    if params.coverage <= 0.0 {
        return 0.0;
    }
    params.coverage * (1.0 - jminus).clamp(0.0, 1.0).powf(params.fade)
}

/// Spatial channels of one frame; `None` where the feature is off
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceChannels {
    pub disp_x: Option<SpatialField>,
    pub disp_y: Option<SpatialField>,
    pub disp_z: Option<SpatialField>,
    pub normal_x: Option<SpatialField>,
    pub normal_z: Option<SpatialField>,
    /// Includes the +1 identity term
    pub jxx: Option<SpatialField>,
    /// Includes the +1 identity term
    pub jzz: Option<SpatialField>,
    pub jxz: Option<SpatialField>,
    /// Baked foam; overrides the foam curve when present
    pub foam: Option<SpatialField>,
}

/// Immutable spatial fields of one simulation step
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceFrame {
    rows: usize,
    cols: usize,
    size_x_m: f64,
    size_z_m: f64,
    features: Features,
    foam_params: FoamParams,
    channels: SurfaceChannels,
}

impl SurfaceFrame {
    /// Evolve `spectrum` to `step` and transform every enabled field
    pub fn compute(spectrum: &Spectrum, step: &StepParams) -> OceanResult<Self> {
        let fields = evolve::advance(spectrum, step)?;
        let transform = spectrum.transform();
        let mut channels = SurfaceChannels {
            disp_x: spatial(transform, fields.chop_x)?,
            disp_y: spatial(transform, fields.height)?,
            disp_z: spatial(transform, fields.chop_z)?,
            normal_x: spatial(transform, fields.normal_x)?,
            normal_z: spatial(transform, fields.normal_z)?,
            jxx: spatial(transform, fields.jxx)?,
            jzz: spatial(transform, fields.jzz)?,
            jxz: spatial(transform, fields.jxz)?,
            foam: None,
        };
        for diagonal in [&mut channels.jxx, &mut channels.jzz].into_iter().flatten() {
            diagonal.offset(1.0);
        }
        Ok(Self::from_channels(spectrum.config(), step.foam, channels))
    }

    pub fn from_channels(
        config: &SimulationConfig,
        foam_params: FoamParams,
        channels: SurfaceChannels,
    ) -> Self {
        Self {
            rows: config.resolution_x,
            cols: config.resolution_z,
            size_x_m: config.size_x_m,
            size_z_m: config.size_z_m,
            features: config.features,
            foam_params,
            channels,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn foam_params(&self) -> FoamParams {
        self.foam_params
    }

    pub fn channels(&self) -> &SurfaceChannels {
        &self.channels
    }

    /// Replace the foam channel, e.g. with an accumulated one
    pub fn with_foam(mut self, foam: SpatialField) -> Self {
        self.channels.foam = Some(foam);
        self
    }

    /// Foam at every grid point: the baked channel or the foam curve applied to `jminus`
    pub fn foam_field(&self) -> OceanResult<Option<SpatialField>> {
        if let Some(foam) = &self.channels.foam {
            return Ok(Some(foam.clone()));
        }
        if !self.has_jacobian() {
            return Ok(None);
        }
        let mut foam = SpatialField::zeros(self.rows, self.cols)?;
        for i in 0..self.rows {
            for j in 0..self.cols {
                foam.as_mut_slice()[i * self.cols + j] = self.eval_grid(i as i64, j as i64).foam;
            }
        }
        Ok(Some(foam))
    }

    fn has_jacobian(&self) -> bool {
        self.channels.jxx.is_some() && self.channels.jzz.is_some() && self.channels.jxz.is_some()
    }

    /// Exact samples at grid point (i, j); indices wrap
    pub fn eval_grid(&self, i: i64, j: i64) -> EvalResult {
        if self.rows == 0 || self.cols == 0 {
            return EvalResult::default();
        }
        let i = i.rem_euclid(self.rows as i64) as usize;
        let j = j.rem_euclid(self.cols as i64) as usize;
        self.resolve(|field| field.get(i, j))
    }

    /// Bilinear samples at normalized coordinates; `u` spans X, `v` spans Z, both wrap
    pub fn eval_uv(&self, u: f64, v: f64) -> OceanResult<EvalResult> {
        if !(u.is_finite() && v.is_finite()) {
            return Err(OceanError::Domain { u, v });
        }
        if self.rows == 0 || self.cols == 0 {
            return Ok(EvalResult::default());
        }
        let (i0, i1, fx) = lattice(u, self.rows);
        let (j0, j1, fz) = lattice(v, self.cols);
        Ok(self.resolve(|field| {
            let top = field.get(i0, j0) * (1.0 - fz) + field.get(i0, j1) * fz;
            let bottom = field.get(i1, j0) * (1.0 - fz) + field.get(i1, j1) * fz;
            top * (1.0 - fx) + bottom * fx
        }))
    }

    /// Bilinear samples at world position (meters)
    pub fn eval_xz(&self, x_m: f64, z_m: f64) -> OceanResult<EvalResult> {
        self.eval_uv(x_m / self.size_x_m, z_m / self.size_z_m)
    }

    fn resolve(&self, sample: impl Fn(&SpatialField) -> f64) -> EvalResult {
        let c = &self.channels;
        let read = |field: &Option<SpatialField>| field.as_ref().map(&sample);
        let mut result = EvalResult::default();

        if let Some(y) = read(&c.disp_y) {
            result.disp.y = y;
        }
        if let (Some(x), Some(z)) = (read(&c.disp_x), read(&c.disp_z)) {
            result.disp.x = x;
            result.disp.z = z;
        }
        if let (Some(nx), Some(nz)) = (read(&c.normal_x), read(&c.normal_z)) {
            result.normal = DVec3::new(nx, 1.0, nz).normalize();
        }
        if let (Some(jxx), Some(jzz), Some(jxz)) = (read(&c.jxx), read(&c.jzz), read(&c.jxz)) {
            let eigen = JacobianEigen::new(jxx, jzz, jxz);
            result.jminus = eigen.jminus;
            result.jplus = eigen.jplus;
            if self.features.spray() {
                result.eminus = eigen.eminus;
                result.eplus = eigen.eplus;
            }
            result.foam = foam_from_jminus(eigen.jminus, &self.foam_params);
        }
        if let Some(foam) = read(&c.foam) {
            result.foam = foam;
        }
        result
    }
}

fn spatial(
    transform: &InverseTransform,
    field: Option<FrequencyField>,
) -> OceanResult<Option<SpatialField>> {
    field.map(|f| transform.process(&f)).transpose()
}

/// Wrapped lower/upper lattice indices and blend weight along one axis
fn lattice(coord: f64, n: usize) -> (usize, usize, f64) {
    let scaled = coord.rem_euclid(1.0) * n as f64;
    let floor = scaled.floor();
    let lower = (floor as usize) % n;
    (lower, (lower + 1) % n, scaled - floor)
}
