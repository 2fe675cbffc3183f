//! Thread-safe ocean handle.
//!
//! Readers take an `Arc` snapshot of the current spectrum and surface; writers
//! build a complete replacement off to the side and swap it in. A reader never
//! sees a half-written frame and the write lock is only held for the swap.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::evolve::StepParams;
use super::spectrum::Spectrum;
use super::surface::{EvalResult, SurfaceFrame};
use crate::error::OceanResult;
use crate::params::SimulationConfig;

/// One consistent (spectrum, step, surface) triple
#[derive(Debug)]
pub struct OceanSnapshot {
    spectrum: Arc<Spectrum>,
    step: StepParams,
    surface: Arc<SurfaceFrame>,
}

impl OceanSnapshot {
    pub fn config(&self) -> &SimulationConfig {
        self.spectrum.config()
    }

    pub fn spectrum(&self) -> &Arc<Spectrum> {
        &self.spectrum
    }

    pub fn step(&self) -> StepParams {
        self.step
    }

    pub fn surface(&self) -> &Arc<SurfaceFrame> {
        &self.surface
    }

    pub fn eval_grid(&self, i: i64, j: i64) -> EvalResult {
        self.surface.eval_grid(i, j)
    }

    pub fn eval_uv(&self, u: f64, v: f64) -> OceanResult<EvalResult> {
        self.surface.eval_uv(u, v)
    }

    pub fn eval_xz(&self, x_m: f64, z_m: f64) -> OceanResult<EvalResult> {
        self.surface.eval_xz(x_m, z_m)
    }
}

/// Shared simulation state: many concurrent readers, serialized writers
pub struct Ocean {
    current: RwLock<Arc<OceanSnapshot>>,
    writer: Mutex<()>,
}

impl Ocean {
    /// Synthesize `config` and compute the surface at t = 0
    pub fn new(config: SimulationConfig) -> OceanResult<Self> {
        Self::with_step(config, StepParams::default())
    }

    pub fn with_step(config: SimulationConfig, step: StepParams) -> OceanResult<Self> {
        step.validate()?;
        let spectrum = Arc::new(Spectrum::synthesize(config)?);
        let surface = Arc::new(SurfaceFrame::compute(&spectrum, &step)?);
        Ok(Self {
            current: RwLock::new(Arc::new(OceanSnapshot {
                spectrum,
                step,
                surface,
            })),
            writer: Mutex::new(()),
        })
    }

    /// Current consistent state; stays valid while later steps are published
    pub fn snapshot(&self) -> Arc<OceanSnapshot> {
        Arc::clone(&*self.current.read())
    }

    pub fn config(&self) -> SimulationConfig {
        self.snapshot().config().clone()
    }

    /// Re-synthesize with a new configuration, keeping the current step.
    ///
    /// On error the previous state stays published.
    pub fn reconfigure(&self, config: SimulationConfig) -> OceanResult<()> {
        let _gate = self.writer.lock();
        let step = self.snapshot().step;
        let spectrum = Arc::new(Spectrum::synthesize(config)?);
        let surface = Arc::new(SurfaceFrame::compute(&spectrum, &step)?);
        self.publish(OceanSnapshot {
            spectrum,
            step,
            surface,
        });
        Ok(())
    }

    /// Advance to `step` and publish the new surface
    pub fn simulate(&self, step: StepParams) -> OceanResult<()> {
        step.validate()?;
        let _gate = self.writer.lock();
        let spectrum = Arc::clone(&self.snapshot().spectrum);
        let surface = Arc::new(SurfaceFrame::compute(&spectrum, &step)?);
        log::debug!("simulated t = {:.3}s", step.time_s);
        self.publish(OceanSnapshot {
            spectrum,
            step,
            surface,
        });
        Ok(())
    }

    /// Compute the surface for `step` without publishing it
    pub fn render(&self, step: &StepParams) -> OceanResult<SurfaceFrame> {
        step.validate()?;
        SurfaceFrame::compute(&self.snapshot().spectrum, step)
    }

    pub fn eval_grid(&self, i: i64, j: i64) -> EvalResult {
        self.snapshot().eval_grid(i, j)
    }

    pub fn eval_uv(&self, u: f64, v: f64) -> OceanResult<EvalResult> {
        self.snapshot().eval_uv(u, v)
    }

    pub fn eval_xz(&self, x_m: f64, z_m: f64) -> OceanResult<EvalResult> {
        self.snapshot().eval_xz(x_m, z_m)
    }

    fn publish(&self, snapshot: OceanSnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }
}
