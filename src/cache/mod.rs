//! Baked frame cache: persist simulated frames and replay them without resimulating.

mod baker;
mod manifest;
mod record;

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use parking_lot::Mutex;

pub use baker::{bake, BakeProgress, BakeSummary};
pub use manifest::{manifest_path, BakeManifest};
pub use record::{channel_path, Channel};

use crate::error::{ConfigError, NotBaked, NotBakedReason, PlaybackError};
use crate::ocean::{EvalResult, StepParams, SurfaceFrame};
use crate::params::{BakeSettings, SimulationConfig};

/// Bake lifecycle: `Empty -> Baking -> Baked`, or `Baking -> Aborted`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheState {
    #[default]
    Empty,
    Baking,
    Baked,
    Aborted,
}

/// How playback maps a fractional frame onto baked frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameLookup {
    /// Round to the closest baked frame
    #[default]
    Nearest,
    /// Blend the two surrounding baked frames
    Linear,
}

/// Frame records of one bake directory
#[derive(Debug)]
pub struct FrameCache {
    config: SimulationConfig,
    settings: BakeSettings,
    state: CacheState,
    loaded: Mutex<HashMap<i32, Arc<SurfaceFrame>>>,
}

impl FrameCache {
    pub fn new(config: SimulationConfig, settings: BakeSettings) -> Result<Self, ConfigError> {
        config.validate()?;
        settings.validate()?;
        Ok(Self {
            config,
            settings,
            state: CacheState::Empty,
            loaded: Mutex::new(HashMap::new()),
        })
    }

    /// Attach to an existing bake; `Baked` when the directory was baked from
    /// the same inputs and every frame of the range is present
    pub fn open(config: SimulationConfig, settings: BakeSettings) -> Result<Self, ConfigError> {
        let mut cache = Self::new(config, settings)?;
        let complete = cache.check_manifest(cache.settings.frames()).is_ok()
            && cache.settings.frames().all(|frame| {
                record::frame_present(&cache.settings.output_dir, frame, cache.config.features)
            });
        if complete {
            cache.state = CacheState::Baked;
        }
        Ok(cache)
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn settings(&self) -> &BakeSettings {
        &self.settings
    }

    /// Simulation inputs used for `frame`
    pub fn step_for_frame(&self, frame: i32) -> StepParams {
        StepParams {
            time_s: self.settings.timing.time_for_frame(frame),
            wave_scale: self.settings.wave_scale,
            chop_amount: self.settings.chop_amount,
            foam: self.settings.foam,
        }
    }

    pub fn contains(&self, frame: i32) -> bool {
        self.settings.frames().contains(&frame)
    }

    /// Presence check, no decoding
    pub fn is_baked(&self, frame: i32) -> bool {
        self.contains(frame)
            && self.check_manifest(frame..=frame).is_ok()
            && record::frame_present(&self.settings.output_dir, frame, self.config.features)
    }

    /// Load a whole frame, never a partial one
    pub fn load_frame(&self, frame: i32) -> Result<Arc<SurfaceFrame>, NotBaked> {
        if !self.contains(frame) {
            return Err(NotBaked {
                frame,
                reason: NotBakedReason::Missing,
            });
        }
        if let Some(surface) = self.loaded.lock().get(&frame) {
            return Ok(Arc::clone(surface));
        }
        self.check_manifest(frame..=frame)
            .map_err(|reason| NotBaked { frame, reason })?;
        let surface = Arc::new(record::read_frame(
            &self.settings.output_dir,
            frame,
            &self.config,
            self.settings.foam,
        )?);
        self.loaded.lock().insert(frame, Arc::clone(&surface));
        Ok(surface)
    }

    pub fn eval_grid(&self, frame: i32, i: i64, j: i64) -> Result<EvalResult, NotBaked> {
        Ok(self.load_frame(frame)?.eval_grid(i, j))
    }

    pub fn eval_uv(&self, frame: i32, u: f64, v: f64) -> Result<EvalResult, PlaybackError> {
        Ok(self.load_frame(frame)?.eval_uv(u, v)?)
    }

    /// Fractional baked frame for a simulation time, clamped to the range
    pub fn playback_position(&self, time_s: f64) -> Result<f64, PlaybackError> {
        if !time_s.is_finite() {
            return Err(PlaybackError::InvalidTime(time_s));
        }
        let position = self.settings.timing.frame_for_time(time_s);
        Ok(position.clamp(
            self.settings.start_frame as f64,
            self.settings.end_frame as f64,
        ))
    }

    /// Nearest baked frame for a simulation time
    pub fn frame_at_time(&self, time_s: f64) -> Result<Arc<SurfaceFrame>, PlaybackError> {
        let frame = self.playback_position(time_s)?.round() as i32;
        Ok(self.load_frame(frame)?)
    }

    pub fn eval_uv_at_time(
        &self,
        time_s: f64,
        u: f64,
        v: f64,
        lookup: FrameLookup,
    ) -> Result<EvalResult, PlaybackError> {
        let position = self.playback_position(time_s)?;
        match lookup {
            FrameLookup::Nearest => self.eval_uv(position.round() as i32, u, v),
            FrameLookup::Linear => {
                let lower = position.floor() as i32;
                let blend = position - lower as f64;
                let a = self.eval_uv(lower, u, v)?;
                if blend == 0.0 || lower >= self.settings.end_frame {
                    return Ok(a);
                }
                let b = self.eval_uv(lower + 1, u, v)?;
                Ok(a.lerp(&b, blend))
            }
        }
    }

    /// The directory must have been baked from this cache's inputs and cover `frames`
    fn check_manifest(&self, frames: RangeInclusive<i32>) -> Result<(), NotBakedReason> {
        let dir = &self.settings.output_dir;
        let found = match manifest::read(dir) {
            Ok(Some(found)) => found,
            Ok(None) => return Err(NotBakedReason::Missing),
            Err(err) => return Err(NotBakedReason::Malformed(err.to_string())),
        };
        if !found.matches(&BakeManifest::new(&self.config, &self.settings)) {
            return Err(NotBakedReason::Malformed(format!(
                "{} was baked from different inputs",
                dir.display()
            )));
        }
        let covered = found.frames();
        if covered.contains(frames.start()) && covered.contains(frames.end()) {
            Ok(())
        } else {
            Err(NotBakedReason::Missing)
        }
    }

    fn reset(&mut self, config: SimulationConfig, state: CacheState) {
        self.config = config;
        self.state = state;
        self.loaded.lock().clear();
    }

    fn set_state(&mut self, state: CacheState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocean::Ocean;
    use crate::params::{Features, FrameTiming};
    use std::ops::ControlFlow;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "wavebake-cache-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn baked(name: &str) -> (Ocean, FrameCache, PathBuf) {
        let dir = scratch_dir(name);
        let ocean = Ocean::new(SimulationConfig {
            resolution_x: 8,
            resolution_z: 8,
            seed: 21,
            features: Features::HEIGHT | Features::CHOP,
            ..SimulationConfig::default()
        })
        .unwrap();
        let settings = BakeSettings {
            timing: FrameTiming {
                time_per_frame_s: 0.5,
                time_offset_s: 0.0,
            },
            ..BakeSettings::new(&dir, 0, 4)
        };
        let cache = bake(&ocean, settings, |_| ControlFlow::Continue(())).unwrap();
        (ocean, cache, dir)
    }

    #[test]
    fn test_open_detects_complete_bake() {
        let (ocean, cache, dir) = baked("open");
        let reopened = FrameCache::open(ocean.config(), cache.settings().clone()).unwrap();
        assert_eq!(reopened.state(), CacheState::Baked);
        assert!(reopened.is_baked(2));
        assert!(!reopened.is_baked(9));

        std::fs::remove_file(channel_path(&dir, Channel::Displacement, 3)).unwrap();
        let partial = FrameCache::open(ocean.config(), cache.settings().clone()).unwrap();
        assert_eq!(partial.state(), CacheState::Empty);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_open_rejects_other_inputs() {
        let (ocean, cache, dir) = baked("inputs");
        let reseeded = SimulationConfig {
            seed: 99,
            ..ocean.config()
        };
        let other = FrameCache::open(reseeded, cache.settings().clone()).unwrap();
        assert_eq!(other.state(), CacheState::Empty);
        assert!(!other.is_baked(2));
        assert!(matches!(
            other.load_frame(2).unwrap_err().reason,
            NotBakedReason::Malformed(_)
        ));

        let rechopped = BakeSettings {
            chop_amount: 0.5,
            ..cache.settings().clone()
        };
        let other = FrameCache::open(ocean.config(), rechopped).unwrap();
        assert_eq!(other.state(), CacheState::Empty);

        std::fs::remove_file(manifest_path(&dir)).unwrap();
        let unrecorded = FrameCache::open(ocean.config(), cache.settings().clone()).unwrap();
        assert_eq!(unrecorded.state(), CacheState::Empty);
        assert_eq!(unrecorded.load_frame(1).unwrap_err().reason, NotBakedReason::Missing);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_loaded_frames_are_shared() {
        let (_, cache, dir) = baked("shared");
        let a = cache.load_frame(1).unwrap();
        let b = cache.load_frame(1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_out_of_range_frame_not_baked() {
        let (_, cache, dir) = baked("range");
        let miss = cache.load_frame(5).unwrap_err();
        assert_eq!(miss.frame, 5);
        assert_eq!(miss.reason, NotBakedReason::Missing);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_nearest_playback_rounds_time() {
        let (_, cache, dir) = baked("nearest");
        // 0.5 s per frame: t = 0.8 s is frame 1.6
        let sampled = cache.eval_uv_at_time(0.8, 0.3, 0.4, FrameLookup::Nearest).unwrap();
        assert_eq!(sampled, cache.eval_uv(2, 0.3, 0.4).unwrap());
        // Clamped past the end
        let late = cache.eval_uv_at_time(60.0, 0.3, 0.4, FrameLookup::Nearest).unwrap();
        assert_eq!(late, cache.eval_uv(4, 0.3, 0.4).unwrap());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_linear_playback_blends_frames() {
        let (_, cache, dir) = baked("linear");
        let a = cache.eval_uv(1, 0.6, 0.1).unwrap();
        let b = cache.eval_uv(2, 0.6, 0.1).unwrap();
        let mid = cache.eval_uv_at_time(0.75, 0.6, 0.1, FrameLookup::Linear).unwrap();
        let expected = 0.5 * (a.disp + b.disp);
        assert!((mid.disp - expected).length() < 1e-9 * (1.0 + expected.length()));

        let exact = cache.eval_uv_at_time(1.0, 0.6, 0.1, FrameLookup::Linear).unwrap();
        assert_eq!(exact, b);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_playback_rejects_bad_time() {
        let (_, cache, dir) = baked("badtime");
        assert!(matches!(
            cache.eval_uv_at_time(f64::NAN, 0.0, 0.0, FrameLookup::Nearest),
            Err(PlaybackError::InvalidTime(_))
        ));
        assert!(matches!(
            cache.eval_uv(1, f64::INFINITY, 0.0),
            Err(PlaybackError::Ocean(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
