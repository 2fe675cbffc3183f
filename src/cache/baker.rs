//! Frame-range baking.

use std::ops::ControlFlow;

use super::manifest::{self, BakeManifest};
use super::record;
use super::{CacheState, FrameCache};
use crate::error::{BakeError, ConfigError, OceanError};
use crate::ocean::{Ocean, SpatialField, SurfaceFrame};
use crate::params::BakeSettings;

/// Reported after each frame is persisted (or kept on resume)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BakeProgress {
    pub frame: i32,
    pub completed: usize,
    pub total: usize,
}

/// Outcome of a finished bake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BakeSummary {
    /// Frames simulated and written
    pub written: usize,
    /// Valid frames kept from an earlier bake
    pub reused: usize,
}

/// Bake `ocean` over `settings`' frame range into a new cache
pub fn bake<F>(ocean: &Ocean, settings: BakeSettings, progress: F) -> Result<FrameCache, BakeError>
where
    F: FnMut(BakeProgress) -> ControlFlow<()>,
{
    let mut cache = FrameCache::new(ocean.config(), settings)?;
    cache.bake(ocean, progress)?;
    Ok(cache)
}

/// `min(previous * persistence + current, 1)`
fn accumulate_foam(previous: Option<&SpatialField>, current: &mut SpatialField, persistence: f64) {
    let Some(previous) = previous else {
        return;
    };
    for (now, before) in current.as_mut_slice().iter_mut().zip(previous.as_slice()) {
        *now = (before * persistence + *now).min(1.0);
    }
}

fn simulation_error(frame: i32, err: OceanError) -> BakeError {
    match err {
        OceanError::Config(err) => BakeError::Config(err),
        OceanError::AllocationFailure { .. } => BakeError::AllocationFailure { frame },
        source => BakeError::Simulation { frame, source },
    }
}

impl FrameCache {
    /// Simulate and persist every frame of the range.
    ///
    /// Frames are baked in order; `progress` may stop the bake after any
    /// frame, in which case every frame written so far stays loadable. Without
    /// `resume`, records already present in the range are removed first.
    /// Records baked from different inputs are never reused.
    pub fn bake<F>(&mut self, ocean: &Ocean, mut progress: F) -> Result<BakeSummary, BakeError>
    where
        F: FnMut(BakeProgress) -> ControlFlow<()>,
    {
        let snapshot = ocean.snapshot();
        let config = snapshot.config().clone();
        if record::Channel::enabled_set(config.features).next().is_none() {
            return Err(ConfigError::NoChannels.into());
        }
        let settings = self.settings().clone();
        let dir = settings.output_dir.clone();
        let first = settings.start_frame;

        self.reset(config.clone(), CacheState::Baking);
        if let Err(source) = std::fs::create_dir_all(&dir) {
            self.set_state(CacheState::Aborted);
            return Err(BakeError::WriteFailure {
                frame: first,
                source: crate::error::CacheIoError::Io { path: dir, source },
            });
        }
        let current = BakeManifest::new(&config, &settings);
        let previous = manifest::read(&dir).unwrap_or_else(|err| {
            log::warn!("ignoring unreadable manifest: {err}");
            None
        });
        // Only frames baked from identical inputs may be kept
        let (recorded, reuse) = match previous {
            Some(previous) if previous.matches(&current) => {
                (current.clone().covering(&previous), settings.resume)
            }
            Some(previous) => {
                log::info!(
                    "inputs changed since the last bake, clearing frames {}..={}",
                    previous.start_frame,
                    previous.end_frame
                );
                for frame in previous.frames() {
                    record::remove_frame(&dir, frame);
                }
                (current, false)
            }
            None => (current, false),
        };
        if !reuse {
            for frame in settings.frames() {
                record::remove_frame(&dir, frame);
            }
        }
        if let Err(source) = manifest::write(&dir, &recorded) {
            self.set_state(CacheState::Aborted);
            return Err(BakeError::WriteFailure {
                frame: first,
                source,
            });
        }

        let total = settings.total_frames();
        let mut summary = BakeSummary {
            written: 0,
            reused: 0,
        };
        let mut last_written = None;
        let mut previous_foam: Option<SpatialField> = None;
        log::info!(
            "baking frames {}..={} into {}",
            settings.start_frame,
            settings.end_frame,
            dir.display()
        );

        for (index, frame) in settings.frames().enumerate() {
            let existing = if reuse {
                record::read_frame(&dir, frame, &config, settings.foam).ok()
            } else {
                None
            };

            if let Some(existing) = existing {
                previous_foam = existing.channels().foam.clone();
                summary.reused += 1;
                log::debug!("frame {frame}: kept");
            } else {
                let step = self.step_for_frame(frame);
                let result = SurfaceFrame::compute(snapshot.spectrum(), &step)
                    .and_then(|surface| {
                        let foam = match surface.foam_field()? {
                            Some(mut foam) => {
                                accumulate_foam(
                                    previous_foam.as_ref(),
                                    &mut foam,
                                    settings.foam_persistence,
                                );
                                Some(foam)
                            }
                            None => None,
                        };
                        Ok((surface, foam))
                    });
                let (surface, foam) = match result {
                    Ok(computed) => computed,
                    Err(err) => {
                        self.set_state(CacheState::Aborted);
                        return Err(simulation_error(frame, err));
                    }
                };

                if let Err(source) = record::write_frame(&dir, frame, &surface, foam.as_ref()) {
                    log::warn!("frame {frame}: write failed: {source}");
                    self.set_state(CacheState::Aborted);
                    return Err(BakeError::WriteFailure { frame, source });
                }
                previous_foam = foam;
                summary.written += 1;
                log::debug!("frame {frame}: written (t = {:.3}s)", step.time_s);
            }
            last_written = Some(frame);

            let report = BakeProgress {
                frame,
                completed: index + 1,
                total,
            };
            if progress(report).is_break() {
                log::info!("bake cancelled after frame {frame}");
                self.set_state(CacheState::Aborted);
                return Err(BakeError::Cancelled { last_written });
            }
        }

        self.set_state(CacheState::Baked);
        log::info!(
            "baked {} frames ({} written, {} reused)",
            total,
            summary.written,
            summary.reused
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{channel_path, Channel};
    use crate::error::NotBakedReason;
    use crate::params::{Features, FoamParams, SimulationConfig};
    use std::path::{Path, PathBuf};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "wavebake-bake-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn ocean(features: Features) -> Ocean {
        Ocean::new(SimulationConfig {
            resolution_x: 8,
            resolution_z: 8,
            seed: 9,
            features,
            ..SimulationConfig::default()
        })
        .unwrap()
    }

    fn settings(dir: &Path, start: i32, end: i32) -> BakeSettings {
        BakeSettings {
            foam: FoamParams {
                coverage: 1.0,
                fade: 1.0,
            },
            ..BakeSettings::new(dir, start, end)
        }
    }

    #[test]
    fn test_baked_frames_match_live_simulation() {
        let dir = scratch_dir("roundtrip");
        let ocean = ocean(Features::ALL);
        let mut reported = Vec::new();
        let cache = bake(&ocean, settings(&dir, 1, 5), |p| {
            reported.push((p.frame, p.completed, p.total));
            ControlFlow::Continue(())
        })
        .unwrap();

        assert_eq!(cache.state(), CacheState::Baked);
        assert_eq!(reported, vec![(1, 1, 5), (2, 2, 5), (3, 3, 5), (4, 4, 5), (5, 5, 5)]);
        for frame in 1..=5 {
            let live = ocean.render(&cache.step_for_frame(frame)).unwrap();
            let baked = cache.load_frame(frame).unwrap();
            for (i, j) in [(0, 0), (2, 7), (5, 3)] {
                let (a, b) = (live.eval_grid(i, j), baked.eval_grid(i, j));
                let tolerance = 1e-5 * (1.0 + a.disp.length());
                assert!((a.disp - b.disp).length() < tolerance, "frame {frame}");
                assert!((a.normal - b.normal).length() < 1e-5);
                assert!((a.jminus - b.jminus).abs() < 1e-4 * (1.0 + a.jminus.abs()));
                assert!((a.foam - b.foam).abs() < 1e-5);
            }
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_cancellation_keeps_written_frames() {
        let dir = scratch_dir("cancel");
        let ocean = ocean(Features::HEIGHT | Features::NORMALS);
        let mut cache = FrameCache::new(ocean.config(), settings(&dir, 1, 6)).unwrap();
        let err = cache
            .bake(&ocean, |p| {
                if p.frame == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap_err();

        assert!(matches!(err, BakeError::Cancelled { last_written: Some(3) }));
        assert_eq!(cache.state(), CacheState::Aborted);
        for frame in 1..=3 {
            assert!(cache.load_frame(frame).is_ok(), "frame {frame}");
        }
        for frame in 4..=6 {
            let miss = cache.load_frame(frame).unwrap_err();
            assert_eq!(miss.reason, NotBakedReason::Missing);
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_resume_reuses_valid_frames() {
        let dir = scratch_dir("resume");
        let ocean = ocean(Features::HEIGHT);
        let mut cache = FrameCache::new(ocean.config(), settings(&dir, 0, 3)).unwrap();
        let _ = cache.bake(&ocean, |p| {
            if p.frame == 1 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        let resumed = BakeSettings {
            resume: true,
            ..settings(&dir, 0, 3)
        };
        let mut cache = FrameCache::new(ocean.config(), resumed).unwrap();
        let summary = cache.bake(&ocean, |_| ControlFlow::Continue(())).unwrap();
        assert_eq!(summary, BakeSummary { written: 2, reused: 2 });
        assert!(cache.load_frame(3).is_ok());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_resume_rebakes_frames_from_other_inputs() {
        let dir = scratch_dir("reseed");
        let first = Ocean::new(SimulationConfig {
            seed: 1,
            ..ocean(Features::HEIGHT).config()
        })
        .unwrap();
        bake(&first, settings(&dir, 0, 2), |_| ControlFlow::Continue(())).unwrap();

        let second = Ocean::new(SimulationConfig {
            seed: 2,
            ..first.config()
        })
        .unwrap();
        let resumed = BakeSettings {
            resume: true,
            ..settings(&dir, 0, 2)
        };
        let mut cache = FrameCache::new(second.config(), resumed).unwrap();
        let summary = cache.bake(&second, |_| ControlFlow::Continue(())).unwrap();
        assert_eq!(summary, BakeSummary { written: 3, reused: 0 });

        for frame in 0..=2 {
            let live = second.render(&cache.step_for_frame(frame)).unwrap();
            let baked = cache.load_frame(frame).unwrap();
            let (a, b) = (live.eval_grid(3, 1), baked.eval_grid(3, 1));
            assert!((a.disp.y - b.disp.y).abs() < 1e-5 * (1.0 + a.disp.y.abs()));
        }

        // Readers with other inputs are refused
        let stale = FrameCache::open(first.config(), settings(&dir, 0, 2)).unwrap();
        assert_ne!(stale.state(), CacheState::Baked);
        assert!(matches!(
            stale.load_frame(1).unwrap_err().reason,
            NotBakedReason::Malformed(_)
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_resume_with_other_wave_scale_rebakes() {
        let dir = scratch_dir("rescale");
        let ocean = ocean(Features::HEIGHT);
        bake(&ocean, settings(&dir, 0, 1), |_| ControlFlow::Continue(())).unwrap();

        let rescaled = BakeSettings {
            wave_scale: 2.0,
            resume: true,
            ..settings(&dir, 0, 1)
        };
        let mut cache = FrameCache::new(ocean.config(), rescaled).unwrap();
        let summary = cache.bake(&ocean, |_| ControlFlow::Continue(())).unwrap();
        assert_eq!(summary, BakeSummary { written: 2, reused: 0 });
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_failure_aborts_at_failing_frame() {
        let dir = scratch_dir("writefail");
        let ocean = ocean(Features::HEIGHT | Features::NORMALS);
        // A directory in place of frame 3's record makes the final rename fail
        std::fs::create_dir_all(channel_path(&dir, Channel::Displacement, 3)).unwrap();

        let mut cache = FrameCache::new(ocean.config(), settings(&dir, 1, 5)).unwrap();
        let err = cache.bake(&ocean, |_| ControlFlow::Continue(())).unwrap_err();
        assert!(matches!(err, BakeError::WriteFailure { frame: 3, .. }));
        assert_eq!(cache.state(), CacheState::Aborted);

        assert!(cache.load_frame(1).is_ok());
        assert!(cache.load_frame(2).is_ok());
        assert!(cache.load_frame(3).is_err());
        assert_eq!(cache.load_frame(4).unwrap_err().reason, NotBakedReason::Missing);
        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_simulation_errors_keep_their_class() {
        assert!(matches!(
            simulation_error(4, OceanError::AllocationFailure { elements: 9 }),
            BakeError::AllocationFailure { frame: 4 }
        ));
        assert!(matches!(
            simulation_error(4, OceanError::Domain { u: f64::NAN, v: 0.0 }),
            BakeError::Simulation {
                frame: 4,
                source: OceanError::Domain { .. }
            }
        ));
        assert!(matches!(
            simulation_error(4, ConfigError::NoChannels.into()),
            BakeError::Config(ConfigError::NoChannels)
        ));
    }

    #[test]
    fn test_fresh_bake_clears_stale_frames() {
        let dir = scratch_dir("stale");
        let ocean = ocean(Features::HEIGHT);
        bake(&ocean, settings(&dir, 0, 4), |_| ControlFlow::Continue(())).unwrap();

        let mut cache = FrameCache::new(ocean.config(), settings(&dir, 0, 4)).unwrap();
        let _ = cache.bake(&ocean, |p| {
            if p.frame == 0 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert!(cache.load_frame(0).is_ok());
        assert!(cache.load_frame(2).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_nothing_to_bake_rejected() {
        let dir = scratch_dir("empty");
        let ocean = ocean(Features::NONE);
        let err = bake(&ocean, settings(&dir, 0, 1), |_| ControlFlow::Continue(())).unwrap_err();
        assert!(matches!(err, BakeError::Config(ConfigError::NoChannels)));
        assert!(!dir.exists());
    }

    #[test]
    fn test_reversed_range_rejected_before_baking() {
        let dir = scratch_dir("reversed");
        let ocean = ocean(Features::HEIGHT);
        let err = bake(&ocean, settings(&dir, 5, 1), |_| ControlFlow::Continue(())).unwrap_err();
        assert!(matches!(
            err,
            BakeError::Config(ConfigError::InvalidFrameRange { start: 5, end: 1 })
        ));
    }

    #[test]
    fn test_foam_accumulates_with_persistence() {
        let previous = SpatialField::from_vec(1, 3, vec![0.5, 1.0, 0.0]).unwrap();
        let mut current = SpatialField::from_vec(1, 3, vec![0.25, 0.5, 0.3]).unwrap();
        accumulate_foam(Some(&previous), &mut current, 0.5);
        assert_eq!(current.as_slice(), &[0.5, 1.0, 0.3]);

        let mut first = SpatialField::from_vec(1, 1, vec![0.7]).unwrap();
        accumulate_foam(None, &mut first, 0.9);
        assert_eq!(first.as_slice(), &[0.7]);
    }
}
