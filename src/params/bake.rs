//! Foam shaping, frame timing and bake configuration.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Foam response to crest compression
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FoamParams {
    /// Maximum foam intensity [0, 1]; 0 disables foam
    pub coverage: f64,

    /// Falloff exponent away from the compression threshold (> 0).
    /// 1 = linear, larger values keep foam to the most folded crests.
    pub fade: f64,
}

impl Default for FoamParams {
    fn default() -> Self {
        Self {
            coverage: 0.0,
            fade: 1.0,
        }
    }
}

impl FoamParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.coverage) {
            return Err(ConfigError::InvalidParameter {
                name: "foam_coverage",
                value: self.coverage,
                expected: "a value in [0, 1]",
            });
        }
        if !(self.fade.is_finite() && self.fade > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "foam_fade",
                value: self.fade,
                expected: "a positive exponent",
            });
        }
        Ok(())
    }
}

/// Mapping between integer frame numbers and simulation time
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameTiming {
    /// Simulated seconds per frame (the playback scale)
    pub time_per_frame_s: f64,

    /// Simulation time at frame 0 (seconds)
    pub time_offset_s: f64,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self {
            time_per_frame_s: 1.0 / 24.0,
            time_offset_s: 0.0,
        }
    }
}

impl FrameTiming {
    pub fn time_for_frame(&self, frame: i32) -> f64 {
        self.time_offset_s + frame as f64 * self.time_per_frame_s
    }

    /// Fractional frame position for a simulation time
    pub fn frame_for_time(&self, time_s: f64) -> f64 {
        (time_s - self.time_offset_s) / self.time_per_frame_s
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.time_per_frame_s.is_finite() && self.time_per_frame_s > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "time_per_frame_s",
                value: self.time_per_frame_s,
                expected: "a positive value",
            });
        }
        if !self.time_offset_s.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "time_offset_s",
                value: self.time_offset_s,
                expected: "a finite value",
            });
        }
        Ok(())
    }
}

/// Bake configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BakeSettings {
    /// First frame (inclusive)
    pub start_frame: i32,

    /// Last frame (inclusive)
    pub end_frame: i32,

    /// Directory receiving one file per channel per frame
    pub output_dir: PathBuf,

    /// Vertical amplitude multiplier
    pub wave_scale: f64,

    /// Horizontal displacement multiplier
    pub chop_amount: f64,

    pub foam: FoamParams,

    /// Fraction of last frame's foam carried into the next [0, 1].
    /// 0 = baked foam equals instantaneous foam.
    pub foam_persistence: f64,

    pub timing: FrameTiming,

    /// Keep frames already present and valid instead of clearing the range
    pub resume: bool,
}

impl BakeSettings {
    pub fn new(output_dir: impl Into<PathBuf>, start_frame: i32, end_frame: i32) -> Self {
        Self {
            start_frame,
            end_frame,
            output_dir: output_dir.into(),
            wave_scale: 1.0,
            chop_amount: 1.0,
            foam: FoamParams::default(),
            foam_persistence: 0.0,
            timing: FrameTiming::default(),
            resume: false,
        }
    }

    /// Total number of frames in the range
    pub fn total_frames(&self) -> usize {
        let span = i64::from(self.end_frame) - i64::from(self.start_frame) + 1;
        usize::try_from(span.max(0)).unwrap_or(usize::MAX)
    }

    pub fn frames(&self) -> std::ops::RangeInclusive<i32> {
        self.start_frame..=self.end_frame
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_frame > self.end_frame {
            return Err(ConfigError::InvalidFrameRange {
                start: self.start_frame,
                end: self.end_frame,
            });
        }
        for (name, value) in [
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
        if !(0.0..=1.0).contains(&self.foam_persistence) {
            return Err(ConfigError::InvalidParameter {
                name: "foam_persistence",
                value: self.foam_persistence,
                expected: "a value in [0, 1]",
            });
        }
        self.foam.validate()?;
        self.timing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_frames_inclusive() {
        let settings = BakeSettings::new("cache", 1, 250);
        assert_eq!(settings.total_frames(), 250);
        assert_eq!(settings.frames().count(), 250);
    }

    #[test]
    fn test_total_frames_full_i32_range() {
        let settings = BakeSettings::new("cache", i32::MIN, i32::MAX);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.total_frames() as u64, 1u64 << 32);
        assert_eq!(BakeSettings::new("cache", 3, 3).total_frames(), 1);
    }

    #[test]
    fn test_reversed_range_rejected() {
        let settings = BakeSettings::new("cache", 10, 2);
        assert_eq!(
            settings.validate(),
            Err(ConfigError::InvalidFrameRange { start: 10, end: 2 })
        );
    }

    #[test]
    fn test_frame_time_mapping_inverts() {
        let timing = FrameTiming {
            time_per_frame_s: 0.5,
            time_offset_s: 2.0,
        };
        assert_eq!(timing.time_for_frame(4), 4.0);
        assert_eq!(timing.frame_for_time(4.0), 4.0);
        assert_eq!(timing.frame_for_time(4.25), 4.5);
    }

    #[test]
    fn test_foam_coverage_range() {
        let foam = FoamParams {
            coverage: 1.2,
            fade: 1.0,
        };
        assert!(foam.validate().is_err());
        let foam = FoamParams {
            coverage: 0.5,
            fade: 0.0,
        };
        assert!(foam.validate().is_err());
    }
}
