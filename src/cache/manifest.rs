//! Bake manifest: the inputs a cache directory was baked from.
//!
//! Frames are only served when the manifest matches the reader's
//! configuration; the frame range may differ.

use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use ron::ser::PrettyConfig;

use crate::error::CacheIoError;
use crate::params::{BakeSettings, FoamParams, FrameTiming, SimulationConfig};

const MANIFEST_FILE: &str = "bake.ron";

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BakeManifest {
    pub config: SimulationConfig,
    pub wave_scale: f64,
    pub chop_amount: f64,
    pub foam: FoamParams,
    pub foam_persistence: f64,
    pub timing: FrameTiming,
    /// Frames this directory may hold
    pub start_frame: i32,
    pub end_frame: i32,
}

impl BakeManifest {
    pub fn new(config: &SimulationConfig, settings: &BakeSettings) -> Self {
        Self {
            config: config.clone(),
            wave_scale: settings.wave_scale,
            chop_amount: settings.chop_amount,
            foam: settings.foam,
            foam_persistence: settings.foam_persistence,
            timing: settings.timing,
            start_frame: settings.start_frame,
            end_frame: settings.end_frame,
        }
    }

    /// Same simulation inputs, ignoring the frame range
    pub fn matches(&self, other: &Self) -> bool {
        self.config == other.config
            && self.wave_scale == other.wave_scale
            && self.chop_amount == other.chop_amount
            && self.foam == other.foam
            && self.foam_persistence == other.foam_persistence
            && self.timing == other.timing
    }

    pub fn frames(&self) -> RangeInclusive<i32> {
        self.start_frame..=self.end_frame
    }

    /// Widen the range to also cover `other`'s frames
    pub fn covering(mut self, other: &Self) -> Self {
        self.start_frame = self.start_frame.min(other.start_frame);
        self.end_frame = self.end_frame.max(other.end_frame);
        self
    }
}

pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

/// `None` when the directory has no manifest
pub fn read(dir: &Path) -> Result<Option<BakeManifest>, CacheIoError> {
    let path = manifest_path(dir);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(CacheIoError::Io { path, source }),
    };
    ron::de::from_str(&contents)
        .map(Some)
        .map_err(|err| CacheIoError::Manifest {
            message: err.to_string(),
            path,
        })
}

/// Replace the manifest atomically
pub fn write(dir: &Path, manifest: &BakeManifest) -> Result<(), CacheIoError> {
    let path = manifest_path(dir);
    let serialized = ron::ser::to_string_pretty(manifest, PrettyConfig::new()).map_err(|err| {
        CacheIoError::Manifest {
            path: path.clone(),
            message: err.to_string(),
        }
    })?;
    let temp = dir.join(format!("{MANIFEST_FILE}.tmp"));
    fs::write(&temp, serialized).map_err(|source| CacheIoError::Io {
        path: temp.clone(),
        source,
    })?;
    fs::rename(&temp, &path).map_err(|source| CacheIoError::Io { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Features, SpectrumModel};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "wavebake-manifest-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn manifest() -> BakeManifest {
        let config = SimulationConfig {
            resolution_x: 12,
            resolution_z: 9,
            wind_direction_rad: 0.3,
            spectrum: SpectrumModel::Jonswap,
            seed: 77,
            features: Features::ALL,
            ..SimulationConfig::default()
        };
        let settings = BakeSettings {
            wave_scale: 0.1,
            chop_amount: 1.0 / 3.0,
            ..BakeSettings::new("unused", 2, 9)
        };
        BakeManifest::new(&config, &settings)
    }

    #[test]
    fn test_written_manifest_reads_back_equal() {
        let dir = scratch_dir("readback");
        let written = manifest();
        write(&dir, &written).unwrap();
        assert_eq!(read(&dir).unwrap(), Some(written));
        assert!(!dir.join("bake.ron.tmp").exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_and_garbage_manifests() {
        let dir = scratch_dir("garbage");
        assert_eq!(read(&dir).unwrap(), None);
        fs::write(manifest_path(&dir), "not ron (").unwrap();
        assert!(matches!(read(&dir), Err(CacheIoError::Manifest { .. })));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_matching_ignores_frame_range() {
        let base = manifest();
        let wider = BakeManifest {
            start_frame: -4,
            end_frame: 40,
            ..base.clone()
        };
        assert!(base.matches(&wider));
        assert_eq!(base.clone().covering(&wider).frames(), -4..=40);

        let mut reseeded = base.clone();
        reseeded.config.seed += 1;
        assert!(!base.matches(&reseeded));
        let rescaled = BakeManifest {
            wave_scale: 0.2,
            ..base.clone()
        };
        assert!(!base.matches(&rescaled));
    }
}
