//! On-disk layout of one baked frame: one float32 RGB EXR image per channel.
//!
//! Image rows are grid rows (X index), image columns are grid columns (Z index).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use image::{ImageBuffer, ImageFormat, Rgb32FImage};

use crate::error::{CacheIoError, NotBaked, NotBakedReason};
use crate::ocean::{SpatialField, SurfaceChannels, SurfaceFrame};
use crate::params::{Features, FoamParams, SimulationConfig};

/// One RGB float sample as laid out in the image buffer
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
struct Texel {
    r: f32,
    g: f32,
    b: f32,
}

/// Persisted per-frame grids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// (x, height, z) displacement
    Displacement,
    /// (nx, 1, nz), unnormalized
    Normal,
    /// (jxx, jzz, jxz)
    Jacobian,
    /// Accumulated foam in every component
    Foam,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Displacement,
        Channel::Normal,
        Channel::Jacobian,
        Channel::Foam,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Displacement => "disp",
            Channel::Normal => "normal",
            Channel::Jacobian => "jacobian",
            Channel::Foam => "foam",
        }
    }

    pub fn enabled(self, features: Features) -> bool {
        match self {
            Channel::Displacement => features.height() || features.chop(),
            Channel::Normal => features.normals(),
            Channel::Jacobian | Channel::Foam => features.jacobian(),
        }
    }

    /// Channels written for a feature set, in write order
    pub fn enabled_set(features: Features) -> impl Iterator<Item = Channel> {
        Self::ALL.into_iter().filter(move |c| c.enabled(features))
    }
}

/// `{dir}/{channel}_{frame:04}.exr`
pub fn channel_path(dir: &Path, channel: Channel, frame: i32) -> PathBuf {
    dir.join(format!("{}_{:04}.exr", channel.name(), frame))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// True when every channel file the feature set needs exists
pub fn frame_present(dir: &Path, frame: i32, features: Features) -> bool {
    let mut channels = Channel::enabled_set(features).peekable();
    channels.peek().is_some() && channels.all(|c| channel_path(dir, c, frame).is_file())
}

/// Write all enabled channels of `surface` for `frame`.
///
/// Every channel goes to a temporary file first; the frame only becomes
/// visible once all of them are renamed into place. On failure no file of
/// this frame is left behind.
pub fn write_frame(
    dir: &Path,
    frame: i32,
    surface: &SurfaceFrame,
    foam: Option<&SpatialField>,
) -> Result<(), CacheIoError> {
    let channels: Vec<Channel> = Channel::enabled_set(surface.features()).collect();
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(channels.len());

    for &channel in &channels {
        let path = channel_path(dir, channel, frame);
        let temp = temp_path(&path);
        let result = encode(surface, channel, foam, &path).and_then(|image| {
            image
                .save_with_format(&temp, ImageFormat::OpenExr)
                .map_err(|source| CacheIoError::Image {
                    path: temp.clone(),
                    source,
                })
        });
        if let Err(err) = result {
            discard(staged.iter().map(|(t, _)| t.as_path()).chain([temp.as_path()]));
            return Err(err);
        }
        staged.push((temp, path));
    }

    for (index, (temp, path)) in staged.iter().enumerate() {
        if let Err(source) = fs::rename(temp, path) {
            discard(staged[index..].iter().map(|(t, _)| t.as_path()));
            remove_frame(dir, frame);
            return Err(CacheIoError::Io {
                path: path.clone(),
                source,
            });
        }
    }
    Ok(())
}

/// Delete every channel file of `frame`; missing files are fine
pub fn remove_frame(dir: &Path, frame: i32) {
    let paths: Vec<PathBuf> = Channel::ALL
        .iter()
        .flat_map(|&c| {
            let path = channel_path(dir, c, frame);
            [temp_path(&path), path]
        })
        .collect();
    discard(paths.iter().map(PathBuf::as_path));
}

fn discard<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths {
        if let Err(err) = fs::remove_file(path) {
            if err.kind() != io::ErrorKind::NotFound {
                log::warn!("could not remove {}: {}", path.display(), err);
            }
        }
    }
}

fn encode(
    surface: &SurfaceFrame,
    channel: Channel,
    foam: Option<&SpatialField>,
    path: &Path,
) -> Result<Rgb32FImage, CacheIoError> {
    let c = surface.channels();
    let sources: [Option<&SpatialField>; 3] = match channel {
        Channel::Displacement => [c.disp_x.as_ref(), c.disp_y.as_ref(), c.disp_z.as_ref()],
        Channel::Normal => [c.normal_x.as_ref(), None, c.normal_z.as_ref()],
        Channel::Jacobian => [c.jxx.as_ref(), c.jzz.as_ref(), c.jxz.as_ref()],
        Channel::Foam => [foam, foam, foam],
    };
    let fill = match channel {
        Channel::Normal => Texel {
            r: 0.0,
            g: 1.0,
            b: 0.0,
        },
        _ => Texel::default(),
    };

    let len = surface.rows() * surface.cols();
    let texels: Vec<Texel> = (0..len)
        .map(|n| {
            let sample = |field: Option<&SpatialField>, default: f32| {
                field.map_or(default, |f| f.as_slice()[n] as f32)
            };
            Texel {
                r: sample(sources[0], fill.r),
                g: sample(sources[1], fill.g),
                b: sample(sources[2], fill.b),
            }
        })
        .collect();

    let too_large = || CacheIoError::TooLarge {
        path: path.to_path_buf(),
        rows: surface.rows(),
        cols: surface.cols(),
    };
    let width = u32::try_from(surface.cols()).map_err(|_| too_large())?;
    let height = u32::try_from(surface.rows()).map_err(|_| too_large())?;
    let raw: Vec<f32> = bytemuck::cast_slice(texels.as_slice()).to_vec();
    ImageBuffer::from_raw(width, height, raw).ok_or_else(too_large)
}

/// Decode one channel into three fields
fn decode(path: &Path, rows: usize, cols: usize) -> Result<[SpatialField; 3], CacheIoError> {
    let image = image::open(path)
        .map_err(|source| match source {
            image::ImageError::IoError(source) => CacheIoError::Io {
                path: path.to_path_buf(),
                source,
            },
            source => CacheIoError::Image {
                path: path.to_path_buf(),
                source,
            },
        })?
        .into_rgb32f();

    let (width, height) = image.dimensions();
    let mismatch = || CacheIoError::Dimensions {
        path: path.to_path_buf(),
        expected_w: cols as u32,
        expected_h: rows as u32,
        found_w: width,
        found_h: height,
    };
    if width as usize != cols || height as usize != rows {
        return Err(mismatch());
    }

    let raw = image.into_raw();
    let texels: &[Texel] = bytemuck::cast_slice(raw.as_slice());
    let split = |pick: fn(&Texel) -> f32| {
        let samples = texels.iter().map(|t| pick(t) as f64).collect();
        SpatialField::from_vec(rows, cols, samples).ok_or_else(mismatch)
    };
    Ok([
        split(|t: &Texel| t.r)?,
        split(|t: &Texel| t.g)?,
        split(|t: &Texel| t.b)?,
    ])
}

fn not_baked(frame: i32, err: CacheIoError) -> NotBaked {
    let reason = match &err {
        CacheIoError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
            NotBakedReason::Missing
        }
        _ => NotBakedReason::Malformed(err.to_string()),
    };
    NotBaked { frame, reason }
}

/// Read every enabled channel of `frame` back into a surface
pub fn read_frame(
    dir: &Path,
    frame: i32,
    config: &SimulationConfig,
    foam_params: FoamParams,
) -> Result<SurfaceFrame, NotBaked> {
    let features = config.features;
    if Channel::enabled_set(features).next().is_none() {
        return Err(NotBaked {
            frame,
            reason: NotBakedReason::Missing,
        });
    }

    let (rows, cols) = (config.resolution_x, config.resolution_z);
    let mut channels = SurfaceChannels::default();
    for channel in Channel::enabled_set(features) {
        let path = channel_path(dir, channel, frame);
        if !path.is_file() {
            return Err(NotBaked {
                frame,
                reason: NotBakedReason::Missing,
            });
        }
        let [r, g, b] = decode(&path, rows, cols).map_err(|err| not_baked(frame, err))?;
        match channel {
            Channel::Displacement => {
                if features.height() {
                    channels.disp_y = Some(g);
                }
                if features.chop() {
                    channels.disp_x = Some(r);
                    channels.disp_z = Some(b);
                }
            }
            Channel::Normal => {
                channels.normal_x = Some(r);
                channels.normal_z = Some(b);
            }
            Channel::Jacobian => {
                channels.jxx = Some(r);
                channels.jzz = Some(g);
                channels.jxz = Some(b);
            }
            Channel::Foam => channels.foam = Some(r),
        }
    }
    Ok(SurfaceFrame::from_channels(config, foam_params, channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocean::{Spectrum, StepParams};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "wavebake-record-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config(features: Features) -> SimulationConfig {
        SimulationConfig {
            resolution_x: 8,
            resolution_z: 6,
            seed: 5,
            features,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_channel_paths_are_zero_padded() {
        let path = channel_path(Path::new("cache"), Channel::Displacement, 7);
        assert_eq!(path, Path::new("cache").join("disp_0007.exr"));
        let path = channel_path(Path::new("cache"), Channel::Foam, 12345);
        assert_eq!(path, Path::new("cache").join("foam_12345.exr"));
    }

    #[test]
    fn test_channel_selection_follows_features() {
        let names: Vec<&str> = Channel::enabled_set(Features::HEIGHT | Features::JACOBIAN)
            .map(Channel::name)
            .collect();
        assert_eq!(names, vec!["disp", "jacobian", "foam"]);
        assert_eq!(Channel::enabled_set(Features::NONE).count(), 0);
    }

    #[test]
    fn test_write_then_read_frame() {
        let dir = scratch_dir("roundtrip");
        let config = config(Features::ALL);
        let spectrum = Spectrum::synthesize(config.clone()).unwrap();
        let surface = SurfaceFrame::compute(&spectrum, &StepParams::at(0.5)).unwrap();
        let foam = SpatialField::from_vec(8, 6, vec![0.5; 48]).unwrap();

        write_frame(&dir, 3, &surface, Some(&foam)).unwrap();
        assert!(frame_present(&dir, 3, config.features));
        assert!(!temp_path(&channel_path(&dir, Channel::Foam, 3)).exists());

        let loaded = read_frame(&dir, 3, &config, FoamParams::default()).unwrap();
        assert_eq!(loaded.rows(), 8);
        assert_eq!(loaded.cols(), 6);
        for (i, j) in [(0, 0), (4, 5), (7, 2)] {
            let live = surface.eval_grid(i, j);
            let baked = loaded.eval_grid(i, j);
            let tolerance = 1e-5 * (1.0 + live.disp.length());
            assert!((live.disp - baked.disp).length() < tolerance);
            assert!((live.normal - baked.normal).length() < 1e-5);
            assert_eq!(baked.foam, 0.5);
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_channel_reports_missing() {
        let dir = scratch_dir("missing");
        let config = config(Features::ALL);
        let err = read_frame(&dir, 1, &config, FoamParams::default()).unwrap_err();
        assert_eq!(err.reason, NotBakedReason::Missing);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_garbage_file_reports_malformed() {
        let dir = scratch_dir("garbage");
        let config = config(Features::HEIGHT);
        fs::write(channel_path(&dir, Channel::Displacement, 2), b"not an image").unwrap();
        let err = read_frame(&dir, 2, &config, FoamParams::default()).unwrap_err();
        assert!(matches!(err.reason, NotBakedReason::Malformed(_)));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_wrong_dimensions_report_malformed() {
        let dir = scratch_dir("dimensions");
        let small = config(Features::HEIGHT);
        let spectrum = Spectrum::synthesize(small.clone()).unwrap();
        let surface = SurfaceFrame::compute(&spectrum, &StepParams::default()).unwrap();
        write_frame(&dir, 1, &surface, None).unwrap();

        let larger = SimulationConfig {
            resolution_x: 16,
            ..small
        };
        let err = read_frame(&dir, 1, &larger, FoamParams::default()).unwrap_err();
        assert!(matches!(err.reason, NotBakedReason::Malformed(_)));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_remove_frame_clears_all_channels() {
        let dir = scratch_dir("remove");
        let config = config(Features::ALL);
        let spectrum = Spectrum::synthesize(config.clone()).unwrap();
        let surface = SurfaceFrame::compute(&spectrum, &StepParams::default()).unwrap();
        write_frame(&dir, 4, &surface, None).unwrap();
        remove_frame(&dir, 4);
        assert!(!frame_present(&dir, 4, config.features));
        for channel in Channel::ALL {
            assert!(!channel_path(&dir, channel, 4).exists());
        }
        fs::remove_dir_all(&dir).unwrap();
    }
}
