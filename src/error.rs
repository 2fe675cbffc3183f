//! Error types for configuration, simulation, evaluation and baking.

use std::path::PathBuf;

/// Rejected simulation or bake configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("grid resolution must be at least 1 along {axis}, got {value}")]
    InvalidResolution { axis: &'static str, value: usize },

    #[error("physical size must be positive and finite along {axis}, got {value}")]
    InvalidSize { axis: &'static str, value: f64 },

    #[error("parameter `{name}` out of range: {value} (expected {expected})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("unknown spectrum model `{0}` (expected phillips, pierson-moskowitz, jonswap or tma)")]
    UnknownSpectrum(String),

    #[error("frame range is empty: start {start} > end {end}")]
    InvalidFrameRange { start: i32, end: i32 },

    #[error("no output channels enabled, nothing to bake")]
    NoChannels,
}

/// Errors raised by the live simulation.
#[derive(Debug, thiserror::Error)]
pub enum OceanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("non-finite sample coordinate ({u}, {v})")]
    Domain { u: f64, v: f64 },

    #[error("could not allocate {elements} grid elements")]
    AllocationFailure { elements: usize },

    #[error("field is {found_rows}x{found_cols}, transform expects {rows}x{cols}")]
    Shape {
        rows: usize,
        cols: usize,
        found_rows: usize,
        found_cols: usize,
    },
}

/// Low-level failure while reading or writing one cache file.
#[derive(Debug, thiserror::Error)]
pub enum CacheIoError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image codec error on {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{rows}x{cols} grid does not fit an image for {path}")]
    TooLarge {
        path: PathBuf,
        rows: usize,
        cols: usize,
    },

    #[error("bake manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("{path} is {found_w}x{found_h}, expected {expected_w}x{expected_h}")]
    Dimensions {
        path: PathBuf,
        expected_w: u32,
        expected_h: u32,
        found_w: u32,
        found_h: u32,
    },
}

/// Why a bake stopped before reaching `Baked`.
#[derive(Debug, thiserror::Error)]
pub enum BakeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write frame {frame}: {source}")]
    WriteFailure {
        frame: i32,
        #[source]
        source: CacheIoError,
    },

    #[error("bake cancelled after frame {last_written:?}")]
    Cancelled { last_written: Option<i32> },

    #[error("allocation failed while simulating frame {frame}")]
    AllocationFailure { frame: i32 },

    #[error("simulation failed at frame {frame}: {source}")]
    Simulation {
        frame: i32,
        #[source]
        source: OceanError,
    },
}

/// Why a cached frame could not be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotBakedReason {
    /// Outside the baked range, or a channel file is absent.
    Missing,
    /// A channel file exists but could not be decoded as a valid record,
    /// or the directory was baked from different inputs.
    Malformed(String),
}

/// Frame lookup miss; callers fall back to live simulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("frame {frame} is not baked ({reason:?})")]
pub struct NotBaked {
    pub frame: i32,
    pub reason: NotBakedReason,
}

/// Failure to serve a cached sample during playback.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error(transparent)]
    NotBaked(#[from] NotBaked),

    #[error(transparent)]
    Ocean(#[from] OceanError),

    #[error("non-finite playback time {0}")]
    InvalidTime(f64),
}

pub type OceanResult<T> = Result<T, OceanError>;
