//! Frequency- and spatial-domain grid storage.

use rustfft::num_complex::Complex;

use crate::error::{OceanError, OceanResult};

pub type Complex64 = Complex<f64>;

/// Allocate `len` copies of `value`, reporting failure instead of aborting
pub(crate) fn try_filled<T: Clone>(len: usize, value: T) -> OceanResult<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| OceanError::AllocationFailure { elements: len })?;
    data.resize(len, value);
    Ok(data)
}

/// Element count of a `rows × cols` grid, failing on overflow
pub(crate) fn grid_len(rows: usize, cols: usize) -> OceanResult<usize> {
    rows.checked_mul(cols)
        .ok_or(OceanError::AllocationFailure { elements: usize::MAX })
}

/// Half-spectrum complex field, `rows = M`, `cols = N/2 + 1`, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyField {
    rows: usize,
    cols: usize,
    data: Vec<Complex64>,
}

impl FrequencyField {
    pub fn zeros(rows: usize, cols: usize) -> OceanResult<Self> {
        Ok(Self {
            rows,
            cols,
            data: try_filled(grid_len(rows, cols)?, Complex64::new(0.0, 0.0))?,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Complex64 {
        self.data[i * self.cols + j]
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex64] {
        &mut self.data
    }
}

/// Real-valued `rows × cols` grid (M × N), row-major
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialField {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl SpatialField {
    pub fn zeros(rows: usize, cols: usize) -> OceanResult<Self> {
        Ok(Self {
            rows,
            cols,
            data: try_filled(grid_len(rows, cols)?, 0.0)?,
        })
    }

    /// Wrap existing samples; `None` when the length does not match
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        (rows.checked_mul(cols) == Some(data.len())).then_some(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }

    /// Add a constant to every sample
    pub(crate) fn offset(&mut self, value: f64) {
        for sample in &mut self.data {
            *sample += value;
        }
    }
}
