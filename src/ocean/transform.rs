//! Half-spectrum complex-to-real 2D inverse transform.
//!
//! Unnormalized, the Tessendorf convention: a single bin of amplitude `a`
//! contributes `a e^{i k·x}` to the output with no `1/(M N)` factor, so
//! spectrum amplitudes read directly as meters.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use super::grid::{grid_len, try_filled, Complex64, FrequencyField, SpatialField};
use crate::error::{OceanError, OceanResult};

/// Reusable inverse plan for one `M × N` grid
#[derive(Clone)]
pub struct InverseTransform {
    rows: usize,
    cols: usize,
    half: usize,
    column_fft: Arc<dyn Fft<f64>>,
    row_fft: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for InverseTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InverseTransform")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

impl InverseTransform {
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            rows,
            cols,
            half: cols / 2 + 1,
            column_fft: planner.plan_fft_inverse(rows),
            row_fft: planner.plan_fft_inverse(cols),
        }
    }

    /// Transform a `rows × (cols/2 + 1)` half spectrum into `rows × cols` real samples.
    ///
    /// Columns `j > cols/2` are implied as `conj(F[-i][-j])`.
    pub fn process(&self, field: &FrequencyField) -> OceanResult<SpatialField> {
        if field.rows() != self.rows || field.cols() != self.half {
            return Err(OceanError::Shape {
                rows: self.rows,
                cols: self.half,
                found_rows: field.rows(),
                found_cols: field.cols(),
            });
        }
        let rows = self.rows;
        let cols = self.cols;

        // Pass 1: inverse along X, one stored column at a time (column-major scratch)
        let mut columns = try_filled(grid_len(self.half, rows)?, Complex64::new(0.0, 0.0))?;
        columns
            .par_chunks_mut(rows)
            .enumerate()
            .for_each(|(j, column)| {
                for (i, value) in column.iter_mut().enumerate() {
                    *value = field.get(i, j);
                }
                self.column_fft.process(column);
            });

        // Pass 2: rebuild each full row from the half spectrum, inverse along Z
        let mut out = SpatialField::zeros(rows, cols)?;
        out.as_mut_slice()
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(x, row)| {
                let mut buffer: Vec<Complex64> = (0..cols)
                    .map(|j| {
                        if j < self.half {
                            columns[j * rows + x]
                        } else {
                            columns[(cols - j) * rows + x].conj()
                        }
                    })
                    .collect();
                self.row_fft.process(&mut buffer);
                for (sample, value) in row.iter_mut().zip(&buffer) {
                    *sample = value.re;
                }
            });
        Ok(out)
    }
}
