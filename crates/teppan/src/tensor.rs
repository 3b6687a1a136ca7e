//! # Input tensors
//!
//! The mounted model consumes a single-channel `height × width` grid of values
//! normalized into `[0, 1]`. [`InputTensor`] is the only way to hand data to
//! the dispatcher and it is always built against a [`ModelShape`], so a
//! tensor either has the right number of values or fails to construct.
//! Row-major storage keeps the flattened form cheap for backends that want a
//! contiguous slice.

use serde::Serialize;
use crate::error::ShapeError;

/// Dimensions fixed when the model is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ModelShape {
    /// Input width `W`
    pub width: usize,
    /// Input height `H`
    pub height: usize,
    /// Number of output classes `C`
    pub classes: usize,
}

impl ModelShape {
    pub fn new(width: usize, height: usize, classes: usize) -> Self {
        Self { width, height, classes }
    }

    /// Number of scalar values an input tensor carries.
    pub fn input_len(&self) -> usize {
        self.width * self.height
    }
}

/// A normalized `height × width` input, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl InputTensor {
    /// Builds a tensor from a flattened, row-major slice of `W*H` values.
    ///
    /// Values are clamped into `[0, 1]`; NaN becomes `0`.
    ///
    /// # Errors
    ///
    /// [`ShapeError::FlatLength`] when `values.len() != W*H`.
    pub fn from_flat(shape: &ModelShape, values: &[f32]) -> Result<Self, ShapeError> {
        if values.len() != shape.input_len() {
            return Err(ShapeError::FlatLength { expected: shape.input_len(), got: values.len() });
        }
        Ok(Self {
            width: shape.width,
            height: shape.height,
            values: values.iter().copied().map(clamp_unit).collect(),
        })
    }

    /// Builds a tensor from `H` rows of `W` values each, clamping as
    /// [`from_flat`](Self::from_flat) does.
    ///
    /// # Errors
    ///
    /// [`ShapeError::RowCount`] for the wrong number of rows,
    /// [`ShapeError::RowWidth`] for the first ragged row.
    pub fn from_rows(shape: &ModelShape, rows: &[Vec<f32>]) -> Result<Self, ShapeError> {
        if rows.len() != shape.height {
            return Err(ShapeError::RowCount {
                width: shape.width,
                height: shape.height,
                got_height: rows.len(),
            });
        }
        let mut values = Vec::with_capacity(shape.input_len());
        for (row, data) in rows.iter().enumerate() {
            if data.len() != shape.width {
                return Err(ShapeError::RowWidth { row, width: shape.width, got: data.len() });
            }
            values.extend(data.iter().copied().map(clamp_unit));
        }
        Ok(Self { width: shape.width, height: shape.height, values })
    }

    /// An all-zero tensor, used for warm-up.
    pub fn zeros(shape: &ModelShape) -> Self {
        Self {
            width: shape.width,
            height: shape.height,
            values: vec![0.0; shape.input_len()],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major values.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Iterates the rows of the grid.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.values.chunks(self.width.max(1))
    }

    /// Checks this tensor against the mounted model's input dimensions.
    pub fn check(&self, shape: &ModelShape) -> Result<(), ShapeError> {
        if self.width == shape.width && self.height == shape.height {
            Ok(())
        } else {
            Err(ShapeError::Mismatch {
                width: shape.width,
                height: shape.height,
                got_width: self.width,
                got_height: self.height,
            })
        }
    }
}

#[inline]
fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}
