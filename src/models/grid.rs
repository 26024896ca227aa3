//! Dense index-addressed grids.
//!
//! Placement state is keyed by (application, node) and (application, node,
//! node|resource) tuples. All ids are compact `usize` indices assigned once
//! per scenario, so the maps are stored as flat row-major vectors.

use serde::{Deserialize, Serialize};

/// Two-dimensional dense array, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid2<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

/// Three-dimensional dense array, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid3<T> {
    dims: (usize, usize, usize),
    data: Vec<T>,
}

impl<T: Clone> Grid2<T> {
    /// Creates a grid filled with `value`.
    pub fn new(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Resets every cell to `value`.
    pub fn fill(&mut self, value: T) {
        for cell in &mut self.data {
            *cell = value.clone();
        }
    }
}

impl<T> Grid2<T> {
    /// Builds a grid by evaluating `f(row, col)` for every cell.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    fn offset(&self, r: usize, c: usize) -> usize {
        assert!(r < self.rows && c < self.cols, "grid index ({r}, {c}) out of bounds");
        r * self.cols + c
    }

    /// Returns a reference to cell `(r, c)`.
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> &T {
        &self.data[self.offset(r, c)]
    }

    /// Returns a mutable reference to cell `(r, c)`.
    #[inline]
    pub fn get_mut(&mut self, r: usize, c: usize) -> &mut T {
        let idx = self.offset(r, c);
        &mut self.data[idx]
    }

    /// Overwrites cell `(r, c)`.
    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: T) {
        *self.get_mut(r, c) = value;
    }

    /// Returns row `r` as a slice.
    pub fn row(&self, r: usize) -> &[T] {
        assert!(r < self.rows, "grid row {r} out of bounds");
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// All cells in row-major order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: Copy> Grid2<T> {
    /// Copy of cell `(r, c)`.
    #[inline]
    pub fn at(&self, r: usize, c: usize) -> T {
        *self.get(r, c)
    }
}

impl<T: Clone> Grid3<T> {
    /// Creates a grid filled with `value`.
    pub fn new(d0: usize, d1: usize, d2: usize, value: T) -> Self {
        Self {
            dims: (d0, d1, d2),
            data: vec![value; d0 * d1 * d2],
        }
    }
}

impl<T> Grid3<T> {
    /// Builds a grid by evaluating `f(i, j, k)` for every cell.
    pub fn from_fn(
        d0: usize,
        d1: usize,
        d2: usize,
        mut f: impl FnMut(usize, usize, usize) -> T,
    ) -> Self {
        let mut data = Vec::with_capacity(d0 * d1 * d2);
        for i in 0..d0 {
            for j in 0..d1 {
                for k in 0..d2 {
                    data.push(f(i, j, k));
                }
            }
        }
        Self {
            dims: (d0, d1, d2),
            data,
        }
    }

    /// Grid dimensions.
    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    #[inline]
    fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        let (d0, d1, d2) = self.dims;
        assert!(
            i < d0 && j < d1 && k < d2,
            "grid index ({i}, {j}, {k}) out of bounds"
        );
        (i * d1 + j) * d2 + k
    }

    /// Returns a reference to cell `(i, j, k)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> &T {
        &self.data[self.offset(i, j, k)]
    }

    /// Returns a mutable reference to cell `(i, j, k)`.
    #[inline]
    pub fn get_mut(&mut self, i: usize, j: usize, k: usize) -> &mut T {
        let idx = self.offset(i, j, k);
        &mut self.data[idx]
    }

    /// Overwrites cell `(i, j, k)`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: T) {
        *self.get_mut(i, j, k) = value;
    }

    /// Innermost slice at `(i, j)`.
    pub fn lane(&self, i: usize, j: usize) -> &[T] {
        let start = self.offset(i, j, 0);
        &self.data[start..start + self.dims.2]
    }

    /// Mutable innermost slice at `(i, j)`.
    pub fn lane_mut(&mut self, i: usize, j: usize) -> &mut [T] {
        let start = self.offset(i, j, 0);
        let len = self.dims.2;
        &mut self.data[start..start + len]
    }
}

impl<T: Copy> Grid3<T> {
    /// Copy of cell `(i, j, k)`.
    #[inline]
    pub fn at(&self, i: usize, j: usize, k: usize) -> T {
        *self.get(i, j, k)
    }
}
