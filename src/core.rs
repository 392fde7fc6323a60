// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::ops::{Index, IndexMut};

use crate::error::{ModelingError, Result};

/// Shape and index conversion for 2D depth-fast grids.
///
/// Index `[ix, iz]` is lateral first, depth second. The flat layout is
/// `ix * nz + iz`, so a single lateral position owns a contiguous column.
pub trait GridData {
    /// Get the grid shape `[nx, nz]`.
    fn shape(&self) -> [usize; 2];

    /// Get the total number of cells in the grid.
    fn num_nodes(&self) -> usize {
        let [nx, nz] = self.shape();
        nx * nz
    }

    /// Convert `[ix, iz]` to a flat index.
    fn nd_to_flat(&self, idx: [usize; 2]) -> usize {
        idx[0] * self.shape()[1] + idx[1]
    }

    /// Whether `[ix, iz]` lies inside the grid.
    fn contains(&self, idx: [usize; 2]) -> bool {
        let [nx, nz] = self.shape();
        idx[0] < nx && idx[1] < nz
    }
}

/// A 2D scalar field that owns its buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    nx: usize,
    nz: usize,
    data: Vec<f32>,
}

impl Grid {
    /// Create a zero-filled `nx x nz` grid.
    pub fn zeros(nx: usize, nz: usize) -> Self {
        Grid {
            nx,
            nz,
            data: vec![0.0; nx * nz],
        }
    }

    /// Create a grid filled with a constant value.
    pub fn filled(nx: usize, nz: usize, value: f32) -> Self {
        Grid {
            nx,
            nz,
            data: vec![value; nx * nz],
        }
    }

    /// Wrap an existing depth-fast buffer.
    ///
    /// # Errors
    /// Returns an error if `data.len() != nx * nz`.
    pub fn from_vec(nx: usize, nz: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != nx * nz {
            return Err(ModelingError::ShapeMismatch {
                expected: vec![nx, nz],
                got: vec![data.len()],
            });
        }
        Ok(Grid { nx, nz, data })
    }

    /// Number of lateral samples.
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Number of depth samples.
    pub fn nz(&self) -> usize {
        self.nz
    }

    /// Bounds-checked read.
    pub fn get(&self, ix: usize, iz: usize) -> Option<f32> {
        let idx = [ix, iz];
        self.contains(idx).then(|| self.data[self.nd_to_flat(idx)])
    }

    /// Reshape to `nx x nz` and zero every cell.
    pub fn resize(&mut self, nx: usize, nz: usize) {
        self.nx = nx;
        self.nz = nz;
        self.data.clear();
        self.data.resize(nx * nz, 0.0);
    }

    /// Set every cell to `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// The depth column at lateral index `ix`.
    pub fn column(&self, ix: usize) -> &[f32] {
        &self.data[ix * self.nz..(ix + 1) * self.nz]
    }

    /// Flat depth-fast view of the buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable flat depth-fast view of the buffer.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl GridData for Grid {
    fn shape(&self) -> [usize; 2] {
        [self.nx, self.nz]
    }
}

impl Index<[usize; 2]> for Grid {
    type Output = f32;

    fn index(&self, idx: [usize; 2]) -> &f32 {
        assert!(
            self.contains(idx),
            "index {:?} out of bounds for grid {}x{}",
            idx,
            self.nx,
            self.nz
        );
        &self.data[self.nd_to_flat(idx)]
    }
}

impl IndexMut<[usize; 2]> for Grid {
    fn index_mut(&mut self, idx: [usize; 2]) -> &mut f32 {
        assert!(
            self.contains(idx),
            "index {:?} out of bounds for grid {}x{}",
            idx,
            self.nx,
            self.nz
        );
        let flat = self.nd_to_flat(idx);
        &mut self.data[flat]
    }
}

/// Subsurface velocity model in m/s (or its transformed form, see
/// [`VelocityModel::transform`]).
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityModel {
    grid: Grid,
}

impl VelocityModel {
    /// Create a velocity model from depth-fast samples.
    ///
    /// # Errors
    /// Returns an error if a dimension is zero, the buffer length does not
    /// match, or any value is not positive and finite.
    pub fn new(nx: usize, nz: usize, data: Vec<f32>) -> Result<Self> {
        for (axis, &size) in [nx, nz].iter().enumerate() {
            if size == 0 {
                return Err(ModelingError::InvalidGridShape { axis, size });
            }
        }
        let grid = Grid::from_vec(nx, nz, data)?;
        for (index, &value) in grid.as_slice().iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(ModelingError::InvalidVelocity { index, value });
            }
        }
        Ok(VelocityModel { grid })
    }

    /// Create a homogeneous model.
    ///
    /// # Errors
    /// Returns an error if `velocity` is not positive and finite.
    pub fn uniform(nx: usize, nz: usize, velocity: f32) -> Result<Self> {
        Self::new(nx, nz, vec![velocity; nx * nz])
    }

    /// Number of lateral samples.
    pub fn nx(&self) -> usize {
        self.grid.nx()
    }

    /// Number of depth samples.
    pub fn nz(&self) -> usize {
        self.grid.nz()
    }

    /// Velocity at `[ix, iz]`. Panics when out of bounds.
    pub fn at(&self, ix: usize, iz: usize) -> f32 {
        self.grid[[ix, iz]]
    }

    /// Flat depth-fast samples.
    pub fn as_slice(&self) -> &[f32] {
        self.grid.as_slice()
    }

    /// Underlying grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Reshape to `nx x nz` with every value zeroed.
    ///
    /// The result is a write target: it does not satisfy the positivity
    /// invariant until the caller fills it.
    pub fn resize(&mut self, nx: usize, nz: usize) {
        self.grid.resize(nx, nz);
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f32] {
        self.grid.as_mut_slice()
    }

    /// Minimum value of the model.
    pub fn min(&self) -> f32 {
        self.as_slice().iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Maximum value of the model.
    pub fn max(&self) -> f32 {
        self.as_slice()
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Pad `nb` cells on all four sides, replicating the nearest edge value.
    pub fn expand(&self, nb: usize) -> VelocityModel {
        let (nx, nz) = (self.nx(), self.nz());
        let (ex, ez) = (nx + 2 * nb, nz + 2 * nb);
        let mut out = Grid::zeros(ex, ez);
        for ix in 0..ex {
            let sx = ix.saturating_sub(nb).min(nx - 1);
            let src = self.grid.column(sx);
            for iz in 0..ez {
                let sz = iz.saturating_sub(nb).min(nz - 1);
                out[[ix, iz]] = src[sz];
            }
        }
        VelocityModel { grid: out }
    }

    /// Replace each velocity `v` by `(dx / (v * dt))^2`.
    ///
    /// The stencil consumes `1 / vtrans = (v * dt / dx)^2`, the squared
    /// Courant number of the cell.
    pub fn transform(&mut self, dx: f32, dt: f32) {
        for v in self.grid.as_mut_slice() {
            let c = dx / (*v * dt);
            *v = c * c;
        }
    }

    /// Inverse of [`VelocityModel::transform`].
    pub fn untransform(&mut self, dx: f32, dt: f32) {
        for v in self.grid.as_mut_slice() {
            *v = dx / (v.sqrt() * dt);
        }
    }
}

impl GridData for VelocityModel {
    fn shape(&self) -> [usize; 2] {
        self.grid.shape()
    }
}
