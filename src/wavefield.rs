// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::core::Grid;
use crate::geometry::ShotPosition;

/// The two pressure levels of the leapfrog scheme for one shot.
///
/// `current` is the leading level, `previous` the one before it. A step
/// overwrites `previous` with the next level and then [`WavefieldPair::swap`]
/// hands the buffers over, so neither is ever aliased.
#[derive(Debug, Clone)]
pub struct WavefieldPair {
    /// Leading time level.
    pub current: Grid,
    /// Trailing time level.
    pub previous: Grid,
}

impl WavefieldPair {
    /// Two zeroed `nx x nz` levels.
    pub fn new(nx: usize, nz: usize) -> Self {
        WavefieldPair {
            current: Grid::zeros(nx, nz),
            previous: Grid::zeros(nx, nz),
        }
    }

    /// Zero both levels.
    pub fn reset(&mut self) {
        self.current.fill(0.0);
        self.previous.fill(0.0);
    }

    /// Exchange the roles of the two levels.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
    }
}

/// Add `amplitude` at every point of `positions`.
pub fn inject(field: &mut Grid, positions: &ShotPosition, amplitude: f32) {
    let data = field.as_mut_slice();
    for idx in positions.indices() {
        data[idx] += amplitude;
    }
}

/// Read the field at every point of `positions` into `row`.
pub fn sample(field: &Grid, positions: &ShotPosition, row: &mut [f32]) {
    let data = field.as_slice();
    for (out, idx) in row.iter_mut().zip(positions.indices()) {
        *out = data[idx];
    }
}
