// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use rayon::prelude::*;

use crate::core::{Grid, GridData, VelocityModel};
use crate::damping::DampingField;

/// Optimized 10th-order coefficients (Zhang Jinhai's scheme).
///
/// `A[0]` weighs the centre (times -4), `A[k]` the four neighbours `k`
/// cells away along each axis.
pub const COEFFICIENTS: [f32; 6] = [
    1.534_007_96,
    1.788_587_21,
    -0.316_607_56,
    0.076_121_73,
    -0.016_260_42,
    0.002_167_36,
];

/// Half-width of the spatial stencil. The derivative pass covers cells at
/// least this far from every edge.
pub const HALO: usize = 5;

/// Margin of the time-update pass. It reads the derivative field at direct
/// neighbours, so it needs one cell more than [`HALO`].
pub const UPDATE_MARGIN: usize = HALO + 1;

/// 10th-order-in-space, 2nd-order-in-time acoustic stencil with a sponge.
///
/// Velocity must be in transformed form ([`VelocityModel::transform`]).
/// Cells outside the derivative and update ranges keep their previous
/// contents. No stability check is performed.
#[derive(Debug, Clone)]
pub struct Stencil {
    nx: usize,
    nz: usize,
    damping: DampingField,
}

/// How the leapfrog recurrence treats the sponge.
#[derive(Clone, Copy)]
enum Recurrence<'a> {
    Damped(&'a DampingField),
    Undamped,
}

impl Stencil {
    /// Build a stencil for an `nx x nz` padded grid with an `nb`-cell sponge.
    pub fn new(nx: usize, nz: usize, nb: usize, free_surface: bool) -> Self {
        Stencil {
            nx,
            nz,
            damping: DampingField::new(nx, nz, nb, free_surface),
        }
    }

    /// The cached sponge damping.
    pub fn damping(&self) -> &DampingField {
        &self.damping
    }

    fn check_shape(&self, grid: &impl GridData, what: &str) {
        assert_eq!(
            grid.shape(),
            [self.nx, self.nz],
            "{} shape does not match the stencil grid",
            what
        );
    }

    /// Spatial derivative pass: fill `u2` with the weighted 11-point-per-axis
    /// sum of `curr` for every cell at least [`HALO`] cells from each edge.
    pub fn laplacian(&self, curr: &Grid, u2: &mut Grid) {
        self.check_shape(curr, "current wavefield");
        self.check_shape(u2, "derivative buffer");
        let (nx, nz) = (self.nx, self.nz);
        let curr = curr.as_slice();
        let x_range = HALO..nx.saturating_sub(HALO);
        let z_range = HALO..nz.saturating_sub(HALO);

        u2.as_mut_slice()
            .par_chunks_mut(nz)
            .enumerate()
            .filter(|(ix, _)| x_range.contains(ix))
            .for_each(|(ix, col)| {
                for iz in z_range.clone() {
                    let pos = ix * nz + iz;
                    let mut sum = -4.0 * COEFFICIENTS[0] * curr[pos];
                    for (k, &a) in COEFFICIENTS.iter().enumerate().skip(1) {
                        sum += a
                            * (curr[pos - k]
                                + curr[pos + k]
                                + curr[pos - k * nz]
                                + curr[pos + k * nz]);
                    }
                    col[iz] = sum;
                }
            });
    }

    /// Advance one time step in place with sponge damping.
    ///
    /// On entry `prev` holds the previous time level; on return it holds the
    /// next one for every cell in the update range.
    pub fn step(&self, prev: &mut Grid, curr: &Grid, vel: &VelocityModel, u2: &mut Grid) {
        self.laplacian(curr, u2);
        self.update_in_place(prev, curr, vel, u2, Recurrence::Damped(&self.damping));
    }

    /// Advance one time step in place without any damping.
    pub fn step_undamped(&self, prev: &mut Grid, curr: &Grid, vel: &VelocityModel, u2: &mut Grid) {
        self.laplacian(curr, u2);
        self.update_in_place(prev, curr, vel, u2, Recurrence::Undamped);
    }

    /// Three-buffer damped step: write the next level into `next`, leaving
    /// `prev` and `curr` untouched.
    ///
    /// Cells of `next` outside the update range are copied from `prev`, so
    /// the result matches [`Stencil::step`] everywhere.
    pub fn step_into(
        &self,
        next: &mut Grid,
        prev: &Grid,
        curr: &Grid,
        vel: &VelocityModel,
        u2: &mut Grid,
    ) {
        self.check_shape(next, "next wavefield");
        self.check_shape(prev, "previous wavefield");
        next.as_mut_slice().copy_from_slice(prev.as_slice());
        self.step(next, curr, vel, u2);
    }

    fn update_in_place(
        &self,
        prev: &mut Grid,
        curr: &Grid,
        vel: &VelocityModel,
        u2: &Grid,
        recurrence: Recurrence<'_>,
    ) {
        self.check_shape(prev, "previous wavefield");
        self.check_shape(curr, "current wavefield");
        self.check_shape(vel, "velocity");
        let (nx, nz) = (self.nx, self.nz);
        let curr = curr.as_slice();
        let vel = vel.as_slice();
        let u2 = u2.as_slice();
        let x_range = UPDATE_MARGIN..nx.saturating_sub(UPDATE_MARGIN);
        let z_range = UPDATE_MARGIN..nz.saturating_sub(UPDATE_MARGIN);

        prev.as_mut_slice()
            .par_chunks_mut(nz)
            .enumerate()
            .filter(|(ix, _)| x_range.contains(ix))
            .for_each(|(ix, col)| {
                for iz in z_range.clone() {
                    let pos = ix * nz + iz;
                    let inv_v = 1.0 / vel[pos];
                    let leapfrog = match recurrence {
                        Recurrence::Damped(damping) => {
                            let delta = damping.column(ix)[iz];
                            (2.0 - 2.0 * delta + delta * delta) * curr[pos]
                                - (1.0 - 2.0 * delta) * col[iz]
                        }
                        Recurrence::Undamped => 2.0 * curr[pos] - col[iz],
                    };
                    col[iz] = leapfrog
                        + inv_v * u2[pos]
                        + 1.0 / 12.0
                            * inv_v
                            * inv_v
                            * (u2[pos - 1] + u2[pos + 1] + u2[pos - nz] + u2[pos + nz]
                                - 4.0 * u2[pos]);
                }
            });
    }
}
