// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::core::{Grid, GridData};

/// Damping applied at the outermost sponge cell.
pub const MAX_DELTA: f32 = 0.05;

/// Sponge damping coefficient of cell `(ix, iz)`.
///
/// The normalized distance into the sponge is evaluated edge by edge in the
/// order top, left, right, bottom, each later check overwriting the earlier
/// one, so corners take the value of the last matching edge. With
/// `free_surface` the top edge is never checked. Returns
/// `MAX_DELTA * dist^2`.
pub fn damping_coefficient(
    ix: usize,
    iz: usize,
    nx: usize,
    nz: usize,
    nb: usize,
    free_surface: bool,
) -> f32 {
    if nb == 0 {
        return 0.0;
    }
    let b = nb as f32;
    let mut dist = 0.0f32;
    if !free_surface && iz < nb {
        dist = (nb - iz) as f32 / b;
    }
    if ix < nb {
        dist = (nb - ix) as f32 / b;
    }
    if ix + nb >= nx {
        dist = (ix + nb + 1 - nx) as f32 / b;
    }
    if iz + nb >= nz {
        dist = (iz + nb + 1 - nz) as f32 / b;
    }
    MAX_DELTA * dist * dist
}

/// Cached per-cell damping coefficients for one grid geometry.
#[derive(Debug, Clone)]
pub struct DampingField {
    nb: usize,
    free_surface: bool,
    delta: Grid,
}

impl DampingField {
    /// Compute the damping of every cell of an `nx x nz` grid.
    pub fn new(nx: usize, nz: usize, nb: usize, free_surface: bool) -> Self {
        let mut delta = Grid::zeros(nx, nz);
        for ix in 0..nx {
            for iz in 0..nz {
                delta[[ix, iz]] = damping_coefficient(ix, iz, nx, nz, nb, free_surface);
            }
        }
        DampingField {
            nb,
            free_surface,
            delta,
        }
    }

    /// Sponge thickness in cells.
    pub fn thickness(&self) -> usize {
        self.nb
    }

    /// Whether the top edge is a free surface.
    pub fn free_surface(&self) -> bool {
        self.free_surface
    }

    /// Damping at `(ix, iz)`.
    pub fn at(&self, ix: usize, iz: usize) -> f32 {
        self.delta[[ix, iz]]
    }

    /// Depth column of damping values at lateral index `ix`.
    pub fn column(&self, ix: usize) -> &[f32] {
        self.delta.column(ix)
    }

    /// True when no cell is damped.
    pub fn is_undamped(&self) -> bool {
        self.delta.as_slice().iter().all(|&d| d == 0.0)
    }
}

impl GridData for DampingField {
    fn shape(&self) -> [usize; 2] {
        self.delta.shape()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NX: usize = 60;
    const NZ: usize = 50;
    const NB: usize = 10;

    #[test]
    fn interior_is_undamped() {
        for ix in NB..NX - NB {
            for iz in NB..NZ - NB {
                assert_eq!(damping_coefficient(ix, iz, NX, NZ, NB, false), 0.0);
            }
        }
    }

    #[test]
    fn outermost_cell_reaches_max_delta() {
        let mid_z = NZ / 2;
        let mid_x = NX / 2;
        assert_eq!(damping_coefficient(0, mid_z, NX, NZ, NB, false), MAX_DELTA);
        assert_eq!(damping_coefficient(NX - 1, mid_z, NX, NZ, NB, false), MAX_DELTA);
        assert_eq!(damping_coefficient(mid_x, NZ - 1, NX, NZ, NB, false), MAX_DELTA);
        assert_eq!(damping_coefficient(mid_x, 0, NX, NZ, NB, false), MAX_DELTA);
    }

    #[test]
    fn monotone_into_each_sponge() {
        let mid_z = NZ / 2;
        let mid_x = NX / 2;
        // Walking from the interior toward each edge never decreases delta.
        let left: Vec<f32> = (0..=NB)
            .rev()
            .map(|ix| damping_coefficient(ix, mid_z, NX, NZ, NB, false))
            .collect();
        let right: Vec<f32> = (NX - NB - 1..NX)
            .map(|ix| damping_coefficient(ix, mid_z, NX, NZ, NB, false))
            .collect();
        let bottom: Vec<f32> = (NZ - NB - 1..NZ)
            .map(|iz| damping_coefficient(mid_x, iz, NX, NZ, NB, false))
            .collect();
        let top: Vec<f32> = (0..=NB)
            .rev()
            .map(|iz| damping_coefficient(mid_x, iz, NX, NZ, NB, false))
            .collect();
        for profile in [left, right, bottom, top] {
            assert_eq!(profile[0], 0.0);
            for w in profile.windows(2) {
                assert!(w[1] >= w[0], "profile not monotone: {:?}", profile);
            }
        }
    }

    #[test]
    fn free_surface_top_is_never_damped() {
        let mid_x = NX / 2;
        for iz in 0..NZ - NB {
            assert_eq!(damping_coefficient(mid_x, iz, NX, NZ, NB, true), 0.0);
        }
        // Bottom and sides still absorb.
        assert_eq!(damping_coefficient(mid_x, NZ - 1, NX, NZ, NB, true), MAX_DELTA);
        assert_eq!(damping_coefficient(0, NZ / 2, NX, NZ, NB, true), MAX_DELTA);
    }

    #[test]
    fn zero_thickness_disables_damping() {
        let field = DampingField::new(20, 20, 0, false);
        assert!(field.is_undamped());
    }

    /// Characterization of corner cells: the check order is top, left,
    /// right, bottom and the last matching edge wins. Kept exactly as
    /// inherited rather than taking the maximum over edges.
    #[test]
    fn corner_check_order_characterization() {
        let d = |dist: f32| MAX_DELTA * dist * dist;
        let b = NB as f32;
        // Top-left: left overwrites top. ix=3 -> 7/10, iz=1 -> 9/10.
        assert_eq!(damping_coefficient(3, 1, NX, NZ, NB, false), d(7.0 / b));
        // Top-right: right overwrites top. ix=NX-2 -> 9/10, iz=5 -> 5/10.
        assert_eq!(damping_coefficient(NX - 2, 5, NX, NZ, NB, false), d(9.0 / b));
        // Bottom-left: bottom overwrites left. ix=0 -> 1, iz=NZ-3 -> 8/10.
        assert_eq!(damping_coefficient(0, NZ - 3, NX, NZ, NB, false), d(8.0 / b));
        // Bottom-right: bottom overwrites right.
        assert_eq!(
            damping_coefficient(NX - 1, NZ - 10, NX, NZ, NB, false),
            d(1.0 / b)
        );
    }

    #[test]
    fn cached_field_matches_function() {
        let field = DampingField::new(NX, NZ, NB, true);
        for ix in 0..NX {
            for iz in 0..NZ {
                assert_eq!(field.at(ix, iz), damping_coefficient(ix, iz, NX, NZ, NB, true));
            }
        }
        assert!(!field.is_undamped());
        assert_eq!(field.thickness(), NB);
    }
}
