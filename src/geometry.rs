// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{ModelingError, Result};

/// A regularly spaced line of source or receiver positions on a grid.
///
/// Point `i` sits at `z = begin_z + i * step_z`, `x = begin_x + i * step_x`,
/// and its flat index is `x * grid_nz + z`. Clipping yields another small
/// descriptor over the same line, never a copy of the point list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotPosition {
    begin_z: usize,
    begin_x: usize,
    step_z: usize,
    step_x: usize,
    count: usize,
    grid_nz: usize,
}

impl ShotPosition {
    /// Describe `count` points starting at `(begin_x, begin_z)` with the
    /// given steps, on a grid with `grid_nz` depth samples.
    pub fn new(
        begin_z: usize,
        begin_x: usize,
        step_z: usize,
        step_x: usize,
        count: usize,
        grid_nz: usize,
    ) -> Self {
        ShotPosition {
            begin_z,
            begin_x,
            step_z,
            step_x,
            count,
            grid_nz,
        }
    }

    /// Number of points on the line.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the line has no points.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Depth index of point `i`.
    pub fn z(&self, i: usize) -> usize {
        self.begin_z + i * self.step_z
    }

    /// Lateral index of point `i`.
    pub fn x(&self, i: usize) -> usize {
        self.begin_x + i * self.step_x
    }

    /// Flat grid index of point `i`.
    pub fn flat_index(&self, i: usize) -> usize {
        self.x(i) * self.grid_nz + self.z(i)
    }

    /// Flat grid indices of every point on the line.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.count).map(move |i| self.flat_index(i))
    }

    /// Check that every point lies inside `[0, nx) x [0, nz)`.
    ///
    /// `what` names the line in the error ("sources" or "receivers").
    ///
    /// # Errors
    /// Returns [`ModelingError::GeometryOutOfBounds`] naming the last point.
    pub fn validate(&self, what: &'static str, nx: usize, nz: usize) -> Result<()> {
        if self.count == 0 {
            return Ok(());
        }
        let last = self.count - 1;
        let x = checked_position(self.begin_x, self.step_x, last);
        let z = checked_position(self.begin_z, self.step_z, last);
        match (x, z) {
            (Some(x), Some(z)) if x < nx && z < nz && self.grid_nz == nz => Ok(()),
            _ => Err(ModelingError::GeometryOutOfBounds {
                what,
                last: (to_coordinate(x), to_coordinate(z)),
                extent: (nx, nz),
            }),
        }
    }

    /// The contiguous sub-line of points `first..=last`.
    ///
    /// # Errors
    /// Returns an error if the range is reversed or extends past the line.
    pub fn clip_range(&self, first: usize, last: usize) -> Result<ShotPosition> {
        if first > last || last >= self.count {
            return Err(ModelingError::InvalidParameter {
                name: "clip_range",
                reason: format!(
                    "range {}..={} is not inside a line of {} points",
                    first, last, self.count
                ),
            });
        }
        Ok(ShotPosition {
            begin_z: self.z(first),
            begin_x: self.x(first),
            count: last - first + 1,
            ..*self
        })
    }

    /// Map the line into a domain padded by `nb` cells on every side.
    pub fn shifted(&self, nb: usize, padded_nz: usize) -> ShotPosition {
        ShotPosition {
            begin_z: self.begin_z + nb,
            begin_x: self.begin_x + nb,
            grid_nz: padded_nz,
            ..*self
        }
    }
}

/// `begin + i * step`, or `None` when it does not fit in `usize`.
fn checked_position(begin: usize, step: usize, i: usize) -> Option<usize> {
    i.checked_mul(step)?.checked_add(begin)
}

/// Coordinate for error reports; overflowed positions show as `i64::MAX`.
fn to_coordinate(pos: Option<usize>) -> i64 {
    pos.and_then(|p| i64::try_from(p).ok()).unwrap_or(i64::MAX)
}
