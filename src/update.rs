// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::core::{GridData, VelocityModel};
use crate::error::{ModelingError, Result};

/// Bounded gradient step on a velocity model, for an outer inversion loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityUpdater {
    vmin: f32,
    vmax: f32,
    dx: f32,
    dt: f32,
}

impl VelocityUpdater {
    /// Create an updater clamping to `[vmin, vmax]`. `dx` and `dt` are the
    /// spacing and time step used by [`VelocityUpdater::update_transformed`].
    ///
    /// # Errors
    /// Returns an error unless `0 < vmin <= vmax` and `dx`, `dt` are
    /// positive and finite.
    pub fn new(vmin: f32, vmax: f32, dx: f32, dt: f32) -> Result<Self> {
        if !(vmin.is_finite() && vmax.is_finite() && vmin > 0.0 && vmin <= vmax) {
            return Err(ModelingError::InvalidParameter {
                name: "vmin/vmax",
                reason: format!("need 0 < vmin <= vmax, got [{}, {}]", vmin, vmax),
            });
        }
        for (name, value) in [("dx", dx), ("dt", dt)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ModelingError::InvalidParameter {
                    name,
                    reason: format!("{} (must be positive and finite)", value),
                });
            }
        }
        Ok(VelocityUpdater { vmin, vmax, dx, dt })
    }

    /// Lower velocity bound.
    pub fn vmin(&self) -> f32 {
        self.vmin
    }

    /// Upper velocity bound.
    pub fn vmax(&self) -> f32 {
        self.vmax
    }

    /// Write `clamp(vel - steplen * grad, vmin, vmax)` into `new_vel`.
    ///
    /// `new_vel` is reshaped to match `vel`; `vel` is not modified.
    ///
    /// # Errors
    /// Returns an error if `grad` does not have one value per cell.
    pub fn update(
        &self,
        new_vel: &mut VelocityModel,
        vel: &VelocityModel,
        grad: &[f32],
        steplen: f32,
    ) -> Result<()> {
        self.check_gradient(vel, grad)?;
        new_vel.resize(vel.nx(), vel.nz());
        for ((out, &v), &g) in new_vel
            .as_mut_slice()
            .iter_mut()
            .zip(vel.as_slice())
            .zip(grad)
        {
            *out = (v - steplen * g).clamp(self.vmin, self.vmax);
        }
        Ok(())
    }

    /// Same as [`VelocityUpdater::update`] for models held in transformed
    /// form: the step and clamp apply to physical velocity, and the result
    /// is transformed back.
    ///
    /// # Errors
    /// Returns an error if `grad` does not have one value per cell.
    pub fn update_transformed(
        &self,
        new_vel: &mut VelocityModel,
        vel: &VelocityModel,
        grad: &[f32],
        steplen: f32,
    ) -> Result<()> {
        let mut physical = vel.clone();
        physical.untransform(self.dx, self.dt);
        self.update(new_vel, &physical, grad, steplen)?;
        new_vel.transform(self.dx, self.dt);
        Ok(())
    }

    fn check_gradient(&self, vel: &VelocityModel, grad: &[f32]) -> Result<()> {
        if grad.len() != vel.num_nodes() {
            return Err(ModelingError::ShapeMismatch {
                expected: vel.shape().to_vec(),
                got: vec![grad.len()],
            });
        }
        Ok(())
    }
}
