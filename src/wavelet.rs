// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::f32::consts::PI;

/// Ricker wavelet of `nt` samples, peak `amp` at `t = 1 / fm`.
pub fn ricker_wavelet(nt: usize, fm: f32, dt: f32, amp: f32) -> Vec<f32> {
    (0..nt)
        .map(|it| {
            let arg = PI * fm * (it as f32 * dt - 1.0 / fm);
            let arg = arg * arg;
            amp * (1.0 - 2.0 * arg) * (-arg).exp()
        })
        .collect()
}
