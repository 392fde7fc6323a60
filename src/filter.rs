// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::f32::consts::PI;

use crate::error::{ModelingError, Result};

/// Number of poles per cutoff before the zero-phase halving.
pub const DEFAULT_POLES: usize = 6;

/// Cutoffs closer than this (in cycles per sample) to 0 or Nyquist are
/// treated as absent.
const EPS: f32 = 1e-4;

/// Pass direction of a Butterworth section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Pass frequencies below the cutoff.
    LowPass,
    /// Pass frequencies above the cutoff.
    HighPass,
}

/// Recursive Butterworth filter built from second-order sections, plus a
/// first-order section when the pole count is odd.
#[derive(Debug, Clone)]
pub struct Butterworth {
    kind: FilterKind,
    /// `(gain, feedback)` per second-order section.
    sections: Vec<(f32, f32)>,
    /// Shared middle feedback coefficient of the second-order sections.
    mid: f32,
    /// `(gain, feedback)` of the first-order section.
    first_order: Option<(f32, f32)>,
}

impl Butterworth {
    /// Design a filter with `poles` poles at `cutoff` cycles per sample.
    pub fn new(kind: FilterKind, cutoff: f32, poles: usize) -> Self {
        let poles = poles.max(1);
        let low = kind == FilterKind::LowPass;
        let arg = 2.0 * PI * cutoff;
        let (sinw, cosw) = arg.sin_cos();

        let first_order = (poles % 2 == 1).then(|| {
            if low {
                let fact = (1.0 + cosw) / sinw;
                (1.0 / (1.0 + fact), 1.0 - fact)
            } else {
                let fact = sinw / (1.0 + cosw);
                (1.0 / (1.0 + fact), fact - 1.0)
            }
        });

        let half = if low { (0.5 * arg).sin() } else { (0.5 * arg).cos() };
        let fact = half * half;
        let sections = (0..poles / 2)
            .map(|j| {
                let ss = (PI * (2 * j + 1) as f32 / (2 * poles) as f32).sin() * sinw;
                (fact / (1.0 + ss), (1.0 - ss) / fact)
            })
            .collect();

        Butterworth {
            kind,
            sections,
            mid: -2.0 * cosw / fact,
            first_order,
        }
    }

    /// Filter `trace` in place, forward in time.
    pub fn apply(&self, trace: &mut [f32]) {
        let low = self.kind == FilterKind::LowPass;
        if let Some((d0, d1)) = self.first_order {
            let (mut x0, mut y1) = (0.0f32, 0.0f32);
            for x in trace.iter_mut() {
                let x1 = x0;
                x0 = *x;
                let y0 = if low {
                    (x0 + x1 - d1 * y1) * d0
                } else {
                    (x0 - x1 - d1 * y1) * d0
                };
                *x = y0;
                y1 = y0;
            }
        }
        for &(d0, d1) in &self.sections {
            let d2 = self.mid;
            let (mut x0, mut x1, mut y1, mut y2) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
            for x in trace.iter_mut() {
                let x2 = x1;
                x1 = x0;
                x0 = *x;
                let y0 = if low {
                    (x0 + 2.0 * x1 + x2 - d2 * y1 - d1 * y2) * d0
                } else {
                    (x0 - 2.0 * x1 + x2 - d2 * y1 - d1 * y2) * d0
                };
                y2 = y1;
                *x = y0;
                y1 = y0;
            }
        }
    }
}

/// Cascaded low-cut / high-cut Butterworth bandpass.
#[derive(Debug, Clone)]
pub struct BandpassFilter {
    low_cut: Option<Butterworth>,
    high_cut: Option<Butterworth>,
    phase: bool,
}

impl BandpassFilter {
    /// Design a bandpass passing `[flo, fhi]` Hz for samples `dt` seconds
    /// apart.
    ///
    /// `phase = true` filters forward only (minimum phase); `false` runs each
    /// section forward and backward (zero phase) with half the poles.
    ///
    /// # Errors
    /// Returns an error unless `0 <= flo < fhi <= 1 / (2 dt)`.
    pub fn new(flo: f32, fhi: f32, dt: f32, phase: bool) -> Result<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ModelingError::InvalidParameter {
                name: "dt",
                reason: format!("{} (must be positive and finite)", dt),
            });
        }
        let nyquist = 0.5 / dt;
        if !(flo >= 0.0 && flo < fhi && fhi <= nyquist) {
            return Err(ModelingError::InvalidFilterBand { flo, fhi, nyquist });
        }
        let (lo, hi) = (flo * dt, fhi * dt);
        let poles = if phase {
            DEFAULT_POLES
        } else {
            (DEFAULT_POLES / 2).max(1)
        };
        log::debug!("flo={} fhi={} poles={}", lo, hi, poles);

        Ok(BandpassFilter {
            low_cut: (lo > EPS).then(|| Butterworth::new(FilterKind::HighPass, lo, poles)),
            high_cut: (hi < 0.5 - EPS).then(|| Butterworth::new(FilterKind::LowPass, hi, poles)),
            phase,
        })
    }

    /// Whether the band covers everything from 0 to Nyquist.
    pub fn is_identity(&self) -> bool {
        self.low_cut.is_none() && self.high_cut.is_none()
    }

    /// Filter one trace in place.
    pub fn filter(&self, trace: &mut [f32]) {
        for section in [&self.low_cut, &self.high_cut].into_iter().flatten() {
            section.apply(trace);
            if !self.phase {
                trace.reverse();
                section.apply(trace);
                trace.reverse();
            }
        }
    }

    /// Filter every trace of a buffer holding consecutive traces of `nt`
    /// samples.
    pub fn filter_traces(&self, data: &mut [f32], nt: usize) {
        for trace in data.chunks_mut(nt.max(1)) {
            self.filter(trace);
        }
    }
}
