// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::time::Instant;

use crate::core::{Grid, GridData, VelocityModel};
use crate::error::{ModelingError, Result};
use crate::geometry::ShotPosition;
use crate::stencil::Stencil;
use crate::wavefield::{inject, sample, WavefieldPair};

/// Time stepping and boundary options for forward modeling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelingOptions {
    /// Time step in seconds.
    pub dt: f32,
    /// Grid spacing in metres (the stencil assumes `dx == dz`).
    pub dx: f32,
    /// Number of time steps per shot.
    pub nt: usize,
    /// Sponge thickness in cells.
    pub nb: usize,
    /// Whether the top edge is a free surface.
    pub free_surface: bool,
}

/// Velocity and geometry after expansion into the padded domain.
#[derive(Debug)]
struct BoundModel {
    velocity: VelocityModel,
    stencil: Stencil,
    sources: ShotPosition,
    receivers: ShotPosition,
}

/// Acoustic forward modeling engine for one acquisition geometry.
///
/// Construct it with the source and receiver lines in model coordinates,
/// bind an expanded velocity model, then simulate shots. The bound model is
/// read-only while shots run, so one engine can serve concurrent shots.
pub struct ForwardModeling {
    sources: ShotPosition,
    receivers: ShotPosition,
    options: ModelingOptions,
    num_threads: Option<usize>,
    pool: rayon::ThreadPool,
    bound: Option<BoundModel>,
}

impl ForwardModeling {
    /// Create an engine for the given geometry.
    ///
    /// # Errors
    /// Returns an error if `dt` or `dx` is not positive and finite, `nt` is
    /// zero, or the thread pool cannot be built.
    pub fn new(
        sources: ShotPosition,
        receivers: ShotPosition,
        options: ModelingOptions,
    ) -> Result<Self> {
        if !options.dt.is_finite() || options.dt <= 0.0 {
            return Err(ModelingError::InvalidParameter {
                name: "dt",
                reason: format!("{} (must be positive and finite)", options.dt),
            });
        }
        if !options.dx.is_finite() || options.dx <= 0.0 {
            return Err(ModelingError::InvalidParameter {
                name: "dx",
                reason: format!("{} (must be positive and finite)", options.dx),
            });
        }
        if options.nt == 0 {
            return Err(ModelingError::InvalidParameter {
                name: "nt",
                reason: "must be at least 1".to_string(),
            });
        }
        let pool = build_pool(None)?;
        Ok(ForwardModeling {
            sources,
            receivers,
            options,
            num_threads: None,
            pool,
            bound: None,
        })
    }

    /// Set the number of stencil worker threads (builder method).
    /// If not specified, defaults to the number of available CPU cores.
    ///
    /// # Errors
    /// Returns an error if the thread pool cannot be built.
    pub fn with_threads(mut self, threads: usize) -> Result<Self> {
        self.num_threads = Some(threads);
        self.pool = build_pool(self.num_threads)?;
        Ok(self)
    }

    /// The modeling options.
    pub fn options(&self) -> &ModelingOptions {
        &self.options
    }

    /// Number of shots on the source line.
    pub fn num_shots(&self) -> usize {
        self.sources.len()
    }

    /// Number of receivers per shot.
    pub fn num_receivers(&self) -> usize {
        self.receivers.len()
    }

    /// Pad a model with the sponge thickness on every side.
    pub fn expand_domain(&self, velocity: &VelocityModel) -> VelocityModel {
        velocity.expand(self.options.nb)
    }

    /// Bind an expanded velocity model: transform it for the stencil, map
    /// the geometry into the padded domain and cache the sponge.
    ///
    /// # Errors
    /// Returns an error if a source or receiver lies outside the model
    /// before padding, sponge cells included.
    pub fn bind_velocity(&mut self, mut expanded: VelocityModel) -> Result<()> {
        let [nx, nz] = expanded.shape();
        let nb = self.options.nb;
        let (model_nx, model_nz) = (nx.saturating_sub(2 * nb), nz.saturating_sub(2 * nb));
        self.sources.validate("sources", model_nx, model_nz)?;
        self.receivers.validate("receivers", model_nx, model_nz)?;
        let sources = self.sources.shifted(nb, nz);
        let receivers = self.receivers.shifted(nb, nz);

        let courant = expanded.max() * self.options.dt / self.options.dx;
        if courant > 1.0 {
            log::warn!(
                "Courant number {:.3} exceeds 1; the time stepping will be unstable",
                courant
            );
        } else {
            log::debug!("Courant number {:.3}", courant);
        }

        expanded.transform(self.options.dx, self.options.dt);
        let stencil = Stencil::new(nx, nz, nb, self.options.free_surface);
        self.bound = Some(BoundModel {
            velocity: expanded,
            stencil,
            sources,
            receivers,
        });
        Ok(())
    }

    /// The bound velocity in transformed form, if any.
    pub fn velocity(&self) -> Option<&VelocityModel> {
        self.bound.as_ref().map(|b| &b.velocity)
    }

    fn bound(&self) -> Result<&BoundModel> {
        self.bound
            .as_ref()
            .ok_or_else(|| ModelingError::Other("no velocity model bound".to_string()))
    }

    /// Add one wavelet sample at every point of `positions`.
    pub fn add_source(&self, field: &mut Grid, amplitude: f32, positions: &ShotPosition) {
        inject(field, positions, amplitude);
    }

    /// Advance `pair` by one time step: `previous` receives the next level.
    ///
    /// # Errors
    /// Returns an error if no velocity model is bound.
    pub fn step_forward(&self, pair: &mut WavefieldPair, u2: &mut Grid) -> Result<()> {
        let bound = self.bound()?;
        bound
            .stencil
            .step(&mut pair.previous, &pair.current, &bound.velocity, u2);
        Ok(())
    }

    /// Sample `field` at every receiver into `row`.
    ///
    /// # Errors
    /// Returns an error if no velocity model is bound.
    pub fn record_seis(&self, row: &mut [f32], field: &Grid) -> Result<()> {
        let bound = self.bound()?;
        sample(field, &bound.receivers, row);
        Ok(())
    }

    /// Simulate shot `is` and return its gather in `(receiver, time)` layout.
    ///
    /// # Errors
    /// Returns an error if no model is bound, `is` is not a valid shot, or
    /// the wavelet is shorter than `nt`.
    pub fn simulate_shot(&self, is: usize, wavelet: &[f32]) -> Result<Vec<f32>> {
        let nt = self.options.nt;
        if wavelet.len() < nt {
            return Err(ModelingError::ShapeMismatch {
                expected: vec![nt],
                got: vec![wavelet.len()],
            });
        }
        let start = Instant::now();
        let gather = self.pool.install(|| -> Result<Vec<f32>> {
            let mut run = ShotRun::new(self, is)?;
            for &amplitude in &wavelet[..nt] {
                run.advance(amplitude)?;
            }
            run.finish()
        })?;
        log::info!(
            "shot {}, elapsed time {:.3}s",
            is,
            start.elapsed().as_secs_f64()
        );
        Ok(gather)
    }
}

fn build_pool(threads: Option<usize>) -> Result<rayon::ThreadPool> {
    let num_threads = threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| ModelingError::Other(e.to_string()))
}

/// Time-marching state of a single shot.
///
/// Created zeroed ([`ShotRun::new`]), advanced once per wavelet sample
/// ([`ShotRun::advance`]), and closed with [`ShotRun::finish`], which
/// returns the gather in `(receiver, time)` layout.
pub struct ShotRun<'a> {
    engine: &'a ForwardModeling,
    source: ShotPosition,
    pair: WavefieldPair,
    u2: Grid,
    record: Vec<f32>,
    it: usize,
}

impl<'a> ShotRun<'a> {
    /// Allocate zeroed wavefields for shot `is`.
    ///
    /// # Errors
    /// Returns an error if no model is bound or `is` is out of range.
    pub fn new(engine: &'a ForwardModeling, is: usize) -> Result<Self> {
        let bound = engine.bound()?;
        let [nx, nz] = bound.velocity.shape();
        let source = bound.sources.clip_range(is, is)?;
        let ng = bound.receivers.len();
        Ok(ShotRun {
            engine,
            source,
            pair: WavefieldPair::new(nx, nz),
            u2: Grid::zeros(nx, nz),
            record: vec![0.0; engine.options.nt * ng],
            it: 0,
        })
    }

    /// Index of the next time step.
    pub fn step_index(&self) -> usize {
        self.it
    }

    /// Whether every time step has been taken.
    pub fn is_done(&self) -> bool {
        self.it == self.engine.options.nt
    }

    /// The two live wavefield levels.
    pub fn wavefields(&self) -> &WavefieldPair {
        &self.pair
    }

    /// Take one time step with source amplitude `amplitude`.
    ///
    /// The source is added to the leading level, the stencil writes the next
    /// level over the trailing one, the pair swaps, and the level the source
    /// was injected into (now trailing) is recorded at row `it`.
    ///
    /// # Errors
    /// Returns [`ModelingError::StepOverflow`] once all steps are taken.
    pub fn advance(&mut self, amplitude: f32) -> Result<()> {
        let nt = self.engine.options.nt;
        if self.it >= nt {
            return Err(ModelingError::StepOverflow { nt });
        }
        self.engine
            .add_source(&mut self.pair.current, amplitude, &self.source);
        self.engine.step_forward(&mut self.pair, &mut self.u2)?;
        self.pair.swap();
        let ng = self.engine.num_receivers();
        let row = &mut self.record[self.it * ng..(self.it + 1) * ng];
        self.engine.record_seis(row, &self.pair.previous)?;
        self.it += 1;
        Ok(())
    }

    /// Finish the shot and return its gather as `ng` traces of `nt` samples.
    ///
    /// # Errors
    /// Returns an error if steps remain.
    pub fn finish(self) -> Result<Vec<f32>> {
        let nt = self.engine.options.nt;
        if self.it != nt {
            return Err(ModelingError::Other(format!(
                "shot finished after {} of {} time steps",
                self.it, nt
            )));
        }
        Ok(transpose(&self.record, nt, self.engine.num_receivers()))
    }
}

/// Transpose a row-major `rows x cols` buffer into `cols x rows`.
pub fn transpose(src: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    assert_eq!(src.len(), rows * cols, "buffer is not {}x{}", rows, cols);
    let mut out = vec![0.0; src.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = src[r * cols + c];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavelet::ricker_wavelet;

    const NX: usize = 40;
    const NZ: usize = 30;

    fn engine(nt: usize, nb: usize, free_surface: bool) -> ForwardModeling {
        let sources = ShotPosition::new(5, 10, 0, 10, 2, NZ);
        let receivers = ShotPosition::new(5, 0, 0, 1, NX, NZ);
        let options = ModelingOptions {
            dt: 0.001,
            dx: 10.0,
            nt,
            nb,
            free_surface,
        };
        let mut fm = ForwardModeling::new(sources, receivers, options)
            .unwrap()
            .with_threads(2)
            .unwrap();
        let v = VelocityModel::uniform(NX, NZ, 2000.0).unwrap();
        let expanded = fm.expand_domain(&v);
        fm.bind_velocity(expanded).unwrap();
        fm
    }

    #[test]
    fn rejects_bad_options() {
        let line = ShotPosition::new(0, 0, 0, 1, 1, 10);
        let mut options = ModelingOptions {
            dt: 0.0,
            dx: 10.0,
            nt: 10,
            nb: 5,
            free_surface: false,
        };
        assert!(matches!(
            ForwardModeling::new(line, line, options),
            Err(ModelingError::InvalidParameter { name: "dt", .. })
        ));
        options.dt = 0.001;
        options.nt = 0;
        assert!(matches!(
            ForwardModeling::new(line, line, options),
            Err(ModelingError::InvalidParameter { name: "nt", .. })
        ));
    }

    #[test]
    fn unbound_engine_cannot_step() {
        let line = ShotPosition::new(0, 0, 0, 1, 1, 10);
        let options = ModelingOptions {
            dt: 0.001,
            dx: 10.0,
            nt: 10,
            nb: 5,
            free_surface: false,
        };
        let fm = ForwardModeling::new(line, line, options).unwrap();
        assert!(ShotRun::new(&fm, 0).is_err());
    }

    #[test]
    fn bind_expands_and_transforms() {
        let fm = engine(10, 8, false);
        let v = fm.velocity().unwrap();
        assert_eq!(v.shape(), [NX + 16, NZ + 16]);
        // (10 / (2000 * 0.001))^2
        assert!((v.at(0, 0) - 25.0).abs() < 1e-4);
    }

    #[test]
    fn geometry_in_sponge_is_rejected() {
        let options = ModelingOptions {
            dt: 0.001,
            dx: 10.0,
            nt: 10,
            nb: 10,
            free_surface: false,
        };
        let v = VelocityModel::uniform(NX, NZ, 2000.0).unwrap();

        // x = 45 fits the 60-wide padded grid but not the 40-wide model.
        let sources = ShotPosition::new(5, 45, 0, 0, 1, NZ);
        let receivers = ShotPosition::new(5, 0, 0, 1, NX, NZ);
        let mut fm = ForwardModeling::new(sources, receivers, options).unwrap();
        let expanded = fm.expand_domain(&v);
        assert!(matches!(
            fm.bind_velocity(expanded),
            Err(ModelingError::GeometryOutOfBounds { what: "sources", .. })
        ));

        let sources = ShotPosition::new(5, 10, 0, 0, 1, NZ);
        let receivers = ShotPosition::new(NZ + 2, 0, 0, 1, NX, NZ);
        let mut fm = ForwardModeling::new(sources, receivers, options).unwrap();
        let expanded = fm.expand_domain(&v);
        assert!(matches!(
            fm.bind_velocity(expanded),
            Err(ModelingError::GeometryOutOfBounds { what: "receivers", .. })
        ));
    }

    #[test]
    fn zero_wavelet_gives_zero_gather() {
        let fm = engine(50, 8, false);
        let gather = fm.simulate_shot(0, &vec![0.0; 50]).unwrap();
        assert_eq!(gather.len(), NX * 50);
        assert!(gather.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn first_sample_records_injected_level() {
        // The receiver line passes through the source, so the first recorded
        // row holds the source amplitude injected at step 0.
        let fm = engine(5, 8, false);
        let mut run = ShotRun::new(&fm, 0).unwrap();
        run.advance(2.5).unwrap();
        let wavefields = run.wavefields();
        let src = wavefields.previous.as_slice().iter().cloned().fold(0.0f32, f32::max);
        assert_eq!(src, 2.5);
        for _ in 1..5 {
            run.advance(0.0).unwrap();
        }
        let gather = run.finish().unwrap();
        // Receiver 10 coincides with source 0; trace-major layout.
        assert_eq!(gather[10 * 5], 2.5);
    }

    #[test]
    fn advancing_past_nt_fails() {
        let fm = engine(3, 8, false);
        let mut run = ShotRun::new(&fm, 1).unwrap();
        for _ in 0..3 {
            run.advance(1.0).unwrap();
        }
        assert!(run.is_done());
        assert!(matches!(
            run.advance(1.0),
            Err(ModelingError::StepOverflow { nt: 3 })
        ));
    }

    #[test]
    fn finish_before_done_fails() {
        let fm = engine(3, 8, false);
        let mut run = ShotRun::new(&fm, 0).unwrap();
        run.advance(1.0).unwrap();
        assert_eq!(run.step_index(), 1);
        assert!(run.finish().is_err());
    }

    #[test]
    fn unknown_shot_rejected() {
        let fm = engine(3, 8, false);
        assert!(ShotRun::new(&fm, 2).is_err());
    }

    #[test]
    fn short_wavelet_rejected() {
        let fm = engine(10, 8, false);
        assert!(matches!(
            fm.simulate_shot(0, &[1.0; 4]),
            Err(ModelingError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn shots_are_reproducible() {
        let fm = engine(80, 8, true);
        let w = ricker_wavelet(80, 15.0, 0.001, 1000.0);
        let a = fm.simulate_shot(1, &w).unwrap();
        let b = fm.simulate_shot(1, &w).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn transpose_small() {
        let src = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(transpose(&src, 2, 3), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}
