// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Two-dimensional acoustic finite-difference forward modeling.
//!
//! This library simulates constant-density acoustic wave propagation on a
//! regular grid with a 10th-order spatial stencil, second-order leapfrog
//! time stepping and a sponge absorbing boundary. Shots are distributed over
//! ranks and gathered back in shot order, producing synthetic shot gathers
//! for full-waveform inversion workflows.

#![warn(missing_docs)]

/// Source and receiver configuration, validation and gather headers.
pub mod config;
/// Core grid data structures and traits.
pub mod core;
/// Sponge absorbing boundary coefficients.
pub mod damping;
/// Error types for the library.
pub mod error;
/// Butterworth bandpass filtering of traces.
pub mod filter;
/// Regularly spaced source and receiver lines.
pub mod geometry;
/// File I/O for velocity models, traces and shot gathers.
pub mod io;
/// Time marching of single shots.
pub mod modeling;
/// Shot distribution across ranks and ordered gathering.
pub mod scheduler;
/// Finite-difference Laplacian and time update.
pub mod stencil;
/// Bounded velocity model update.
pub mod update;
/// Wavefield buffers, source injection and receiver sampling.
pub mod wavefield;
/// Source wavelets.
pub mod wavelet;

pub use crate::config::{ModelingParams, ShotHeader};
pub use crate::core::{Grid, VelocityModel};
pub use crate::error::{ModelingError, Result};
pub use crate::modeling::{ForwardModeling, ModelingOptions, ShotRun};
pub use crate::scheduler::{LocalCluster, ShotScheduler, ShotSink};
