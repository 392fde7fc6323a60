// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use ndarray::Array3;
use proptest::prelude::*;

use seismic_fm::config::ModelingParams;
use seismic_fm::core::{Grid, VelocityModel};
use seismic_fm::geometry::ShotPosition;
use seismic_fm::io::NpyShotWriter;
use seismic_fm::modeling::{transpose, ForwardModeling, ModelingOptions, ShotRun};
use seismic_fm::scheduler::{LocalCluster, ShotPartition};
use seismic_fm::wavelet::ricker_wavelet;

fn survey(ns: usize) -> ModelingParams {
    ModelingParams {
        nb: 10,
        dt: 0.001,
        nt: 120,
        ns,
        ng: 40,
        jsx: 8,
        jsz: 0,
        jgx: 1,
        jgz: 0,
        sxbeg: 4,
        szbeg: 2,
        gxbeg: 0,
        gzbeg: 1,
        free: false,
        amp: 1000.0,
        fm: 20.0,
    }
}

fn layered_model(nx: usize, nz: usize) -> VelocityModel {
    let data = (0..nx * nz)
        .map(|i| if i % nz < nz / 2 { 1800.0 } else { 2600.0 })
        .collect();
    VelocityModel::new(nx, nz, data).unwrap()
}

fn bound_engine(params: &ModelingParams, velocity: &VelocityModel, dx: f32) -> ForwardModeling {
    let nz = velocity.nz();
    params.check(velocity.nx(), nz).unwrap();
    let mut engine = ForwardModeling::new(
        params.sources(nz),
        params.receivers(nz),
        params.options(dx),
    )
    .unwrap()
    .with_threads(2)
    .unwrap();
    let expanded = engine.expand_domain(velocity);
    engine.bind_velocity(expanded).unwrap();
    engine
}

/// Shots gathered through several ranks come back in order and bit-identical
/// to a single-rank run.
#[test]
fn rank_count_does_not_change_gather() {
    let params = survey(5);
    let velocity = layered_model(40, 30);
    let engine = bound_engine(&params, &velocity, 10.0);
    let wavelet = ricker_wavelet(params.nt, params.fm, params.dt, params.amp);

    let mut single: Vec<Vec<f32>> = Vec::new();
    LocalCluster::new(1)
        .unwrap()
        .run(params.ns, &mut single, |is| engine.simulate_shot(is, &wavelet))
        .unwrap();

    for np in [2, 3, 7] {
        let mut multi: Vec<Vec<f32>> = Vec::new();
        let written = LocalCluster::new(np)
            .unwrap()
            .run(params.ns, &mut multi, |is| engine.simulate_shot(is, &wavelet))
            .unwrap();
        assert_eq!(written, params.ns);
        assert_eq!(multi, single, "np = {}", np);
    }

    // Distinct source positions give distinct gathers.
    assert_ne!(single[0], single[1]);
    assert!(single.iter().all(|g| g.len() == params.ng * params.nt));
}

/// The streamed gather file has shape [ns, ng, nt] and holds each shot in
/// order.
#[test]
fn gather_file_matches_in_memory_shots() {
    let params = survey(3);
    let velocity = layered_model(40, 30);
    let engine = bound_engine(&params, &velocity, 10.0);
    let wavelet = ricker_wavelet(params.nt, params.fm, params.dt, params.amp);

    let tmp = std::env::temp_dir().join("seismic_fm_verification_shots.npy");
    let mut writer = NpyShotWriter::create(&tmp, params.ns, params.ng, params.nt).unwrap();
    LocalCluster::new(2)
        .unwrap()
        .run(params.ns, &mut writer, |is| engine.simulate_shot(is, &wavelet))
        .unwrap();
    assert_eq!(writer.finish().unwrap(), params.ns);

    let arr: Array3<f32> = ndarray_npy::read_npy(&tmp).unwrap();
    assert_eq!(arr.shape(), &[params.ns, params.ng, params.nt]);
    for is in 0..params.ns {
        let expected = engine.simulate_shot(is, &wavelet).unwrap();
        let got: Vec<f32> = arr
            .index_axis(ndarray::Axis(0), is)
            .iter()
            .copied()
            .collect();
        assert_eq!(got, expected, "shot {}", is);
    }
    std::fs::remove_file(&tmp).ok();
}

/// A receiver at the source position sees the direct arrival before a
/// distant one.
#[test]
fn direct_arrival_moves_out_with_offset() {
    let params = ModelingParams {
        nt: 300,
        ns: 1,
        ng: 60,
        sxbeg: 10,
        szbeg: 20,
        gzbeg: 20,
        ..survey(1)
    };
    let velocity = VelocityModel::uniform(60, 40, 2000.0).unwrap();
    let engine = bound_engine(&params, &velocity, 10.0);
    let wavelet = ricker_wavelet(params.nt, params.fm, params.dt, params.amp);
    let gather = engine.simulate_shot(0, &wavelet).unwrap();

    let peak_time = |ig: usize| -> usize {
        let trace = &gather[ig * params.nt..(ig + 1) * params.nt];
        trace
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap())
            .map(|(it, _)| it)
            .unwrap()
    };
    let near = peak_time(12);
    let far = peak_time(42);
    // 300 m at 2000 m/s is 150 steps of 1 ms.
    assert!(far > near + 100, "near peak {}, far peak {}", near, far);
}

fn interior_energy(run: &ShotRun<'_>, nb: usize, nx: usize, nz: usize) -> f64 {
    let field: &Grid = &run.wavefields().current;
    let mut energy = 0.0f64;
    for ix in nb..nb + nx {
        for iz in nb..nb + nz {
            let v = field[[ix, iz]] as f64;
            energy += v * v;
        }
    }
    energy
}

/// Energy left in the model after the wavefront has reached the edges is
/// much lower with a sponge than with reflecting edges.
#[test]
fn sponge_absorbs_outgoing_energy() {
    let (nx, nz, nt) = (60, 60, 600);
    let velocity = VelocityModel::uniform(nx, nz, 2000.0).unwrap();
    let wavelet = ricker_wavelet(nt, 25.0, 0.001, 1.0);

    let residual = |nb: usize| -> f64 {
        let source = ShotPosition::new(30, 30, 0, 0, 1, nz);
        let options = ModelingOptions {
            dt: 0.001,
            dx: 10.0,
            nt,
            nb,
            free_surface: false,
        };
        let mut engine = ForwardModeling::new(source, source, options)
            .unwrap()
            .with_threads(2)
            .unwrap();
        let expanded = engine.expand_domain(&velocity);
        engine.bind_velocity(expanded).unwrap();
        let mut run = ShotRun::new(&engine, 0).unwrap();
        for &a in &wavelet {
            run.advance(a).unwrap();
        }
        interior_energy(&run, nb, nx, nz)
    };

    let reflecting = residual(0);
    let absorbing = residual(20);
    assert!(reflecting > 0.0);
    assert!(
        absorbing < 0.5 * reflecting,
        "absorbing {} vs reflecting {}",
        absorbing,
        reflecting
    );
}

proptest! {
    /// Every shot is owned by exactly one rank, blocks are contiguous and
    /// `owner` agrees with `range`.
    #[test]
    fn partition_is_exact_cover(ns in 0usize..200, np in 1usize..40) {
        let p = ShotPartition::new(ns, np).unwrap();
        let mut next = 0;
        for rank in 0..np {
            let range = p.range(rank);
            prop_assert_eq!(range.start, next);
            prop_assert!(range.len() <= p.block_size());
            for is in range.clone() {
                prop_assert_eq!(p.owner(is), rank);
            }
            next = range.end;
        }
        prop_assert_eq!(next, ns);
    }

    /// Transposing twice restores the buffer.
    #[test]
    fn transpose_round_trip(rows in 1usize..30, cols in 1usize..30) {
        let src: Vec<f32> = (0..rows * cols).map(|v| v as f32).collect();
        let t = transpose(&src, rows, cols);
        prop_assert_eq!(t[rows - 1], src[(rows - 1) * cols]);
        prop_assert_eq!(transpose(&t, cols, rows), src);
    }
}
