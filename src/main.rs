// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;

use seismic_fm::config::{header_path, ModelingParams, ShotHeader};
use seismic_fm::core::VelocityModel;
use seismic_fm::io::{self, NpyShotWriter};
use seismic_fm::modeling::ForwardModeling;
use seismic_fm::scheduler::LocalCluster;
use seismic_fm::wavelet::ricker_wavelet;

#[derive(Parser)]
#[command(
    name = "fm-damp",
    about = "2D acoustic forward modeling with sponge absorbing boundaries"
)]
struct Cli {
    /// Initial velocity: a .npy/.mat path, "uniform:<v>,<nx>,<nz>" or
    /// "gradient:<v0>,<g>,<nx>,<nz>"
    #[arg(long)]
    vinit: String,

    /// Output shot gather (.npy); the header goes to <shots>.toml
    #[arg(long, default_value = "shots.npy")]
    shots: PathBuf,

    /// Lateral grid spacing in metres
    #[arg(long, default_value = "10.0")]
    dx: f32,

    /// Depth grid spacing in metres (defaults to dx)
    #[arg(long)]
    dz: Option<f32>,

    /// Sponge thickness in cells
    #[arg(long, default_value = "30")]
    nb: usize,

    /// Time step in seconds
    #[arg(long)]
    dt: f32,

    /// Number of time steps
    #[arg(long)]
    nt: usize,

    /// Number of shots
    #[arg(long)]
    ns: usize,

    /// Number of receivers per shot
    #[arg(long)]
    ng: usize,

    /// Source step along x, in cells
    #[arg(long)]
    jsx: usize,

    /// Source step along z, in cells
    #[arg(long, default_value = "0")]
    jsz: usize,

    /// Receiver step along x, in cells
    #[arg(long, default_value = "1")]
    jgx: usize,

    /// Receiver step along z, in cells
    #[arg(long, default_value = "0")]
    jgz: usize,

    /// First source x index
    #[arg(long)]
    sxbeg: usize,

    /// First source z index
    #[arg(long)]
    szbeg: usize,

    /// First receiver x index
    #[arg(long)]
    gxbeg: usize,

    /// First receiver z index
    #[arg(long)]
    gzbeg: usize,

    /// Treat the top edge as a free surface
    #[arg(long)]
    free: bool,

    /// Source wavelet amplitude
    #[arg(long, default_value = "1000")]
    amp: f32,

    /// Ricker dominant frequency in Hz
    #[arg(long, default_value = "10")]
    fm: f32,

    /// Number of ranks sharing the shots
    #[arg(long = "np", default_value = "1")]
    np: usize,

    /// Stencil worker threads per rank
    #[arg(long)]
    threads: Option<usize>,

    /// Log level (error, warn, info, debug, trace); falls back to RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn params(&self) -> ModelingParams {
        ModelingParams {
            nb: self.nb,
            dt: self.dt,
            nt: self.nt,
            ns: self.ns,
            ng: self.ng,
            jsx: self.jsx,
            jsz: self.jsz,
            jgx: self.jgx,
            jgz: self.jgz,
            sxbeg: self.sxbeg,
            szbeg: self.szbeg,
            gxbeg: self.gxbeg,
            gzbeg: self.gzbeg,
            free: self.free,
            amp: self.amp,
            fm: self.fm,
        }
    }
}

fn init_logging(level: Option<&str>) {
    let filter = level
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .or_else(|| std::env::var("RUST_LOG").ok().and_then(|v| v.parse().ok()))
        .unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(filter)
        .format_timestamp_secs()
        .init();
}

fn parse_numbers<T: std::str::FromStr>(s: &str, count: usize, what: &str) -> Result<Vec<T>> {
    let parts: Vec<T> = s
        .split(',')
        .map(|p| p.trim().parse::<T>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| anyhow::anyhow!("invalid {} parameters '{}'", what, s))?;
    if parts.len() != count {
        bail!("{} expects {} values, got {}", what, count, parts.len());
    }
    Ok(parts)
}

fn build_velocity(mode: &str, dz: f32) -> Result<VelocityModel> {
    if let Some(params) = mode.strip_prefix("uniform:") {
        let v: Vec<f32> = parse_numbers(params, 3, "uniform")?;
        return VelocityModel::uniform(v[1] as usize, v[2] as usize, v[0])
            .map_err(|e| anyhow::anyhow!("{}", e));
    }

    if let Some(params) = mode.strip_prefix("gradient:") {
        let v: Vec<f32> = parse_numbers(params, 4, "gradient")?;
        let (v0, g, nx, nz) = (v[0], v[1], v[2] as usize, v[3] as usize);
        let column: Vec<f32> = (0..nz).map(|iz| v0 + g * iz as f32 * dz).collect();
        let data = column.repeat(nx);
        return VelocityModel::new(nx, nz, data).map_err(|e| anyhow::anyhow!("{}", e));
    }

    io::load_velocity(Path::new(mode))
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("reading velocity model '{}'", mode))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());
    let start = Instant::now();

    let dz = cli.dz.unwrap_or(cli.dx);
    if (dz - cli.dx).abs() > f32::EPSILON * cli.dx.abs() {
        log::warn!(
            "dz={} differs from dx={}; the stencil uses dx on both axes",
            dz,
            cli.dx
        );
    }

    let velocity = build_velocity(&cli.vinit, dz)?;
    let (nx, nz) = (velocity.nx(), velocity.nz());
    log::info!(
        "model {}x{}, velocity range [{}, {}] m/s",
        nx,
        nz,
        velocity.min(),
        velocity.max()
    );

    let params = cli.params();
    params
        .check(nx, nz)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut engine = ForwardModeling::new(
        params.sources(nz),
        params.receivers(nz),
        params.options(cli.dx),
    )
    .map_err(|e| anyhow::anyhow!("{}", e))?;
    if let Some(threads) = cli.threads {
        engine = engine
            .with_threads(threads)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }
    let expanded = engine.expand_domain(&velocity);
    engine
        .bind_velocity(expanded)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let wavelet = ricker_wavelet(params.nt, params.fm, params.dt, params.amp);

    ShotHeader::new(&params, cli.dx, velocity.min(), velocity.max())
        .write(&header_path(&cli.shots))
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let mut writer = NpyShotWriter::create(&cli.shots, params.ns, params.ng, params.nt)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let cluster = LocalCluster::new(cli.np).map_err(|e| anyhow::anyhow!("{}", e))?;
    cluster
        .run(params.ns, &mut writer, |is| engine.simulate_shot(is, &wavelet))
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let written = writer.finish().map_err(|e| anyhow::anyhow!("{}", e))?;

    log::info!(
        "{} shots written to {}, total elapsed time {:.3}s",
        written,
        cli.shots.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
