// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use log::LevelFilter;
use rayon::prelude::*;

use seismic_fm::config::{header_path, ShotHeader};
use seismic_fm::filter::BandpassFilter;
use seismic_fm::io;

#[derive(Parser)]
#[command(
    name = "bandpass",
    about = "Butterworth bandpass filtering of traces (time on the last axis)"
)]
struct Cli {
    /// Input traces (.npy)
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Output traces (.npy)
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Sample interval in seconds; read from <input>.toml when omitted
    #[arg(long)]
    dt: Option<f32>,

    /// Low cutoff frequency in Hz (0 disables the low cut)
    #[arg(long, default_value = "0")]
    flo: f32,

    /// High cutoff frequency in Hz (defaults to Nyquist, disabling the high cut)
    #[arg(long)]
    fhi: Option<f32>,

    /// Minimum phase (forward only) instead of zero phase
    #[arg(long)]
    phase: bool,

    /// Log level (error, warn, info, debug, trace); falls back to RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
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

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let header_in = header_path(&cli.input);
    let header = if header_in.exists() {
        Some(ShotHeader::read(&header_in).map_err(|e| anyhow::anyhow!("{}", e))?)
    } else {
        None
    };
    let dt = match (cli.dt, &header) {
        (Some(dt), _) => dt,
        (None, Some(h)) => h.d1,
        (None, None) => bail!(
            "--dt is required when {} does not exist",
            header_in.display()
        ),
    };
    let fhi = cli.fhi.unwrap_or(0.5 / dt);

    let filter =
        BandpassFilter::new(cli.flo, fhi, dt, cli.phase).map_err(|e| anyhow::anyhow!("{}", e))?;
    let (shape, mut data) = io::read_traces(&cli.input).map_err(|e| anyhow::anyhow!("{}", e))?;
    let nt = shape[shape.len() - 1];
    log::info!(
        "{} traces of {} samples, band [{}, {}] Hz, {}",
        data.len() / nt.max(1),
        nt,
        cli.flo,
        fhi,
        if cli.phase { "minimum phase" } else { "zero phase" }
    );

    if filter.is_identity() {
        log::warn!("band covers 0 to Nyquist; traces are copied unchanged");
    } else if nt > 0 {
        data.par_chunks_mut(nt).for_each(|trace| filter.filter(trace));
    }

    io::write_traces(&cli.output, &shape, data).map_err(|e| anyhow::anyhow!("{}", e))?;
    if let Some(h) = header {
        h.write(&header_path(&cli.output))
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }
    Ok(())
}
