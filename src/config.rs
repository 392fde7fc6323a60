// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ModelingError, Result};
use crate::geometry::ShotPosition;
use crate::modeling::ModelingOptions;

/// Acquisition and time-stepping parameters of a modeling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelingParams {
    /// Sponge thickness in cells.
    #[serde(default = "default_nb")]
    pub nb: usize,
    /// Time step in seconds.
    pub dt: f32,
    /// Time steps per shot.
    pub nt: usize,
    /// Number of shots.
    pub ns: usize,
    /// Receivers per shot.
    pub ng: usize,
    /// Source step along x, in cells.
    pub jsx: usize,
    /// Source step along z, in cells.
    #[serde(default)]
    pub jsz: usize,
    /// Receiver step along x, in cells.
    #[serde(default = "default_jgx")]
    pub jgx: usize,
    /// Receiver step along z, in cells.
    #[serde(default)]
    pub jgz: usize,
    /// First source x index.
    pub sxbeg: usize,
    /// First source z index.
    pub szbeg: usize,
    /// First receiver x index.
    pub gxbeg: usize,
    /// First receiver z index.
    pub gzbeg: usize,
    /// Free surface on top.
    #[serde(default)]
    pub free: bool,
    /// Source wavelet amplitude.
    #[serde(default = "default_amp")]
    pub amp: f32,
    /// Dominant frequency of the Ricker wavelet in Hz.
    #[serde(default = "default_fm")]
    pub fm: f32,
}

fn default_nb() -> usize {
    30
}

fn default_jgx() -> usize {
    1
}

fn default_amp() -> f32 {
    1000.0
}

fn default_fm() -> f32 {
    10.0
}

impl ModelingParams {
    /// Source line on a model with `nz` depth samples.
    pub fn sources(&self, nz: usize) -> ShotPosition {
        ShotPosition::new(self.szbeg, self.sxbeg, self.jsz, self.jsx, self.ns, nz)
    }

    /// Receiver line on a model with `nz` depth samples.
    pub fn receivers(&self, nz: usize) -> ShotPosition {
        ShotPosition::new(self.gzbeg, self.gxbeg, self.jgz, self.jgx, self.ng, nz)
    }

    /// Time-stepping options for a model sampled every `dx` metres.
    pub fn options(&self, dx: f32) -> ModelingOptions {
        ModelingOptions {
            dt: self.dt,
            dx,
            nt: self.nt,
            nb: self.nb,
            free_surface: self.free,
        }
    }

    /// Validate against an `nx` x `nz` model (before expansion).
    ///
    /// # Errors
    /// Returns an error if `dt` is not positive, a count is zero, or any
    /// source or receiver falls outside the model.
    pub fn check(&self, nx: usize, nz: usize) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ModelingError::InvalidParameter {
                name: "dt",
                reason: format!("{} (must be positive and finite)", self.dt),
            });
        }
        for (name, value) in [("nt", self.nt), ("ns", self.ns), ("ng", self.ng)] {
            if value == 0 {
                return Err(ModelingError::InvalidParameter {
                    name,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        if !self.fm.is_finite() || self.fm <= 0.0 {
            return Err(ModelingError::InvalidParameter {
                name: "fm",
                reason: format!("{} (must be positive and finite)", self.fm),
            });
        }
        self.sources(nz).validate("sources", nx, nz)?;
        self.receivers(nz).validate("receivers", nx, nz)?;
        Ok(())
    }
}

/// Description of a shot gather file, written next to it as TOML.
///
/// Axis 1 is time, axis 2 the receivers, axis 3 the shots; the remaining
/// fields record how the gather was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ShotHeader {
    pub n1: usize,
    pub n2: usize,
    pub n3: usize,
    pub d1: f32,
    pub d2: f32,
    pub o1: f32,
    pub o2: f32,
    pub label1: String,
    pub label2: String,
    pub label3: String,
    pub unit1: String,
    pub unit2: String,
    pub amp: f32,
    pub fm: f32,
    pub ng: usize,
    pub szbeg: usize,
    pub sxbeg: usize,
    pub gzbeg: usize,
    pub gxbeg: usize,
    pub jsx: usize,
    pub jsz: usize,
    pub jgx: usize,
    pub jgz: usize,
    pub nb: usize,
    pub free: bool,
    pub vmin: f32,
    pub vmax: f32,
}

impl ShotHeader {
    /// Header of the gather produced by `params` on a model with spacing
    /// `dx` and velocity range `[vmin, vmax]`.
    pub fn new(params: &ModelingParams, dx: f32, vmin: f32, vmax: f32) -> Self {
        ShotHeader {
            n1: params.nt,
            n2: params.ng,
            n3: params.ns,
            d1: params.dt,
            d2: params.jgx as f32 * dx,
            o1: 0.0,
            o2: 0.0,
            label1: "Time".to_string(),
            label2: "Lateral".to_string(),
            label3: "Shot".to_string(),
            unit1: "sec".to_string(),
            unit2: "m".to_string(),
            amp: params.amp,
            fm: params.fm,
            ng: params.ng,
            szbeg: params.szbeg,
            sxbeg: params.sxbeg,
            gzbeg: params.gzbeg,
            gxbeg: params.gxbeg,
            jsx: params.jsx,
            jsz: params.jsz,
            jgx: params.jgx,
            jgz: params.jgz,
            nb: params.nb,
            free: params.free,
            vmin,
            vmax,
        }
    }

    /// Serialize to a TOML document.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ModelingError::Other(format!("TOML write error: {}", e)))
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    /// Returns an error if the document is not a valid header.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ModelingError::Other(format!("TOML parse error: {}", e)))
    }

    /// Write the header to `path`.
    ///
    /// # Errors
    /// Returns an error on serialization or I/O failure.
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Read a header from `path`.
    ///
    /// # Errors
    /// Returns an error on I/O or parse failure.
    pub fn read(path: &Path) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

/// Path of the TOML header belonging to a data file: `shots.npy` maps to
/// `shots.npy.toml`.
pub fn header_path(data: &Path) -> PathBuf {
    let mut name = data.as_os_str().to_os_string();
    name.push(".toml");
    PathBuf::from(name)
}
