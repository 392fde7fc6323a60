// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use crate::core::VelocityModel;
use crate::error::{ModelingError, Result};
use crate::scheduler::ShotSink;

/// MAT variable holding the velocity model.
pub const VELOCITY_VARIABLE: &str = "velocity";

/// Supported file formats for model I/O.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    /// NumPy .npy format.
    Npy,
    /// MATLAB .mat format (Level 5).
    Mat,
}

/// Infer file format from extension.
pub fn infer_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("npy") => Ok(FileFormat::Npy),
        Some("mat") => Ok(FileFormat::Mat),
        Some(ext) => Err(ModelingError::UnsupportedFileFormat(ext.to_string())),
        None => Err(ModelingError::UnsupportedFileFormat(
            "(no extension)".to_string(),
        )),
    }
}

/// Read any-dimensional f32 data from a .npy file, demoting f64.
fn read_npy_f32(path: &Path) -> Result<ArrayD<f32>> {
    match ndarray_npy::read_npy::<_, ArrayD<f32>>(path) {
        Ok(a) => Ok(a),
        Err(_) => {
            let arr64: ArrayD<f64> = ndarray_npy::read_npy(path)
                .map_err(|e| ModelingError::UnsupportedDtype(format!("{}", e)))?;
            Ok(arr64.mapv(|v| v as f32))
        }
    }
}

/// Load a `[nx, nz]` velocity model from a .npy file.
pub fn load_npy_velocity(path: &Path) -> Result<VelocityModel> {
    let arr = read_npy_f32(path)?;
    let shape = arr.shape().to_vec();
    if shape.len() != 2 {
        return Err(ModelingError::ShapeMismatch {
            expected: vec![0, 0],
            got: shape,
        });
    }
    // Fortran-order files would otherwise come out lateral-fast.
    let data = arr.as_standard_layout().to_owned().into_raw_vec();
    VelocityModel::new(shape[0], shape[1], data)
}

/// Load a `[nx, nz]` velocity model from variable `variable_name` of a .mat
/// file.
pub fn load_mat_velocity(path: &Path, variable_name: &str) -> Result<VelocityModel> {
    let file = File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mat = matfile::MatFile::parse(&mut reader)
        .map_err(|e| ModelingError::Other(format!("MAT parse error: {}", e)))?;

    let available: Vec<String> = mat.arrays().iter().map(|a| a.name().to_string()).collect();
    let array = mat
        .find_by_name(variable_name)
        .ok_or_else(|| ModelingError::MatVariableNotFound {
            expected: variable_name.to_string(),
            available,
        })?;

    let data: Vec<f32> = match array.data() {
        matfile::NumericData::Single { real, imag: _ } => real.clone(),
        matfile::NumericData::Double { real, imag: _ } => real.iter().map(|&v| v as f32).collect(),
        _ => {
            return Err(ModelingError::UnsupportedDtype(
                "MAT file array is not f64 or f32".to_string(),
            ))
        }
    };

    let mat_shape: Vec<usize> = array.size().to_vec();
    if mat_shape.len() != 2 || mat_shape.iter().product::<usize>() != data.len() {
        return Err(ModelingError::ShapeMismatch {
            expected: vec![0, 0],
            got: mat_shape,
        });
    }

    // MATLAB rows are the lateral axis; the data is column-major.
    let arr = ArrayD::from_shape_vec(IxDyn(&mat_shape).f(), data)
        .map_err(|e| ModelingError::Other(format!("shape error: {}", e)))?;
    let data = arr.as_standard_layout().to_owned().into_raw_vec();
    VelocityModel::new(mat_shape[0], mat_shape[1], data)
}

/// Load a velocity model, inferring the format from the extension.
pub fn load_velocity(path: &Path) -> Result<VelocityModel> {
    match infer_format(path)? {
        FileFormat::Npy => load_npy_velocity(path),
        FileFormat::Mat => load_mat_velocity(path, VELOCITY_VARIABLE),
    }
}

/// Read a trace file: a .npy array whose last axis is time.
/// Returns the shape and the samples in row-major order.
pub fn read_traces(path: &Path) -> Result<(Vec<usize>, Vec<f32>)> {
    let arr = read_npy_f32(path)?;
    let shape = arr.shape().to_vec();
    if shape.is_empty() {
        return Err(ModelingError::ShapeMismatch {
            expected: vec![0],
            got: shape,
        });
    }
    Ok((shape, arr.as_standard_layout().to_owned().into_raw_vec()))
}

/// Write row-major samples of the given shape to a .npy file.
pub fn write_traces(path: &Path, shape: &[usize], data: Vec<f32>) -> Result<()> {
    let arr = ArrayD::from_shape_vec(IxDyn(shape), data)
        .map_err(|e| ModelingError::Other(format!("shape error: {}", e)))?;
    ndarray_npy::write_npy(path, &arr)
        .map_err(|e| ModelingError::Other(format!("npy write error: {}", e)))?;
    Ok(())
}

/// Streaming writer of a `[ns, ng, nt]` f32 shot gather in .npy format.
///
/// The header is written on creation; shots are appended one at a time in
/// increasing order, so a full survey never has to be held in memory.
/// `ndarray_npy::write_npy` needs the whole array up front, so the header
/// is written here by hand and the samples are streamed after it.
///
/// # Format Details
///
/// NPY version 1.0: the magic string `\x93NUMPY`, two version bytes, a
/// little-endian `u16` header length, then an ASCII dictionary padded with
/// spaces and a trailing newline so the data starts on a 64-byte boundary.
/// Samples follow as little-endian `f32` in C order.
pub struct NpyShotWriter {
    writer: BufWriter<File>,
    shape: [usize; 3],
    next: usize,
}

impl NpyShotWriter {
    /// Create `path` for `ns` shots of `ng` receivers by `nt` samples.
    pub fn create(path: &Path, ns: usize, ng: usize, nt: usize) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&npy_header(&[ns, ng, nt]))?;
        Ok(NpyShotWriter {
            writer,
            shape: [ns, ng, nt],
            next: 0,
        })
    }

    /// Number of shots written so far.
    pub fn shots_written(&self) -> usize {
        self.next
    }

    /// Flush the file and check that every shot was written.
    ///
    /// # Errors
    /// Returns an error on I/O failure or if shots are missing.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        if self.next != self.shape[0] {
            return Err(ModelingError::Protocol(format!(
                "gather file holds {} of {} shots",
                self.next, self.shape[0]
            )));
        }
        Ok(self.next)
    }
}

impl ShotSink for NpyShotWriter {
    fn write_shot(&mut self, index: usize, data: &[f32]) -> Result<()> {
        if index != self.next || index >= self.shape[0] {
            return Err(ModelingError::Protocol(format!(
                "shot {} written out of order, expected {}",
                index, self.next
            )));
        }
        let block = self.shape[1] * self.shape[2];
        if data.len() != block {
            return Err(ModelingError::ShapeMismatch {
                expected: vec![self.shape[1], self.shape[2]],
                got: vec![data.len()],
            });
        }
        for &v in data {
            self.writer.write_all(&v.to_le_bytes())?;
        }
        self.next += 1;
        Ok(())
    }
}

/// NPY v1.0 preamble and dictionary for a C-order `<f4` array, padded to a
/// multiple of 64 bytes.
fn npy_header(shape: &[usize]) -> Vec<u8> {
    let dims = match shape {
        [n] => format!("({},)", n),
        _ => format!(
            "({})",
            shape
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': {}, }}",
        dims
    );
    // magic (6) + version (2) + length (2)
    let preamble = 10;
    let total = (preamble + dict.len() + 1).div_ceil(64) * 64;
    let pad = total - preamble - dict.len() - 1;
    dict.extend(std::iter::repeat(' ').take(pad));
    dict.push('\n');

    let mut header = Vec::with_capacity(total);
    header.extend_from_slice(b"\x93NUMPY");
    header.extend_from_slice(&[1, 0]);
    header.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    header.extend_from_slice(dict.as_bytes());
    header
}
