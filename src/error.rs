// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

/// Errors that can occur during model setup, I/O, modeling, or gathering.
#[derive(Debug)]
pub enum ModelingError {
    /// Grid shape is invalid (dimension is zero).
    InvalidGridShape {
        /// The axis index (0 = lateral, 1 = depth).
        axis: usize,
        /// The size provided.
        size: usize,
    },
    /// Array shape does not match expected shape.
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape encountered.
        got: Vec<usize>,
    },
    /// Velocity value is not positive and finite.
    InvalidVelocity {
        /// The flat index of the invalid value.
        index: usize,
        /// The invalid value.
        value: f32,
    },
    /// A scalar parameter is out of its valid range.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Explanation of the constraint that was violated.
        reason: String,
    },
    /// Sources or receivers fall outside the computing zone.
    GeometryOutOfBounds {
        /// Which line is out of bounds ("sources" or "receivers").
        what: &'static str,
        /// Last generated (x, z) position.
        last: (i64, i64),
        /// Grid extent (nx, nz).
        extent: (usize, usize),
    },
    /// Bandpass corner frequencies are inconsistent.
    InvalidFilterBand {
        /// Low cutoff in Hz.
        flo: f32,
        /// High cutoff in Hz.
        fhi: f32,
        /// Nyquist frequency in Hz.
        nyquist: f32,
    },
    /// A shot was advanced past its last time step.
    StepOverflow {
        /// Number of time steps of the shot.
        nt: usize,
    },
    /// The shot gather protocol was violated or a rank went away.
    Protocol(String),
    /// Unsupported data type in file.
    UnsupportedDtype(String),
    /// Unsupported file format (unrecognized extension).
    UnsupportedFileFormat(String),
    /// Expected MAT variable not found in file.
    MatVariableNotFound {
        /// The variable name that was requested.
        expected: String,
        /// The variable names that are available.
        available: Vec<String>,
    },
    /// I/O error occurred.
    IoError(std::io::Error),
    /// Other error with a descriptive message.
    Other(String),
}

impl fmt::Display for ModelingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelingError::InvalidGridShape { axis, size } => {
                write!(
                    f,
                    "invalid grid shape: axis {} has size {} (must be >= 1)",
                    axis, size
                )
            }
            ModelingError::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: expected {:?}, got {:?}", expected, got)
            }
            ModelingError::InvalidVelocity { index, value } => {
                write!(
                    f,
                    "invalid velocity at index {}: {} (must be positive and finite)",
                    index, value
                )
            }
            ModelingError::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter {}: {}", name, reason)
            }
            ModelingError::GeometryOutOfBounds { what, last, extent } => {
                write!(
                    f,
                    "{} exceed the computing zone: last position (x={}, z={}) outside {}x{}",
                    what, last.0, last.1, extent.0, extent.1
                )
            }
            ModelingError::InvalidFilterBand { flo, fhi, nyquist } => {
                write!(
                    f,
                    "invalid filter band: need 0 <= flo < fhi <= Nyquist, got flo={}, fhi={}, Nyquist={}",
                    flo, fhi, nyquist
                )
            }
            ModelingError::StepOverflow { nt } => {
                write!(f, "shot already advanced through all {} time steps", nt)
            }
            ModelingError::Protocol(msg) => write!(f, "gather protocol error: {}", msg),
            ModelingError::UnsupportedDtype(dtype) => {
                write!(f, "unsupported dtype: {}", dtype)
            }
            ModelingError::UnsupportedFileFormat(ext) => {
                write!(f, "unsupported file format: {}", ext)
            }
            ModelingError::MatVariableNotFound {
                expected,
                available,
            } => {
                write!(
                    f,
                    "MAT variable '{}' not found; available variables: {:?}",
                    expected, available
                )
            }
            ModelingError::IoError(e) => write!(f, "I/O error: {}", e),
            ModelingError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ModelingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelingError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ModelingError {
    fn from(e: std::io::Error) -> Self {
        ModelingError::IoError(e)
    }
}

/// Convenience type alias for Results with ModelingError.
pub type Result<T> = std::result::Result<T, ModelingError>;
