//! Error handling for printkit
//!
//! Provides error types for all layers of the toolkit:
//! - Transform errors (in-process G-code pass)
//! - Worker errors (external post-processor runs)
//! - Mesh errors (grid validation and interpolation)
//!
//! All error types use `thiserror` for ergonomic error handling.
//! Protocol decode failures are deliberately *not* represented here:
//! malformed event lines are logged and dropped at the decoder level
//! and never abort a stream.

use thiserror::Error;

/// Transform error type
///
/// Represents fatal failures of the in-process G-code transformation pass.
/// Any of these means the file must not be printed as-is.
#[derive(Error, Debug, Clone)]
pub enum TransformError {
    /// A coordinate field on a motion line failed to parse as a number
    #[error("Can not parse coordinate at line {line_number}: {line:?}")]
    CoordinateParse {
        /// The 0-based index of the offending line.
        line_number: usize,
        /// The offending line text.
        line: String,
    },

    /// The file header identifies a slicer the transformer does not support
    #[error("Unsupported slicer: {name} {version}")]
    UnsupportedSlicer {
        /// The slicer name from the header comment.
        name: String,
        /// The slicer version from the header comment.
        version: String,
    },

    /// The program has no lines at all
    #[error("G-code file is empty")]
    EmptyProgram,

    /// Generic transform error
    #[error("Transform error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Worker error type
///
/// Represents failures of the out-of-process post-processor run.
/// Both variants are fatal for the current job and are never retried.
#[derive(Error, Debug, Clone)]
pub enum WorkerError {
    /// The worker did not complete before the deadline
    #[error("Post-processing timed out after {timeout_secs}s")]
    Timeout {
        /// The timeout ceiling in seconds.
        timeout_secs: u64,
    },

    /// The worker exited with a non-zero status
    #[error("Post-processing failed: {stderr}")]
    Failed {
        /// The worker's exit code, if one was reported.
        exit_code: Option<i32>,
        /// Captured standard-error text; the runner substitutes a generic
        /// message when the worker printed nothing.
        stderr: String,
    },

    /// The worker process could not be started
    #[error("Failed to spawn post-processor {command}: {reason}")]
    Spawn {
        /// The command that was invoked.
        command: String,
        /// The reason the spawn failed.
        reason: String,
    },

    /// The job was rejected by the printability policy
    #[error("File is not ready to print: {}", .reasons.join("; "))]
    NotPrintable {
        /// Itemized, operator-facing reasons.
        reasons: Vec<String>,
    },
}

/// Mesh error type
///
/// Represents failures of mesh profile handling and scan compensation.
/// A failed compensation leaves the previously active mesh untouched.
#[derive(Error, Debug, Clone)]
pub enum MeshError {
    /// A sample point fell outside the reference grid's physical rectangle
    #[error("Point ({x:.3}, {y:.3}) is outside mesh bounds ({min_x:.3}..{max_x:.3}, {min_y:.3}..{max_y:.3})")]
    OutOfBounds {
        /// The X coordinate being sampled.
        x: f64,
        /// The Y coordinate being sampled.
        y: f64,
        /// Minimum X of the reference grid.
        min_x: f64,
        /// Maximum X of the reference grid.
        max_x: f64,
        /// Minimum Y of the reference grid.
        min_y: f64,
        /// Maximum Y of the reference grid.
        max_y: f64,
    },

    /// Grid has fewer than 2 rows or columns, so no sampling step exists
    #[error("Degenerate mesh grid: {rows} rows x {cols} columns (minimum 2x2)")]
    DegenerateGrid {
        /// Number of rows in the grid.
        rows: usize,
        /// Number of columns in the grid.
        cols: usize,
    },

    /// Grid rows have inconsistent lengths
    #[error("Mesh grid is not rectangular: row {row} has {len} points, expected {expected}")]
    NotRectangular {
        /// The first offending row index.
        row: usize,
        /// The offending row's length.
        len: usize,
        /// The expected row length.
        expected: usize,
    },

    /// Named profile is not present in the store
    #[error("Mesh profile {name:?} not found")]
    ProfileNotFound {
        /// The requested profile name.
        name: String,
    },

    /// Target and reference grids disagree on shape where they must match
    #[error("Mesh shape mismatch: {reason}")]
    ShapeMismatch {
        /// Description of the mismatch.
        reason: String,
    },
}

/// Main error type for printkit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Transform error
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Worker error
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Mesh error
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a worker timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Worker(WorkerError::Timeout { .. }))
    }

    /// Check if this is a transform error
    pub fn is_transform_error(&self) -> bool {
        matches!(self, Error::Transform(_))
    }

    /// Check if this is a mesh error
    pub fn is_mesh_error(&self) -> bool {
        matches!(self, Error::Mesh(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_predicate() {
        let err: Error = WorkerError::Timeout { timeout_secs: 600 }.into();
        assert!(err.is_timeout());
        assert!(!err.is_mesh_error());
    }

    #[test]
    fn failed_message_includes_stderr() {
        let err = WorkerError::Failed {
            exit_code: Some(2),
            stderr: "bad input".to_string(),
        };
        assert_eq!(err.to_string(), "Post-processing failed: bad input");
    }

    #[test]
    fn coordinate_parse_carries_line() {
        let err = TransformError::CoordinateParse {
            line_number: 41,
            line: "G1 Xoops Y2".to_string(),
        };
        assert!(err.to_string().contains("41"));
        assert!(err.to_string().contains("Xoops"));
    }
}
