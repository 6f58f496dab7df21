//! # Printkit Core
//!
//! Core types, errors, and configuration for printkit.
//! Provides the error taxonomy shared by the transformer, the worker
//! event stream, and the mesh compensator, plus the immutable
//! configuration record handed to a pass at start.

pub mod config;
pub mod error;

pub use config::{PostProcessConfig, ToolCommandStyle};
pub use error::{Error, MeshError, Result, TransformError, WorkerError};
