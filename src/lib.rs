//! # Printkit
//!
//! G-code preparation tooling for dual-toolhead and multi-material
//! printers:
//! - Single-pass toolshift correction with metadata extraction
//! - External post-processing worker supervision over a JSON-lines
//!   event protocol
//! - Bed mesh profile management and scan compensation
//!
//! ## Architecture
//!
//! Printkit is organized as a workspace with multiple crates:
//!
//! 1. **printkit-core** - Configuration and error types
//! 2. **printkit-postprocess** - In-process G-code transformation pass
//! 3. **printkit-worker** - Worker runner and event stream interpreter
//! 4. **printkit-mesh** - Mesh grids, profiles, compensation
//! 5. **printkit** - Main binary that integrates all crates

pub mod orchestrator;

pub use orchestrator::Orchestrator;

pub use printkit_core::{
    Error, MeshError, PostProcessConfig, Result, ToolCommandStyle, TransformError, WorkerError,
};

pub use printkit_postprocess::{
    is_already_processed, process_file, transform, LineBuffer, SlicerFamily, SlicerIdentity,
    TransformReport,
};

pub use printkit_worker::{
    format_eta, run_worker, EventDecoder, JobMonitor, PostProcessEvent, Printability,
    SuccessPayload,
};

pub use printkit_mesh::{
    compensate, compensate_profile, CompensationMode, MeshGrid, MeshProfile, ProfileStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
