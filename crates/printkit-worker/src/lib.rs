//! External post-processing worker integration
//!
//! The worker is a black box invoked per file; it reports progress and
//! its final printability verdict as newline-delimited JSON on stdout.
//! This crate decodes that stream incrementally, folds it into a job
//! decision, and supervises the worker process under a hard deadline.

pub mod event;
pub mod job;
pub mod runner;
pub mod stream;

pub use event::{
    format_eta, AnalysisResult, GcodeInfo, PostProcessEvent, Printability, ProgressPayload,
    SuccessPayload,
};
pub use job::JobMonitor;
pub use runner::{build_args, run_worker};
pub use stream::EventDecoder;
