//! Job-control interpretation of the worker's event stream

use tracing::{error, info, warn};

use printkit_core::{Result, WorkerError};

use crate::event::{format_eta, PostProcessEvent, Printability, SuccessPayload};

/// Folds the event stream into a job outcome
///
/// `error` events abort the job and clear any previously cached result;
/// `warning` and `progress` are advisory; the last `success` payload
/// wins. The monitor holds no reference to the worker process itself.
#[derive(Debug, Default)]
pub struct JobMonitor {
    result: Option<SuccessPayload>,
    errors: Vec<String>,
    warnings: Vec<String>,
    progress: Option<(u8, u64)>,
}

impl JobMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, event: PostProcessEvent) {
        match event {
            PostProcessEvent::Progress { payload } => {
                info!(
                    percentage = payload.percentage,
                    eta = %format_eta(payload.eta),
                    "post-processing progress"
                );
                self.progress = Some((payload.percentage, payload.eta));
            }
            PostProcessEvent::Warning { warning } => {
                warn!(%warning, "post-processor warning");
                self.warnings.push(warning);
            }
            PostProcessEvent::Error { error } => {
                error!(%error, "post-processor error");
                self.result = None;
                self.errors.push(error);
            }
            PostProcessEvent::Success { payload } => {
                if payload.was_already_processed {
                    info!("file already processed, continuing");
                } else if let Some(info) = &payload.gcode_info {
                    info!(
                        generator = %info.generator,
                        version = %info.generator_version,
                        "post-processing completed"
                    );
                }
                self.result = Some(payload);
            }
            PostProcessEvent::Waiting => {
                info!("post-processor waiting");
            }
        }
    }

    /// Last observed progress, as (percentage, eta seconds)
    pub fn progress(&self) -> Option<(u8, u64)> {
        self.progress
    }

    /// Warnings received so far
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Decide whether the job may proceed to printing.
    ///
    /// Only a `READY` verdict passes; `UNKNOWN_GENERATOR` passes when
    /// the caller explicitly allows it. Everything else, including an
    /// aborted or resultless stream, is a `NotPrintable` failure with
    /// itemized reasons.
    pub fn evaluate(&self, allow_unknown_generator: bool) -> Result<&SuccessPayload> {
        if !self.errors.is_empty() {
            return Err(WorkerError::NotPrintable {
                reasons: self.errors.clone(),
            }
            .into());
        }

        let Some(payload) = &self.result else {
            return Err(WorkerError::NotPrintable {
                reasons: vec!["post-processor reported no result".to_string()],
            }
            .into());
        };

        match payload.printability {
            Printability::Ready => Ok(payload),
            Printability::UnknownGenerator if allow_unknown_generator => Ok(payload),
            verdict => {
                let mut reasons = payload.reasons.clone();
                if reasons.is_empty() {
                    reasons.push(format!("file is not printable: {}", verdict));
                }
                Err(WorkerError::NotPrintable { reasons }.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ProgressPayload;
    use printkit_core::Error;

    fn success(printability: Printability) -> PostProcessEvent {
        PostProcessEvent::Success {
            payload: SuccessPayload {
                printability,
                was_already_processed: false,
                gcode_info: None,
                analysis_result: None,
                reasons: Vec::new(),
            },
        }
    }

    #[test]
    fn ready_verdict_passes() {
        let mut monitor = JobMonitor::new();
        monitor.handle(success(Printability::Ready));
        assert!(monitor.evaluate(false).is_ok());
    }

    #[test]
    fn unknown_generator_needs_explicit_allow() {
        let mut monitor = JobMonitor::new();
        monitor.handle(success(Printability::UnknownGenerator));
        assert!(monitor.evaluate(false).is_err());
        assert!(monitor.evaluate(true).is_ok());
    }

    #[test]
    fn error_event_clears_cached_result() {
        let mut monitor = JobMonitor::new();
        monitor.handle(success(Printability::Ready));
        monitor.handle(PostProcessEvent::Error {
            error: "disk full".to_string(),
        });

        let err = monitor.evaluate(false).unwrap_err();
        let Error::Worker(WorkerError::NotPrintable { reasons }) = err else {
            panic!("expected not-printable error");
        };
        assert_eq!(reasons, vec!["disk full".to_string()]);
    }

    #[test]
    fn resultless_stream_is_not_printable() {
        let monitor = JobMonitor::new();
        assert!(monitor.evaluate(false).is_err());
    }

    #[test]
    fn warnings_and_progress_are_advisory() {
        let mut monitor = JobMonitor::new();
        monitor.handle(PostProcessEvent::Warning {
            warning: "thin walls".to_string(),
        });
        monitor.handle(PostProcessEvent::Progress {
            payload: ProgressPayload {
                percentage: 80,
                eta: 12,
            },
        });
        monitor.handle(success(Printability::Ready));

        assert!(monitor.evaluate(false).is_ok());
        assert_eq!(monitor.progress(), Some((80, 12)));
        assert_eq!(monitor.warnings(), ["thin walls".to_string()]);
    }
}
