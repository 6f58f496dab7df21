//! Wiring between files, the transformer or worker, and the caller
//!
//! The core components stay stateless between passes; the orchestrator
//! owns the cross-call state, currently the result of the last
//! processed file, which callers query before starting a print.

use std::path::Path;

use tracing::info;

use printkit_core::{PostProcessConfig, Result};
use printkit_postprocess::TransformReport;
use printkit_worker::SuccessPayload;

/// Entry point wiring one configuration to both processing paths
#[derive(Debug, Default)]
pub struct Orchestrator {
    config: PostProcessConfig,
    last_result: Option<SuccessPayload>,
}

impl Orchestrator {
    pub fn new(config: PostProcessConfig) -> Self {
        Self {
            config,
            last_result: None,
        }
    }

    pub fn config(&self) -> &PostProcessConfig {
        &self.config
    }

    /// Verdict of the most recent worker run, cleared on failure
    pub fn last_result(&self) -> Option<&SuccessPayload> {
        self.last_result.as_ref()
    }

    /// Run the external worker over a file and cache its verdict
    pub async fn process_with_worker(&mut self, path: &Path) -> Result<&SuccessPayload> {
        self.last_result = None;
        let payload = printkit_worker::run_worker(path, &self.config).await?;
        info!(
            path = %path.display(),
            printability = %payload.printability,
            "worker run complete"
        );
        Ok(self.last_result.insert(payload))
    }

    /// Run the in-process transformation pass over a file
    ///
    /// Yields the thread periodically so a cooperative host stays
    /// responsive during large programs.
    pub fn process_in_process(&self, path: &Path) -> Result<TransformReport> {
        printkit_postprocess::process_file_paced(path, &self.config, &mut std::thread::yield_now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn in_process_path_reports_transformation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("print.gcode");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "; generated by PrusaSlicer 2.7.1 on 2024-01-01").unwrap();
        writeln!(file, "START_PRINT INITIAL_TOOL=0").unwrap();
        writeln!(file, "T0").unwrap();
        writeln!(file, "G1 X10 Y10 F3000").unwrap();
        drop(file);

        let orchestrator = Orchestrator::new(PostProcessConfig::default());
        let report = orchestrator.process_in_process(&path).unwrap();
        assert_eq!(report.first_motion, Some((10.0, 10.0)));
    }

    #[tokio::test]
    async fn failed_worker_run_clears_cached_result() {
        let config = PostProcessConfig {
            worker_command: "/nonexistent/printkit-postprocessor".to_string(),
            ..Default::default()
        };
        let mut orchestrator = Orchestrator::new(config);
        let path = Path::new("/tmp/print.gcode");

        assert!(orchestrator.process_with_worker(path).await.is_err());
        assert!(orchestrator.last_result().is_none());
    }
}
