//! Out-of-process post-processing job runner
//!
//! Spawns the external worker, polls it on a short interval while
//! decoding its stdout as protocol events, and enforces a hard deadline
//! on the whole job. Timeout kills the worker; a non-zero exit after a
//! clean stream teardown surfaces the worker's stderr.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::info;

use printkit_core::{PostProcessConfig, Result, WorkerError};

use crate::event::SuccessPayload;
use crate::job::JobMonitor;
use crate::stream::EventDecoder;

/// Command-line arguments for one worker invocation
pub fn build_args(path: &Path, config: &PostProcessConfig) -> Vec<String> {
    let mut args = vec!["postprocess".to_string(), "--non-interactive".to_string()];
    if config.idex {
        args.push("--idex".to_string());
    }
    if config.apply_corrections {
        args.push("--overwrite-input".to_string());
    }
    if config.allow_unsupported_slicer_versions {
        args.push("--allow-unsupported-slicer-versions".to_string());
    }
    if config.allow_unknown_generator {
        args.push("--allow-unknown-generator".to_string());
    }
    args.push(path.display().to_string());
    args
}

/// Run the external worker over one file and return its final verdict
pub async fn run_worker(path: &Path, config: &PostProcessConfig) -> Result<SuccessPayload> {
    let args = build_args(path, config);
    info!(
        command = %config.worker_command,
        path = %path.display(),
        "starting post-processing worker"
    );

    let mut command = Command::new(&config.worker_command);
    command
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|reason| WorkerError::Spawn {
        command: config.worker_command.clone(),
        reason: reason.to_string(),
    })?;

    drive(child, config).await
}

async fn drive(mut child: Child, config: &PostProcessConfig) -> Result<SuccessPayload> {
    let deadline = Instant::now() + Duration::from_secs(config.worker_timeout_secs);
    let poll = Duration::from_millis(config.poll_interval_ms);

    let mut stdout = child.stdout.take();
    let mut decoder = EventDecoder::new();
    let mut monitor = JobMonitor::new();
    let mut buf = vec![0u8; 4096];

    let status = loop {
        if Instant::now() >= deadline {
            child.start_kill().ok();
            let _ = child.wait().await;
            return Err(WorkerError::Timeout {
                timeout_secs: config.worker_timeout_secs,
            }
            .into());
        }

        if let Some(out) = stdout.as_mut() {
            match tokio::time::timeout(poll, out.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) => {
                    stdout = None;
                }
                Ok(Ok(n)) => {
                    for event in decoder.feed(&buf[..n]) {
                        monitor.handle(event);
                    }
                    continue;
                }
                // poll tick, nothing to read yet
                Err(_) => {}
            }
        } else {
            tokio::time::sleep(poll).await;
        }

        if let Some(status) = child.try_wait()? {
            break status;
        }
    };

    // drain whatever the worker flushed right before exiting
    if let Some(out) = stdout.as_mut() {
        let mut tail = Vec::new();
        if tokio::time::timeout(poll, out.read_to_end(&mut tail))
            .await
            .is_ok()
        {
            for event in decoder.feed(&tail) {
                monitor.handle(event);
            }
        }
    }

    if !status.success() {
        let mut stderr_text = String::new();
        if let Some(mut err) = child.stderr.take() {
            let _ = err.read_to_string(&mut stderr_text).await;
        }
        let stderr_text = stderr_text.trim().to_string();
        let stderr = if stderr_text.is_empty() {
            "worker exited abnormally".to_string()
        } else {
            stderr_text
        };
        return Err(WorkerError::Failed {
            exit_code: status.code(),
            stderr,
        }
        .into());
    }

    monitor
        .evaluate(config.allow_unknown_generator)
        .map(|payload| payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Printability;
    use printkit_core::Error;

    fn shell(script: &str) -> Child {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command.spawn().unwrap()
    }

    fn fast_config() -> PostProcessConfig {
        PostProcessConfig {
            poll_interval_ms: 10,
            worker_timeout_secs: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn collects_verdict_from_worker_stdout() {
        let child = shell(
            r#"printf '{"result":"progress","payload":{"percentage":50,"eta":10}}\n{"result":"success","payload":{"printability":"READY"}}\n'"#,
        );
        let payload = drive(child, &fast_config()).await.unwrap();
        assert_eq!(payload.printability, Printability::Ready);
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr() {
        let child = shell("echo oops >&2; exit 3");
        let err = drive(child, &fast_config()).await.unwrap_err();
        let Error::Worker(WorkerError::Failed { exit_code, stderr }) = err else {
            panic!("expected worker failure");
        };
        assert_eq!(exit_code, Some(3));
        assert_eq!(stderr, "oops");
    }

    #[tokio::test]
    async fn deadline_kills_the_worker() {
        let child = shell("sleep 30");
        let config = PostProcessConfig {
            worker_timeout_secs: 1,
            poll_interval_ms: 10,
            ..Default::default()
        };
        let err = drive(child, &config).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn unflagged_unknown_generator_fails_the_job() {
        let child = shell(
            r#"printf '{"result":"success","payload":{"printability":"UNKNOWN_GENERATOR"}}\n'"#,
        );
        let err = drive(child, &fast_config()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Worker(WorkerError::NotPrintable { .. })
        ));
    }

    #[test]
    fn builds_flags_from_config() {
        let config = PostProcessConfig {
            idex: true,
            allow_unknown_generator: true,
            ..Default::default()
        };
        let args = build_args(Path::new("/tmp/print.gcode"), &config);
        assert_eq!(
            args,
            vec![
                "postprocess",
                "--non-interactive",
                "--idex",
                "--overwrite-input",
                "--allow-unknown-generator",
                "/tmp/print.gcode"
            ]
        );
    }
}
