//! Wire protocol of the external post-processing worker
//!
//! The worker emits one JSON object per stdout line, tagged by a
//! `result` field. Payload records use camelCase keys on the wire.

use serde::{Deserialize, Serialize};

/// One decoded protocol event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum PostProcessEvent {
    /// Periodic progress update, advisory only
    Progress { payload: ProgressPayload },
    /// Advisory warning, never gates the job
    Warning { warning: String },
    /// Fatal worker-side error, aborts the job and clears any cached result
    Error { error: String },
    /// Final analysis result
    Success { payload: SuccessPayload },
    /// The worker is waiting on an external resource
    Waiting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    /// Percent complete, 0..=100
    pub percentage: u8,
    /// Estimated seconds remaining
    #[serde(default)]
    pub eta: u64,
}

/// The worker's verdict on whether the processed file is safe to print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Printability {
    Ready,
    NotReady,
    MustReprocess,
    Unsupported,
    UnknownGenerator,
}

impl std::fmt::Display for Printability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::NotReady => write!(f, "not ready"),
            Self::MustReprocess => write!(f, "must be reprocessed"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::UnknownGenerator => write!(f, "unknown generator"),
        }
    }
}

/// Final payload of a `success` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessPayload {
    pub printability: Printability,
    /// The worker's own idempotence check fired; the file needed no work
    #[serde(default)]
    pub was_already_processed: bool,
    #[serde(default)]
    pub gcode_info: Option<GcodeInfo>,
    #[serde(default)]
    pub analysis_result: Option<AnalysisResult>,
    /// Itemized reasons when the file is not printable
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcodeInfo {
    pub generator: String,
    pub generator_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub first_move_x: Option<f64>,
    #[serde(default)]
    pub first_move_y: Option<f64>,
    #[serde(default)]
    pub used_tools: Vec<String>,
    #[serde(default)]
    pub tool_change_count: Option<u64>,
}

/// Render an ETA in seconds as a compact human-readable string
pub fn format_eta(eta_secs: u64) -> String {
    if eta_secs < 60 {
        format!("{}s", eta_secs)
    } else if eta_secs < 3600 {
        format!("{}m {}s", eta_secs / 60, eta_secs % 60)
    } else {
        format!(
            "{}h {}m {}s",
            eta_secs / 3600,
            (eta_secs % 3600) / 60,
            eta_secs % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_progress_event() {
        let event: PostProcessEvent =
            serde_json::from_str(r#"{"result":"progress","payload":{"percentage":42,"eta":95}}"#)
                .unwrap();
        assert_eq!(
            event,
            PostProcessEvent::Progress {
                payload: ProgressPayload {
                    percentage: 42,
                    eta: 95
                }
            }
        );
    }

    #[test]
    fn parses_success_event_with_camel_case_payload() {
        let raw = r#"{
            "result": "success",
            "payload": {
                "printability": "READY",
                "wasAlreadyProcessed": false,
                "gcodeInfo": {"generator": "prusaslicer", "generatorVersion": "2.7.1"},
                "analysisResult": {
                    "firstMoveX": 10.5,
                    "firstMoveY": 20.0,
                    "usedTools": ["0", "1"],
                    "toolChangeCount": 3
                }
            }
        }"#;
        let event: PostProcessEvent = serde_json::from_str(raw).unwrap();
        let PostProcessEvent::Success { payload } = event else {
            panic!("expected success event");
        };
        assert_eq!(payload.printability, Printability::Ready);
        assert!(!payload.was_already_processed);
        let analysis = payload.analysis_result.unwrap();
        assert_eq!(analysis.first_move_x, Some(10.5));
        assert_eq!(analysis.used_tools, vec!["0", "1"]);
        assert_eq!(analysis.tool_change_count, Some(3));
    }

    #[test]
    fn waiting_event_tolerates_extra_fields() {
        let event: PostProcessEvent =
            serde_json::from_str(r#"{"result":"waiting","for":"file lock"}"#).unwrap();
        assert_eq!(event, PostProcessEvent::Waiting);
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert!(serde_json::from_str::<PostProcessEvent>(r#"{"result":"bogus"}"#).is_err());
    }

    #[test]
    fn formats_eta_tiers() {
        assert_eq!(format_eta(45), "45s");
        assert_eq!(format_eta(125), "2m 5s");
        assert_eq!(format_eta(3725), "1h 2m 5s");
    }
}
