//! Slicer identification and slicer-specific annotation parsing
//!
//! Recognizes the `; generated by <slicer> <version> on <date>` header
//! comment and the per-slicer annotations the transformer needs:
//! wipe-tower acceleration hints, velocity-limit acceleration arguments,
//! and per-tool other-layer temperature lists.

use std::sync::OnceLock;

use regex::Regex;

use crate::line_buffer::LineBuffer;

/// Known slicer families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlicerFamily {
    PrusaSlicer,
    SuperSlicer,
    OrcaSlicer,
    /// Header missing or generator not recognized
    Unknown,
}

impl SlicerFamily {
    /// Whether the transformer knows how to correct this slicer's output
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl std::fmt::Display for SlicerFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrusaSlicer => write!(f, "prusaslicer"),
            Self::SuperSlicer => write!(f, "superslicer"),
            Self::OrcaSlicer => write!(f, "orcaslicer"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Slicer identity derived once from the program header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicerIdentity {
    /// Generator family
    pub family: SlicerFamily,
    /// Generator version string, empty when unknown
    pub version: String,
}

impl SlicerIdentity {
    /// Detect the slicer from the first two header lines
    ///
    /// Slicers emit `; generated by <name> <version> on <date>` as the
    /// first line, or the second when a thumbnail block precedes it.
    pub fn detect(buffer: &LineBuffer) -> Self {
        const HEADER_PREFIX: &str = "; generated by ";

        for idx in 0..2 {
            let line = buffer.normalized(idx);
            if !line.to_lowercase().starts_with(HEADER_PREFIX) {
                continue;
            }
            let rest = &line[HEADER_PREFIX.len()..];
            let generator = rest.split(" on ").next().unwrap_or(rest);
            let mut tokens = generator.split_whitespace();
            let name = tokens.next().unwrap_or_default().to_lowercase();
            let version = tokens.next().unwrap_or_default().to_string();

            let family = match name.as_str() {
                "prusaslicer" => SlicerFamily::PrusaSlicer,
                "superslicer" => SlicerFamily::SuperSlicer,
                "orcaslicer" => SlicerFamily::OrcaSlicer,
                _ => SlicerFamily::Unknown,
            };
            return Self { family, version };
        }

        Self {
            family: SlicerFamily::Unknown,
            version: String::new(),
        }
    }
}

/// Parse a PrusaSlicer wipe-tower acceleration hint
///
/// `; wipe_tower_acceleration = 1800` -> `Some(1800)`
pub fn wipe_tower_acceleration(line: &str) -> Option<u32> {
    line.strip_prefix("; wipe_tower_acceleration = ")?
        .trim()
        .parse()
        .ok()
}

/// Extract the ACCEL argument from a `SET_VELOCITY_LIMIT` command
pub fn velocity_limit_accel(line: &str) -> Option<u32> {
    static ACCEL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex =
        ACCEL_REGEX.get_or_init(|| Regex::new(r"ACCEL=(\d+)").expect("invalid regex pattern"));
    regex
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Extract the per-tool other-layer temperature list from a start-print line
///
/// `... EXTRUDER_OTHER_LAYER_TEMP=215,205 ...` -> `Some(["215", "205"])`
pub fn other_layer_temps(start_line: &str) -> Option<Vec<String>> {
    static TEMP_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = TEMP_REGEX
        .get_or_init(|| Regex::new(r"EXTRUDER_OTHER_LAYER_TEMP=([\d,]+)").expect("invalid regex pattern"));
    let caps = regex.captures(start_line)?;
    Some(
        caps.get(1)?
            .as_str()
            .split(',')
            .map(|s| s.to_string())
            .collect(),
    )
}

/// Extract the INITIAL_TOOL parameter from a start-print line
pub fn initial_tool(start_line: &str) -> Option<String> {
    let idx = start_line.find("INITIAL_TOOL=")?;
    start_line[idx + "INITIAL_TOOL=".len()..]
        .split_whitespace()
        .next()
        .map(|s| s.to_string())
}

/// Whether a line is a bare tool-select token: `T` followed solely by digits
pub fn is_tool_select(line: &str) -> bool {
    line.strip_prefix('T')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}
