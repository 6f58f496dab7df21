//! Single-pass G-code toolshift transformer
//!
//! Rewrites a sliced program so that tool changes on dual-toolhead and
//! multi-material printers happen as one atomic command: retraction and
//! lift moves around the change are stripped (unless a purge tower
//! already handles them) and the next travel target is folded into the
//! tool-select line. Along the way the pass collects the metadata the
//! start-print macro needs: first motion coordinates, X bounds, tool-use
//! order, and the discounted toolshift count.
//!
//! The pass is strictly single forward over the line buffer; every
//! concern below runs concurrently over the same index rather than as
//! mutually exclusive phases. Window scans around a tool change are
//! bounded and clamped to the program.

use tracing::{debug, info};

use printkit_core::{PostProcessConfig, Result, ToolCommandStyle, TransformError};

use crate::line_buffer::LineBuffer;
use crate::slicer::{self, SlicerFamily, SlicerIdentity};

/// Marker appended to a line rewritten by the transformer, followed by
/// the original text
pub const CHANGED_MARKER: &str = " ; Changed by printkit post processor: ";
/// Marker prefixed to a line removed (commented out) by the transformer
pub const REMOVED_MARKER: &str = "; Removed by printkit post processor: ";
/// Trailer line appended once when the file was modified; its presence
/// makes a second pass a no-op
pub const PROCESSED_TRAILER: &str = "; processed by printkit";

/// Lookbehind/lookahead window around a tool change, in lines
const TOOLSHIFT_WINDOW: usize = 20;
/// Backward search window for the purge-tower start marker, in lines
const TOWER_SEARCH_WINDOW: usize = 100;
/// Duplicate-command search window below the temperature anchor, in lines
const TEMP_DUPLICATE_WINDOW: usize = 10;

/// Purge-tower lookup cache
///
/// Searched once per pass, from the first toolshift; the result holds
/// for every subsequent toolshift. `NoTower` is distinct from
/// `Unsearched` so the 100-line scan runs at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TowerSearch {
    Unsearched,
    NoTower,
    Found(usize),
}

/// Per-pass accumulation state, created at pass start and folded into
/// the report at pass end
#[derive(Debug)]
struct TransformState {
    start_print_line: Option<usize>,
    toolshift_count: usize,
    used_tools: Vec<String>,
    min_x: f64,
    max_x: f64,
    first_motion: Option<(f64, f64)>,
    wipe_tower_acceleration: Option<u32>,
    tower: TowerSearch,
    extruder_temps_line: Option<usize>,
    extruder_temps: Vec<String>,
}

impl TransformState {
    fn new() -> Self {
        Self {
            start_print_line: None,
            toolshift_count: 0,
            used_tools: Vec::new(),
            min_x: f64::INFINITY,
            max_x: 0.0,
            first_motion: None,
            wipe_tower_acceleration: None,
            tower: TowerSearch::Unsearched,
            extruder_temps_line: None,
            extruder_temps: Vec::new(),
        }
    }
}

/// Outcome of one transformation pass
#[derive(Debug, Clone, PartialEq)]
pub struct TransformReport {
    /// Slicer identity from the header
    pub slicer: SlicerIdentity,
    /// Tool changes after discounting the initial selection
    pub toolshift_count: usize,
    /// Distinct tools in first-use order, initial tool first
    pub used_tools: Vec<String>,
    /// First post-start motion with both X and Y present
    pub first_motion: Option<(f64, f64)>,
    /// Extrema of X coordinates seen after the start-print line
    pub x_bounds: Option<(f64, f64)>,
    /// Wipe-tower acceleration hint, when the slicer emitted one
    pub wipe_tower_acceleration: Option<u32>,
    /// Whether any line was rewritten or appended
    pub changed: bool,
    /// Whether the file carried the processed trailer before the pass
    pub already_processed: bool,
}

impl TransformReport {
    /// Report for a file skipped because it carries the processed trailer
    pub(crate) fn already_processed(slicer: SlicerIdentity) -> Self {
        let mut report = Self::new(slicer);
        report.already_processed = true;
        report
    }

    fn new(slicer: SlicerIdentity) -> Self {
        Self {
            slicer,
            toolshift_count: 0,
            used_tools: Vec::new(),
            first_motion: None,
            x_bounds: None,
            wipe_tower_acceleration: None,
            changed: false,
            already_processed: false,
        }
    }
}

/// Pure idempotence predicate: the trailer on the last line marks a
/// file that has already been through the transformer
pub fn is_already_processed(buffer: &LineBuffer) -> bool {
    buffer
        .last_line()
        .is_some_and(|l| l.trim_end().to_lowercase().starts_with(PROCESSED_TRAILER))
}

/// Run one transformation pass over the buffer
pub fn transform(buffer: &mut LineBuffer, config: &PostProcessConfig) -> Result<TransformReport> {
    transform_paced(buffer, config, &mut || {})
}

/// Run one transformation pass, ceding control through `pacer` every
/// `config.yield_every_lines` processed lines
pub fn transform_paced(
    buffer: &mut LineBuffer,
    config: &PostProcessConfig,
    pacer: &mut dyn FnMut(),
) -> Result<TransformReport> {
    GcodeTransformer::new(buffer, config).run(pacer)
}

/// The transformation state machine
///
/// Owns the buffer exclusively for the duration of one pass; discarded
/// at pass end. No state survives between passes.
struct GcodeTransformer<'a> {
    buffer: &'a mut LineBuffer,
    config: &'a PostProcessConfig,
    slicer: SlicerIdentity,
    state: TransformState,
    changed: bool,
}

impl<'a> GcodeTransformer<'a> {
    fn new(buffer: &'a mut LineBuffer, config: &'a PostProcessConfig) -> Self {
        let slicer = SlicerIdentity::detect(buffer);
        Self {
            buffer,
            config,
            slicer,
            state: TransformState::new(),
            changed: false,
        }
    }

    fn run(mut self, pacer: &mut dyn FnMut()) -> Result<TransformReport> {
        if self.buffer.is_empty() {
            return Err(TransformError::EmptyProgram.into());
        }

        // Boundary policy: without corrections an unknown generator just
        // means there is nothing to extract; with corrections it is fatal
        // unless the caller explicitly allows unknown generators.
        if !self.config.apply_corrections && self.slicer.family == SlicerFamily::Unknown {
            return Ok(TransformReport::new(self.slicer));
        }
        if self.config.apply_corrections
            && !self.slicer.family.is_supported()
            && !self.config.allow_unknown_generator
        {
            return Err(TransformError::UnsupportedSlicer {
                name: self.slicer.family.to_string(),
                version: self.slicer.version.clone(),
            }
            .into());
        }

        debug!(
            slicer = %self.slicer.family,
            version = %self.slicer.version,
            lines = self.buffer.len(),
            "starting transformation pass"
        );

        let mut pause_counter = 0usize;
        for idx in 0..self.buffer.len() {
            pause_counter += 1;
            if pause_counter == self.config.yield_every_lines {
                pause_counter = 0;
                pacer();
            }

            let line = self.buffer.normalized(idx);

            self.scan_wipe_tower_hint(&line);
            self.scan_start_print(idx, &line);
            self.scan_extruder_temps(idx, &line);
            self.fix_velocity_limit(idx, &line);
            self.count_toolshift(idx, &line);
            self.collect_used_tools(&line);

            if self.scan_first_motion(idx, &line)? {
                // Early exit: coordinates are all the caller needs
                return Ok(self.into_report());
            }

            self.accumulate_x_bounds(idx, &line)?;
            self.correct_toolshift(idx);
        }

        self.finalize();

        info!(
            used_tools = %self.state.used_tools.join(","),
            toolshifts = self.state.toolshift_count.saturating_sub(1),
            slicer = %self.slicer.family,
            "transformation pass complete"
        );

        Ok(self.into_report())
    }

    /// PrusaSlicer emits the wipe-tower acceleration as a header comment
    fn scan_wipe_tower_hint(&mut self, line: &str) {
        if !self.config.apply_corrections
            || self.slicer.family != SlicerFamily::PrusaSlicer
            || self.state.wipe_tower_acceleration.is_some()
        {
            return;
        }
        if let Some(accel) = slicer::wipe_tower_acceleration(line) {
            self.state.wipe_tower_acceleration = Some(accel);
        }
    }

    /// Locate the start-print line; set-once
    fn scan_start_print(&mut self, idx: usize, line: &str) {
        if self.state.start_print_line.is_some() {
            return;
        }
        if line.starts_with("START_PRINT") || line.starts_with("RMMU_START_PRINT") {
            self.state.start_print_line = Some(idx);
            // Coordinate-only runs must leave every line untouched
            if self.config.apply_corrections {
                // fix color variable format
                if line.contains('#') {
                    self.buffer.set(idx, line.replace('#', ""));
                    self.changed = true;
                }
                if let Some(tool) = slicer::initial_tool(line) {
                    self.state.used_tools.push(tool);
                }
            }
        }
    }

    /// SuperSlicer and OrcaSlicer set the other-layer temperature on the
    /// wrong toolhead; remember the layer-2 anchor and the temperatures
    fn scan_extruder_temps(&mut self, idx: usize, line: &str) {
        if !self.config.apply_corrections || self.state.extruder_temps_line.is_some() {
            return;
        }
        let Some(start) = self.state.start_print_line else {
            return;
        };
        if !matches!(
            self.slicer.family,
            SlicerFamily::SuperSlicer | SlicerFamily::OrcaSlicer
        ) {
            return;
        }
        if line.starts_with("_ON_LAYER_CHANGE LAYER=2") {
            self.state.extruder_temps_line = Some(idx);
            if let Some(temps) = slicer::other_layer_temps(&self.buffer.normalized(start)) {
                self.state.extruder_temps = temps;
            }
        }
    }

    /// OrcaSlicer emits SET_VELOCITY_LIMIT where the firmware expects M204
    fn fix_velocity_limit(&mut self, idx: usize, line: &str) {
        if !self.config.apply_corrections
            || self.state.start_print_line.is_none()
            || self.slicer.family != SlicerFamily::OrcaSlicer
        {
            return;
        }
        if line.starts_with("SET_VELOCITY_LIMIT") {
            if let Some(accel) = slicer::velocity_limit_accel(line) {
                self.buffer
                    .set(idx, format!("M204 S{}{}{}", accel, CHANGED_MARKER, line));
                self.changed = true;
            }
        }
    }

    /// Count tool selections; the first one reflects the pre-selected
    /// initial tool, not a real shift, and is commented out
    fn count_toolshift(&mut self, idx: usize, line: &str) {
        if !self.config.apply_corrections || self.state.start_print_line.is_none() {
            return;
        }
        if slicer::is_tool_select(line) {
            if self.state.toolshift_count == 0 {
                self.buffer
                    .set(idx, format!("{}{}", REMOVED_MARKER, line));
                self.changed = true;
            }
            self.state.toolshift_count += 1;
        }
    }

    /// Record distinct tools in first-use order, initial tool first
    fn collect_used_tools(&mut self, line: &str) {
        if !self.config.apply_corrections || self.state.start_print_line.is_none() {
            return;
        }
        if slicer::is_tool_select(line) {
            let tool = line[1..].to_string();
            if !self.state.used_tools.contains(&tool) {
                self.state.used_tools.push(tool);
            }
        }
    }

    /// Capture the first post-start motion carrying both X and Y.
    ///
    /// Returns true when running without corrections and the pair was
    /// just captured, which ends the pass.
    fn scan_first_motion(&mut self, idx: usize, line: &str) -> Result<bool> {
        if self.state.start_print_line.is_none() || self.state.first_motion.is_some() {
            return Ok(false);
        }
        if !line.starts_with("G1") && !line.starts_with("G0") {
            return Ok(false);
        }

        let mut x = None;
        let mut y = None;
        for token in line.split(' ') {
            let lower = token.to_lowercase();
            if let Some(rest) = lower.strip_prefix('x') {
                x = Some(parse_coordinate(rest, idx, line)?);
            } else if let Some(rest) = lower.strip_prefix('y') {
                y = Some(parse_coordinate(rest, idx, line)?);
            }
        }

        if let (Some(x), Some(y)) = (x, y) {
            self.state.first_motion = Some((x, y));
            if !self.config.apply_corrections {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Keep X extrema over every post-start motion line
    fn accumulate_x_bounds(&mut self, idx: usize, line: &str) -> Result<()> {
        if !self.config.apply_corrections || self.state.start_print_line.is_none() {
            return Ok(());
        }
        if !line.starts_with("G1") && !line.starts_with("G0") {
            return Ok(());
        }
        for token in line.split(' ') {
            let lower = token.to_lowercase();
            if let Some(rest) = lower.strip_prefix('x') {
                let x = parse_coordinate(rest, idx, line)?;
                if x < self.state.min_x {
                    self.state.min_x = x;
                }
                if x > self.state.max_x {
                    self.state.max_x = x;
                }
            }
        }
        Ok(())
    }

    /// Rewrite a tool-select line into one atomic toolshift command.
    ///
    /// Rereads the buffer rather than the pre-pass line text: the first
    /// (discounted) selection has just been commented out and must not
    /// be corrected.
    fn correct_toolshift(&mut self, idx: usize) {
        if !self.config.apply_corrections
            || self.state.toolshift_count == 0
            || self.state.start_print_line.is_none()
        {
            return;
        }
        let current = self.buffer.normalized(idx);
        if !slicer::is_tool_select(&current) {
            return;
        }

        // Purge tower lookup, cached for the rest of the pass
        if self.state.tower == TowerSearch::Unsearched {
            self.state.tower = TowerSearch::NoTower;
            for back in self.buffer.window_back(idx, TOWER_SEARCH_WINDOW) {
                if self
                    .buffer
                    .normalized(back)
                    .starts_with("; CP TOOLCHANGE START")
                {
                    self.state.tower = TowerSearch::Found(back);
                    break;
                }
            }
        }
        let has_tower = matches!(self.state.tower, TowerSearch::Found(_));

        // Before the change: strip retraction and lift, the rewritten
        // tool-select repositions in one move. The purge tower does its
        // own retraction, so skip when one encloses the change.
        if !has_tower {
            for back in self.buffer.window_back(idx, TOOLSHIFT_WINDOW) {
                let s = self.buffer.normalized(back);
                if s.starts_with("G1 X") || s.starts_with("G1 Y") {
                    break;
                }
                if s.starts_with("G1 E") || s.starts_with("G1 Z") {
                    self.buffer.set(back, format!("{}{}", REMOVED_MARKER, s));
                }
            }
        }

        // After the change: capture the next XY target (kept in place),
        // and without a tower capture-and-remove the next Z plus any
        // intervening extrusion moves.
        let mut move_x = String::new();
        let mut move_y = String::new();
        let mut move_z = String::new();
        let mut xy_found = false;
        let mut z_found = false;
        for fwd in self.buffer.window_forward(idx, TOOLSHIFT_WINDOW) {
            let s = self.buffer.normalized(fwd);

            if xy_found && (s.starts_with("G1 X") || s.starts_with("G1 Y")) {
                break;
            }

            if s.starts_with("G1 X") {
                xy_found = true;
                let parts: Vec<&str> = s.split(' ').collect();
                if parts.len() > 2 && parts[1].starts_with('X') && parts[2].starts_with('Y') {
                    move_x = parts[1].to_string();
                    move_y = parts[2].to_string();
                }
            }

            if !has_tower {
                if s.starts_with("G1 E") {
                    self.buffer.set(fwd, format!("{}{}", REMOVED_MARKER, s));
                }
                if !z_found && s.starts_with("G1 Z") {
                    let parts: Vec<&str> = s.split(' ').collect();
                    if parts.len() > 1 && parts[1].starts_with('Z') {
                        z_found = true;
                        move_z = parts[1].to_string();
                        self.buffer.set(fwd, format!("{}{}", REMOVED_MARKER, s));
                    }
                }
            }
        }

        let rewritten = match self.config.tool_command_style {
            ToolCommandStyle::Bare => {
                let mut cmd = current.clone();
                for part in [&move_x, &move_y, &move_z] {
                    if !part.is_empty() {
                        cmd.push(' ');
                        cmd.push_str(part);
                    }
                }
                cmd
            }
            ToolCommandStyle::Mmu => {
                let mut cmd = format!("TOOL T={}", &current[1..]);
                for (part, axis) in [(&move_x, "X"), (&move_y, "Y"), (&move_z, "Z")] {
                    if !part.is_empty() {
                        cmd.push(' ');
                        cmd.push_str(&part.replacen(axis, &format!("{}=", axis), 1));
                    }
                }
                cmd
            }
        };
        self.buffer.set(idx, rewritten);
        self.changed = true;
    }

    /// Append the derived parameters to the start-print line and, when
    /// anything changed, the processed trailer to the program
    fn finalize(&mut self) {
        if !self.config.apply_corrections {
            return;
        }
        let Some(start) = self.state.start_print_line else {
            return;
        };

        if self.state.toolshift_count > 0 {
            self.append_to_line(
                start,
                &format!("TOTAL_TOOLSHIFTS={}", self.state.toolshift_count - 1),
            );
        }
        if let Some((x, y)) = self.state.first_motion {
            self.append_to_line(start, &format!("FIRST_X={} FIRST_Y={}", x, y));
        }
        if self.state.min_x.is_finite() {
            self.append_to_line(
                start,
                &format!("MIN_X={} MAX_X={}", self.state.min_x, self.state.max_x),
            );
        }
        if !self.state.used_tools.is_empty() {
            self.append_to_line(
                start,
                &format!("USED_TOOLS={}", self.state.used_tools.join(",")),
            );
            self.append_to_line(
                start,
                &format!(
                    "WIPE_ACCEL={}",
                    self.state.wipe_tower_acceleration.unwrap_or(0)
                ),
            );
            self.fix_other_layer_temps();
        }

        if self.changed {
            self.buffer.push(PROCESSED_TRAILER);
        }
    }

    /// Insert the per-tool temperature block at the layer-2 anchor and
    /// remove the first duplicate M104 below it
    fn fix_other_layer_temps(&mut self) {
        let Some(anchor) = self.state.extruder_temps_line else {
            return;
        };
        if self.state.extruder_temps.is_empty() {
            return;
        }

        let mut block = self.buffer.normalized(anchor);
        for tool in &self.state.used_tools {
            let Some(temp) = tool
                .parse::<usize>()
                .ok()
                .and_then(|t| self.state.extruder_temps.get(t))
            else {
                debug!(tool = %tool, "no other-layer temperature for tool");
                continue;
            };
            block.push_str(&format!("\nM104 S{} T{}", temp, tool));
        }
        self.buffer.set(anchor, block);
        self.changed = true;

        for idx in self
            .buffer
            .window_forward(anchor + 1, TEMP_DUPLICATE_WINDOW)
        {
            let s = self.buffer.normalized(idx);
            if s.starts_with("M104 S") {
                self.buffer.set(idx, format!("{}{}", REMOVED_MARKER, s));
                break;
            }
        }
    }

    fn append_to_line(&mut self, idx: usize, text: &str) {
        let line = self.buffer.normalized(idx);
        self.buffer.set(idx, format!("{} {}", line, text));
        self.changed = true;
    }

    fn into_report(self) -> TransformReport {
        let mut report = TransformReport::new(self.slicer);
        report.toolshift_count = self.state.toolshift_count.saturating_sub(1);
        report.used_tools = self.state.used_tools;
        report.first_motion = self.state.first_motion;
        if self.state.min_x.is_finite() {
            report.x_bounds = Some((self.state.min_x, self.state.max_x));
        }
        report.wipe_tower_acceleration = self.state.wipe_tower_acceleration;
        report.changed = self.changed;
        report
    }
}

fn parse_coordinate(raw: &str, line_number: usize, line: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|_| {
        TransformError::CoordinateParse {
            line_number,
            line: line.to_string(),
        }
        .into()
    })
}
