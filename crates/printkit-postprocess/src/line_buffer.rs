//! Line buffer for single-pass G-code transformation
//!
//! Holds the whole program as an indexable sequence of mutable lines so
//! the transformer can scan a bounded window backward and forward from a
//! pivot line while indices stay stable. A plain growable vector, never
//! a linked structure: the pass relies on stable 0-based indices, and
//! the only growth allowed is a terminal append after the pass.

use std::fmt;
use std::path::Path;

use printkit_core::Result;

/// Indexable, mutable sequence of program lines
///
/// Lines are stored without terminators; output joins with `\n`. A line
/// slot may hold an embedded `\n` when a correction expands one source
/// line into several output lines without disturbing the indices of the
/// lines after it.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    lines: Vec<String>,
}

impl LineBuffer {
    /// Create a new empty line buffer
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Read a buffer from a UTF-8 file
    pub fn read_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from(content.as_str()))
    }

    /// Write the buffer back to a file with `\n` terminators
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_string())?;
        Ok(())
    }

    /// Get the total number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Get a line by index
    pub fn line(&self, idx: usize) -> Option<&str> {
        self.lines.get(idx).map(|s| s.as_str())
    }

    /// Get the last line
    pub fn last_line(&self) -> Option<&str> {
        self.lines.last().map(|s| s.as_str())
    }

    /// Replace a line in place
    ///
    /// Out-of-range indices are ignored; the pass never produces them,
    /// window scans are clamped before they reach here.
    pub fn set(&mut self, idx: usize, line: String) {
        if let Some(slot) = self.lines.get_mut(idx) {
            *slot = line;
        }
    }

    /// Append a line at the end (terminal trailer only)
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Line normalized for matching: trailing whitespace stripped and
    /// runs of double spaces collapsed once
    pub fn normalized(&self, idx: usize) -> String {
        self.lines
            .get(idx)
            .map(|s| s.trim_end().replace("  ", " "))
            .unwrap_or_default()
    }

    /// Indices of a bounded backward window from `pivot` (inclusive),
    /// clamped at the start of the program
    pub fn window_back(&self, pivot: usize, window: usize) -> impl Iterator<Item = usize> {
        let first = pivot.saturating_sub(window.saturating_sub(1));
        (first..=pivot).rev()
    }

    /// Indices of a bounded forward window from `pivot` (inclusive),
    /// clamped at the end of the program
    pub fn window_forward(&self, pivot: usize, window: usize) -> impl Iterator<Item = usize> {
        let end = pivot.saturating_add(window).min(self.len());
        pivot..end
    }
}

impl From<&str> for LineBuffer {
    fn from(text: &str) -> Self {
        let mut lines: Vec<String> = text.split('\n').map(|s| s.to_string()).collect();
        // A trailing terminator yields one empty tail chunk, not a line
        if lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        Self { lines }
    }
}

impl fmt::Display for LineBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_drops_trailing_terminator() {
        let buffer = LineBuffer::from("G28\nG1 X10\n");
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.line(1), Some("G1 X10"));
    }

    #[test]
    fn from_str_keeps_unterminated_tail() {
        let buffer = LineBuffer::from("G28\nG1 X10");
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn normalized_collapses_double_spaces() {
        let buffer = LineBuffer::from("G1  X10  Y20  \n");
        assert_eq!(buffer.normalized(0), "G1 X10 Y20");
    }

    #[test]
    fn display_round_trip() {
        let text = "G28\nSTART_PRINT\nG1 X10\n";
        let buffer = LineBuffer::from(text);
        assert_eq!(buffer.to_string(), text);
    }

    #[test]
    fn window_back_clamps_at_start() {
        let buffer = LineBuffer::from("a\nb\nc\n");
        let idxs: Vec<usize> = buffer.window_back(1, 20).collect();
        assert_eq!(idxs, vec![1, 0]);
    }

    #[test]
    fn window_forward_clamps_at_end() {
        let buffer = LineBuffer::from("a\nb\nc\n");
        let idxs: Vec<usize> = buffer.window_forward(1, 20).collect();
        assert_eq!(idxs, vec![1, 2]);
    }

    #[test]
    fn set_out_of_range_is_ignored() {
        let mut buffer = LineBuffer::from("a\n");
        buffer.set(5, "x".to_string());
        assert_eq!(buffer.len(), 1);
    }
}
