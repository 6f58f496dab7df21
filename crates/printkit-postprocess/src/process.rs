//! File-level entry point for the transformation pass

use std::path::Path;

use tracing::{debug, info};

use printkit_core::{PostProcessConfig, Result};

use crate::line_buffer::LineBuffer;
use crate::transformer::{self, TransformReport};

/// Load a G-code file, run one transformation pass, and write the file
/// back when the pass changed it.
///
/// When corrections are requested, a file carrying the processed
/// trailer is returned untouched with `already_processed` set; running
/// the transformer twice over the same file never double-rewrites it.
/// Coordinate-only runs skip that check: they mutate nothing and still
/// need the first motion out of already-processed files.
pub fn process_file(path: &Path, config: &PostProcessConfig) -> Result<TransformReport> {
    process_file_paced(path, config, &mut || {})
}

/// Like [`process_file`], ceding control through `pacer` during the pass
pub fn process_file_paced(
    path: &Path,
    config: &PostProcessConfig,
    pacer: &mut dyn FnMut(),
) -> Result<TransformReport> {
    let mut buffer = LineBuffer::read_from_file(path)?;
    debug!(path = %path.display(), lines = buffer.len(), "loaded program");

    if config.apply_corrections && transformer::is_already_processed(&buffer) {
        info!(path = %path.display(), "file already processed, skipping");
        let slicer = crate::slicer::SlicerIdentity::detect(&buffer);
        return Ok(TransformReport::already_processed(slicer));
    }

    let report = transformer::transform_paced(&mut buffer, config, pacer)?;

    if report.changed {
        buffer.save_to_file(path)?;
        info!(path = %path.display(), "saved transformed program");
    }

    Ok(report)
}
