//! G-code post-processing pass for toolchanging printers
//!
//! Takes a sliced program, rewrites tool changes into atomic toolshift
//! commands, and annotates the start-print line with the parameters the
//! firmware macros need (first XY, X bounds, used tools, toolshift
//! count). The pass is idempotent: a processed file carries a trailer
//! line and is skipped on subsequent runs.

pub mod line_buffer;
pub mod process;
pub mod slicer;
pub mod transformer;

pub use line_buffer::LineBuffer;
pub use process::{process_file, process_file_paced};
pub use slicer::{SlicerFamily, SlicerIdentity};
pub use transformer::{
    is_already_processed, transform, transform_paced, TransformReport, CHANGED_MARKER,
    PROCESSED_TRAILER, REMOVED_MARKER,
};
