//! Reconciliation of a scanned mesh against a reference mesh
//!
//! Contact probes measure the true bed surface; eddy-current scans are
//! fast but carry a systematic error. Compensation walks the target
//! grid cell by cell, samples the reference at each cell's physical
//! position, and combines the two heights.

use tracing::info;

use printkit_core::{MeshError, Result};

use crate::grid::MeshGrid;
use crate::profile::{MeshProfile, ProfileStore};

/// How a reference sample is folded into a target cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationMode {
    /// Add the reference sample to the target height; used when the
    /// reference grid stores offsets (contact minus scan)
    AddOffset,
    /// Replace the target's error term with the reference sample, so
    /// the corrected height equals the reference surface at that point
    ReplaceWithReference,
}

/// Produce a corrected grid of the target's dimensions
///
/// Every target cell's physical position must fall inside the
/// reference bounds; an out-of-range cell fails the whole compensation
/// and nothing is produced.
pub fn compensate(
    target: &MeshGrid,
    reference: &MeshGrid,
    mode: CompensationMode,
) -> Result<MeshGrid> {
    let mut corrected = Vec::with_capacity(target.rows());
    for row in 0..target.rows() {
        let mut values = Vec::with_capacity(target.cols());
        for col in 0..target.cols() {
            let (x, y) = target.position(row, col);
            let reference_z = reference.sample(x, y)?;
            let z = target.value(row, col);
            let new_z = match mode {
                CompensationMode::AddOffset => z + reference_z,
                CompensationMode::ReplaceWithReference => z - (z - reference_z),
            };
            values.push(new_z);
        }
        corrected.push(values);
    }
    MeshGrid::new(corrected, target.bounds())
}

/// Build an offset profile: reference minus scan at every scan cell
///
/// The result is meant for later [`CompensationMode::AddOffset`] runs
/// against fresh scans of the same bed.
pub fn offset_grid(scan: &MeshGrid, reference: &MeshGrid) -> Result<MeshGrid> {
    let mut offsets = Vec::with_capacity(scan.rows());
    for row in 0..scan.rows() {
        let mut values = Vec::with_capacity(scan.cols());
        for col in 0..scan.cols() {
            let (x, y) = scan.position(row, col);
            values.push(reference.sample(x, y)? - scan.value(row, col));
        }
        offsets.push(values);
    }
    MeshGrid::new(offsets, scan.bounds())
}

/// Compensate a stored profile in place and make it the active mesh
///
/// The store is only mutated after the whole grid compensates cleanly;
/// a failed run leaves the previous profiles and active mesh untouched.
pub fn compensate_profile(
    store: &mut ProfileStore,
    target_name: &str,
    reference_name: &str,
    mode: CompensationMode,
) -> Result<()> {
    let target = store
        .get(target_name)
        .ok_or_else(|| MeshError::ProfileNotFound {
            name: target_name.to_string(),
        })?
        .to_grid()?;
    let reference = store
        .get(reference_name)
        .ok_or_else(|| MeshError::ProfileNotFound {
            name: reference_name.to_string(),
        })?
        .to_grid()?;

    let corrected = compensate(&target, &reference, mode)?;
    store.insert(MeshProfile::from_grid(target_name, &corrected));
    store.set_active(target_name)?;
    info!(
        target = %target_name,
        reference = %reference_name,
        "mesh profile compensated"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Bounds;

    fn bounds() -> Bounds {
        Bounds {
            min_x: 0.0,
            max_x: 20.0,
            min_y: 0.0,
            max_y: 20.0,
        }
    }

    fn flat(height: f64) -> MeshGrid {
        MeshGrid::new(vec![vec![height; 3]; 3], bounds()).unwrap()
    }

    #[test]
    fn replace_mode_yields_reference_surface() {
        let target = flat(0.5);
        let reference = flat(0.1);
        let corrected =
            compensate(&target, &reference, CompensationMode::ReplaceWithReference).unwrap();
        for row in 0..corrected.rows() {
            for col in 0..corrected.cols() {
                assert!((corrected.value(row, col) - 0.1).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn offset_mode_adds_reference_samples() {
        let target = flat(0.5);
        let reference = flat(-0.2);
        let corrected = compensate(&target, &reference, CompensationMode::AddOffset).unwrap();
        assert!((corrected.value(1, 1) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn offset_grid_then_add_recovers_reference() {
        let scan = MeshGrid::new(
            vec![
                vec![0.00, 0.05, 0.10],
                vec![0.05, 0.10, 0.15],
                vec![0.10, 0.15, 0.20],
            ],
            bounds(),
        )
        .unwrap();
        let contact = flat(0.02);

        let offsets = offset_grid(&scan, &contact).unwrap();
        let corrected = compensate(&scan, &offsets, CompensationMode::AddOffset).unwrap();
        for row in 0..corrected.rows() {
            for col in 0..corrected.cols() {
                assert!((corrected.value(row, col) - 0.02).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn oversized_target_fails_before_any_mutation() {
        let target = MeshGrid::new(
            vec![vec![0.0; 3]; 3],
            Bounds {
                min_x: 0.0,
                max_x: 25.0,
                min_y: 0.0,
                max_y: 20.0,
            },
        )
        .unwrap();
        let reference = flat(0.1);
        assert!(compensate(&target, &reference, CompensationMode::AddOffset).is_err());
    }

    #[test]
    fn profile_compensation_replaces_and_activates() {
        let mut store = ProfileStore::new();
        store.insert(MeshProfile::from_grid("scan", &flat(0.5)));
        store.insert(MeshProfile::from_grid("contact", &flat(0.1)));

        compensate_profile(
            &mut store,
            "scan",
            "contact",
            CompensationMode::ReplaceWithReference,
        )
        .unwrap();

        let active = store.active().unwrap();
        assert_eq!(active.name, "scan");
        assert!((active.points[0][0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn missing_reference_leaves_store_untouched() {
        let mut store = ProfileStore::new();
        store.insert(MeshProfile::from_grid("scan", &flat(0.5)));

        let err = compensate_profile(
            &mut store,
            "scan",
            "contact",
            CompensationMode::AddOffset,
        )
        .unwrap_err();
        assert!(err.is_mesh_error());
        assert!(store.active().is_none());
        assert!((store.get("scan").unwrap().points[0][0] - 0.5).abs() < 1e-12);
    }
}
