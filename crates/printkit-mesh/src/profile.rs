//! Persisted, versioned mesh profiles
//!
//! Profiles are stored as one JSON document per printer. A profile
//! whose version does not match [`PROFILE_VERSION`] is kept out of the
//! active set rather than rejected, so a downgrade never destroys
//! saved calibration data.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use printkit_core::{MeshError, Result};

use crate::grid::{Bounds, MeshGrid};

/// Current on-disk profile schema version
pub const PROFILE_VERSION: u32 = 1;

/// One named, persisted height grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshProfile {
    pub name: String,
    pub version: u32,
    pub points: Vec<Vec<f64>>,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub x_count: usize,
    pub y_count: usize,
}

impl MeshProfile {
    /// Capture a grid as a profile under the current schema version
    pub fn from_grid(name: impl Into<String>, grid: &MeshGrid) -> Self {
        let bounds = grid.bounds();
        Self {
            name: name.into(),
            version: PROFILE_VERSION,
            points: grid.points().to_vec(),
            min_x: bounds.min_x,
            max_x: bounds.max_x,
            min_y: bounds.min_y,
            max_y: bounds.max_y,
            x_count: grid.cols(),
            y_count: grid.rows(),
        }
    }

    /// Reconstruct the sampling geometry, validating the stored shape
    pub fn to_grid(&self) -> Result<MeshGrid> {
        if self.points.len() != self.y_count {
            return Err(MeshError::ShapeMismatch {
                reason: format!(
                    "profile {} stores {} rows but declares {}",
                    self.name,
                    self.points.len(),
                    self.y_count
                ),
            }
            .into());
        }
        if self.points.iter().any(|row| row.len() != self.x_count) {
            return Err(MeshError::ShapeMismatch {
                reason: format!(
                    "profile {} has a row not matching its declared {} columns",
                    self.name, self.x_count
                ),
            }
            .into());
        }
        MeshGrid::new(
            self.points.clone(),
            Bounds {
                min_x: self.min_x,
                max_x: self.max_x,
                min_y: self.min_y,
                max_y: self.max_y,
            },
        )
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileDocument {
    profiles: Vec<MeshProfile>,
    active: Option<String>,
}

/// In-memory set of compatible profiles plus the active selection
#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: BTreeMap<String, MeshProfile>,
    incompatible: Vec<String>,
    active: Option<String>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a profile document, excluding incompatible versions
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let document: ProfileDocument = serde_json::from_str(&content)
            .map_err(|e| printkit_core::Error::Other(format!("invalid profile store: {}", e)))?;

        let mut store = Self::new();
        for profile in document.profiles {
            if profile.version != PROFILE_VERSION {
                warn!(
                    name = %profile.name,
                    version = profile.version,
                    supported = PROFILE_VERSION,
                    "excluding incompatible mesh profile"
                );
                store.incompatible.push(profile.name);
                continue;
            }
            store.profiles.insert(profile.name.clone(), profile);
        }
        store.active = document
            .active
            .filter(|name| store.profiles.contains_key(name));
        debug!(
            loaded = store.profiles.len(),
            excluded = store.incompatible.len(),
            "loaded mesh profile store"
        );
        Ok(store)
    }

    /// Persist the active set; incompatible profiles are not rewritten
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let document = ProfileDocument {
            profiles: self.profiles.values().cloned().collect(),
            active: self.active.clone(),
        };
        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| printkit_core::Error::Other(format!("profile serialization: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MeshProfile> {
        self.profiles.get(name)
    }

    /// Insert or replace a profile
    pub fn insert(&mut self, profile: MeshProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn remove(&mut self, name: &str) -> Option<MeshProfile> {
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        self.profiles.remove(name)
    }

    /// Mark a loaded profile as the active mesh
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if !self.profiles.contains_key(name) {
            return Err(MeshError::ProfileNotFound {
                name: name.to_string(),
            }
            .into());
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    pub fn active(&self) -> Option<&MeshProfile> {
        self.active.as_deref().and_then(|name| self.get(name))
    }

    /// Names of compatible profiles, sorted
    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    /// Names of profiles excluded for version mismatch
    pub fn incompatible(&self) -> &[String] {
        &self.incompatible
    }
}
