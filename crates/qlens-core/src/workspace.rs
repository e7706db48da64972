//! Imported trace files and their visibility

use crate::error::{TraceError, TraceResult};
use crate::trace_file::TraceFile;
use tracing::debug;

/// An imported file with its caller-owned visibility flag
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub file: TraceFile,
    pub active: bool,
}

/// Ordered set of imported trace files.
///
/// Networks are built from [`TraceSet::active_files`]; changing the set never touches a
/// network that was already built.
#[derive(Debug, Clone, Default)]
pub struct TraceSet {
    entries: Vec<TraceEntry>,
}

impl TraceSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file as active. Names must be unique.
    pub fn add(&mut self, file: TraceFile) -> TraceResult<()> {
        if self.get(&file.name).is_some() {
            return Err(TraceError::DuplicateFile(file.name));
        }
        debug!("Adding {} to trace set", file.name);
        self.entries.push(TraceEntry { file, active: true });
        Ok(())
    }

    /// Remove a file by name, returning it
    pub fn remove(&mut self, name: &str) -> Option<TraceFile> {
        let index = self.entries.iter().position(|e| e.file.name == name)?;
        Some(self.entries.remove(index).file)
    }

    /// Show or hide a file in future networks. Returns false when no file has this name.
    pub fn set_active(&mut self, name: &str, active: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.file.name == name) {
            Some(entry) => {
                entry.active = active;
                true
            }
            None => false,
        }
    }

    /// Look up a file by name
    pub fn get(&self, name: &str) -> Option<&TraceFile> {
        self.entries
            .iter()
            .find(|e| e.file.name == name)
            .map(|e| &e.file)
    }

    /// Whether a file with this name exists and is active
    pub fn is_active(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.file.name == name && e.active)
    }

    /// Active files in import order
    pub fn active_files(&self) -> Vec<&TraceFile> {
        self.entries
            .iter()
            .filter(|e| e.active)
            .map(|e| &e.file)
            .collect()
    }

    /// All files in import order, active or not
    pub fn files(&self) -> impl Iterator<Item = &TraceFile> {
        self.entries.iter().map(|e| &e.file)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
