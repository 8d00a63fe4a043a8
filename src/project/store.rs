//! Project storage collaborator
//!
//! The editor never talks to a storage technology directly. Hosts hand a
//! [`ProjectStore`] to the [`Workspace`](super::Workspace); [`MemoryStore`]
//! keeps everything in memory and doubles as the test store.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A file or directory inside a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEntry {
    pub path: String,
    pub is_directory: bool,
}

/// Per-project file storage
pub trait ProjectStore: Send + Sync {
    /// Create an empty project; creating an existing project is not an error
    fn create_project(&self, project: &str) -> StoreResult<()>;

    /// Remove a project and everything in it
    fn delete_project(&self, project: &str) -> StoreResult<()>;

    /// Ids of all projects
    fn list_projects(&self) -> StoreResult<Vec<String>>;

    fn read_file(&self, project: &str, path: &str) -> StoreResult<Vec<u8>>;

    /// Write a file, creating parent directories as needed
    fn write_file(&self, project: &str, path: &str, content: &[u8]) -> StoreResult<()>;

    /// Every file and directory in the project, with full project-relative paths
    fn list_entries(&self, project: &str) -> StoreResult<Vec<StoreEntry>>;
}

/// Reject empty, absolute and parent-escaping paths
pub fn validate_path(path: &str) -> StoreResult<()> {
    if path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// In-memory project store
#[derive(Default)]
pub struct MemoryStore {
    projects: RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for MemoryStore {
    fn create_project(&self, project: &str) -> StoreResult<()> {
        validate_path(project)?;
        self.projects.write().entry(project.to_string()).or_default();
        Ok(())
    }

    fn delete_project(&self, project: &str) -> StoreResult<()> {
        self.projects
            .write()
            .remove(project)
            .map(|_| ())
            .ok_or_else(|| StoreError::ProjectNotFound(project.to_string()))
    }

    fn list_projects(&self) -> StoreResult<Vec<String>> {
        Ok(self.projects.read().keys().cloned().collect())
    }

    fn read_file(&self, project: &str, path: &str) -> StoreResult<Vec<u8>> {
        let projects = self.projects.read();
        let files = projects
            .get(project)
            .ok_or_else(|| StoreError::ProjectNotFound(project.to_string()))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::FileNotFound(path.to_string()))
    }

    fn write_file(&self, project: &str, path: &str, content: &[u8]) -> StoreResult<()> {
        validate_path(path)?;
        let mut projects = self.projects.write();
        let files = projects
            .get_mut(project)
            .ok_or_else(|| StoreError::ProjectNotFound(project.to_string()))?;
        files.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    fn list_entries(&self, project: &str) -> StoreResult<Vec<StoreEntry>> {
        let projects = self.projects.read();
        let files = projects
            .get(project)
            .ok_or_else(|| StoreError::ProjectNotFound(project.to_string()))?;

        let mut directories = std::collections::BTreeSet::new();
        for path in files.keys() {
            let mut parent = path.as_str();
            while let Some((dir, _)) = parent.rsplit_once('/') {
                directories.insert(dir.to_string());
                parent = dir;
            }
        }

        let mut entries: Vec<StoreEntry> = directories
            .into_iter()
            .map(|path| StoreEntry {
                path,
                is_directory: true,
            })
            .collect();
        entries.extend(files.keys().map(|path| StoreEntry {
            path: path.clone(),
            is_directory: false,
        }));
        Ok(entries)
    }
}
