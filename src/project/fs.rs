//! Directory-backed project store
//!
//! Each project is a subdirectory of the root; files keep their archive paths.

use std::fs;
use std::path::{Path, PathBuf};

use super::store::{validate_path, ProjectStore, StoreEntry, StoreError, StoreResult};

pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project: &str) -> StoreResult<PathBuf> {
        validate_path(project)?;
        if project.contains('/') {
            return Err(StoreError::InvalidPath(project.to_string()));
        }
        Ok(self.root.join(project))
    }

    fn existing_project_dir(&self, project: &str) -> StoreResult<PathBuf> {
        let dir = self.project_dir(project)?;
        if !dir.is_dir() {
            return Err(StoreError::ProjectNotFound(project.to_string()));
        }
        Ok(dir)
    }

    fn file_path(&self, project: &str, path: &str) -> StoreResult<PathBuf> {
        validate_path(path)?;
        let mut full = self.existing_project_dir(project)?;
        full.extend(path.split('/'));
        Ok(full)
    }
}

impl ProjectStore for DirectoryStore {
    fn create_project(&self, project: &str) -> StoreResult<()> {
        fs::create_dir_all(self.project_dir(project)?)?;
        Ok(())
    }

    fn delete_project(&self, project: &str) -> StoreResult<()> {
        fs::remove_dir_all(self.existing_project_dir(project)?)?;
        Ok(())
    }

    fn list_projects(&self) -> StoreResult<Vec<String>> {
        let mut projects = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    projects.push(name.to_string());
                }
            }
        }
        projects.sort();
        Ok(projects)
    }

    fn read_file(&self, project: &str, path: &str) -> StoreResult<Vec<u8>> {
        let full = self.file_path(project, path)?;
        if !full.is_file() {
            return Err(StoreError::FileNotFound(path.to_string()));
        }
        Ok(fs::read(full)?)
    }

    fn write_file(&self, project: &str, path: &str, content: &[u8]) -> StoreResult<()> {
        let full = self.file_path(project, path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, content)?;
        Ok(())
    }

    fn list_entries(&self, project: &str) -> StoreResult<Vec<StoreEntry>> {
        let dir = self.existing_project_dir(project)?;
        let mut entries = Vec::new();
        collect_entries(&dir, "", &mut entries)?;
        Ok(entries)
    }
}

/// Walk `dir` depth-first, in name order
fn collect_entries(dir: &Path, prefix: &str, entries: &mut Vec<StoreEntry>) -> StoreResult<()> {
    let mut children: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let Some(name) = child.file_name().to_str().map(str::to_string) else {
            tracing::warn!("Skipping non UTF-8 file name in {}", dir.display());
            continue;
        };
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };

        if child.file_type()?.is_dir() {
            entries.push(StoreEntry {
                path: path.clone(),
                is_directory: true,
            });
            collect_entries(&child.path(), &path, entries)?;
        } else {
            entries.push(StoreEntry {
                path,
                is_directory: false,
            });
        }
    }
    Ok(())
}
