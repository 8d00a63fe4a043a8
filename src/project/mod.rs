//! Project workspace
//!
//! Composes EPUB import/export with a [`ProjectStore`]: an imported book
//! becomes a project holding the extracted files plus a JSON sidecar with the
//! package metadata, and a project can be exported back to an EPUB at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(not(target_arch = "wasm32"))]
mod fs;
mod store;

#[cfg(not(target_arch = "wasm32"))]
pub use fs::DirectoryStore;
pub use store::{validate_path, MemoryStore, ProjectStore, StoreEntry, StoreError, StoreResult};

use crate::config::EditorConfig;
use crate::epub::{
    self, paths, ArchiveEntry, EpubError, FileContent, ManifestItem, PackageMetadata, SpineItem,
};

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error(transparent)]
    Epub(#[from] EpubError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid project metadata: {0}")]
    Sidecar(#[from] serde_json::Error),

    #[error("Project already exists: {0}")]
    AlreadyExists(String),

    #[error("Path is reserved for project metadata: {0}")]
    ReservedPath(String),
}

impl ProjectError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProjectError::Epub(e) => e.kind(),
            ProjectError::Store(_) => "StorageError",
            ProjectError::Sidecar(_) => "ProjectMetadataError",
            ProjectError::AlreadyExists(_) => "ProjectExistsError",
            ProjectError::ReservedPath(_) => "ReservedPathError",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProjectError>;

/// Project metadata persisted next to the extracted files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSidecar {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub epub_metadata: Option<PackageMetadata>,
    #[serde(default)]
    pub manifest: Vec<ManifestItem>,
    #[serde(default)]
    pub spine: Vec<SpineItem>,
    /// Archive path of the OPF the project was imported from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_path: Option<String>,
}

impl ProjectSidecar {
    /// Metadata to export with; blank fields fall back to the project name and id
    pub fn export_metadata(&self, project: &str) -> PackageMetadata {
        fn pick(value: Option<&String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty()).cloned()
        }
        let meta = self.epub_metadata.as_ref();

        PackageMetadata {
            title: pick(meta.map(|m| &m.title))
                .or_else(|| pick(Some(&self.name)))
                .unwrap_or_else(|| "Untitled".to_string()),
            author: pick(meta.map(|m| &m.author)).unwrap_or_else(|| "Unknown".to_string()),
            language: pick(meta.map(|m| &m.language)).unwrap_or_else(|| "en".to_string()),
            identifier: pick(meta.map(|m| &m.identifier)).unwrap_or_else(|| project.to_string()),
        }
    }

    /// Imported reading order as archive paths
    pub fn reading_order(&self, default_package_path: &str) -> Vec<String> {
        let package_path = self.package_path.as_deref().unwrap_or(default_package_path);
        paths::reading_order(package_path, &self.manifest, &self.spine)
    }
}

/// A project id with its sidecar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    #[serde(flatten)]
    pub sidecar: ProjectSidecar,
}

/// Import/export over an injected project store
pub struct Workspace<S: ProjectStore> {
    store: S,
    config: EditorConfig,
}

impl<S: ProjectStore> Workspace<S> {
    pub fn new(store: S, config: EditorConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Import an EPUB into a new project.
    ///
    /// Either every file and the sidecar are written or the project is removed again.
    pub fn import_project(&self, project: &str, data: &[u8]) -> Result<ProjectSidecar> {
        let package = epub::import_archive(data)?;

        if package.file(&self.config.sidecar_name).is_some() {
            return Err(ProjectError::ReservedPath(self.config.sidecar_name.clone()));
        }
        if self.store.list_projects()?.iter().any(|id| id == project) {
            return Err(ProjectError::AlreadyExists(project.to_string()));
        }

        let now = Utc::now();
        let sidecar = ProjectSidecar {
            name: package.metadata.title.clone(),
            created_at: now,
            last_modified: now,
            epub_metadata: Some(package.metadata.clone()),
            manifest: package.manifest.clone(),
            spine: package.spine.clone(),
            package_path: Some(package.package_path.clone()),
        };

        self.store.create_project(project)?;
        let written = package
            .files
            .iter()
            .try_for_each(|file| self.store.write_file(project, &file.path, file.content.as_bytes()))
            .map_err(ProjectError::from)
            .and_then(|_| self.write_sidecar(project, &sidecar));

        if let Err(e) = written {
            tracing::warn!("Import of {} failed, removing partial project: {}", project, e);
            if let Err(cleanup) = self.store.delete_project(project) {
                tracing::error!("Failed to remove partial project {}: {}", project, cleanup);
            }
            return Err(e);
        }

        tracing::info!("Created project {} ({} files)", project, package.files.len());
        Ok(sidecar)
    }

    pub fn load_sidecar(&self, project: &str) -> Result<ProjectSidecar> {
        let bytes = self.store.read_file(project, &self.config.sidecar_name)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_sidecar(&self, project: &str, sidecar: &ProjectSidecar) -> Result<()> {
        let json = serde_json::to_vec_pretty(sidecar)?;
        self.store.write_file(project, &self.config.sidecar_name, &json)?;
        Ok(())
    }

    /// Every project file except the sidecar, in store listing order
    pub fn load_files(&self, project: &str) -> Result<Vec<ArchiveEntry>> {
        let mut files = Vec::new();
        for entry in self.store.list_entries(project)? {
            if entry.is_directory || entry.path == self.config.sidecar_name {
                continue;
            }
            let bytes = self.store.read_file(project, &entry.path)?;
            files.push(ArchiveEntry {
                content: FileContent::classify(&entry.path, bytes),
                path: entry.path,
                is_directory: false,
            });
        }
        Ok(files)
    }

    /// Write an edited file and bump the project's modification time
    pub fn save_file(&self, project: &str, path: &str, content: &FileContent) -> Result<()> {
        if path == self.config.sidecar_name {
            return Err(ProjectError::ReservedPath(path.to_string()));
        }
        let mut sidecar = self.load_sidecar(project)?;
        self.store.write_file(project, path, content.as_bytes())?;

        sidecar.last_modified = Utc::now();
        self.write_sidecar(project, &sidecar)?;
        tracing::debug!("Saved {} in {}", path, project);
        Ok(())
    }

    /// Build an EPUB from the project's current files. The store is left untouched.
    pub fn export_project(&self, project: &str) -> Result<Vec<u8>> {
        let sidecar = self.load_sidecar(project)?;
        let files = self.load_files(project)?;
        let metadata = sidecar.export_metadata(project);
        let reading_order = sidecar.reading_order(&self.config.package_path);

        Ok(epub::compose_archive(
            &files,
            &metadata,
            &self.config,
            &reading_order,
        )?)
    }

    /// All projects with readable sidecars; the rest are skipped
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let mut projects = Vec::new();
        for id in self.store.list_projects()? {
            match self.load_sidecar(&id) {
                Ok(sidecar) => projects.push(ProjectSummary { id, sidecar }),
                Err(e) => tracing::warn!("Failed to load project {}: {}", id, e),
            }
        }
        Ok(projects)
    }

    pub fn delete_project(&self, project: &str) -> Result<()> {
        self.store.delete_project(project)?;
        tracing::info!("Deleted project {}", project);
        Ok(())
    }
}
