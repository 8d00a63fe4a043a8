//! EPUB Editor core
//!
//! A WASM-based EPUB processor for the in-browser book editor that provides:
//! - EPUB import into a flat, editable file set with metadata, manifest and spine
//! - EPUB export from an edited file set, with a freshly derived manifest and spine
//! - A project workspace over an injected storage backend
//!
//! The core is synchronous and storage-agnostic. A native CLI is available behind
//! the `cli` feature.

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

pub mod config;
pub mod epub;
pub mod project;

// Re-export common types
pub use config::{EditorConfig, SpinePolicy};
pub use epub::{
    export_archive, import_archive, resolve_mime_type, ArchiveEntry, EpubError, FileContent,
    ManifestItem, PackageMetadata, ProjectPackage, SpineItem,
};
pub use project::{MemoryStore, ProjectError, ProjectSidecar, ProjectStore, Workspace};

/// Initialize the WASM module
/// Call this before using any other functions
#[wasm_bindgen(start)]
pub fn init() {
    // Set up better panic messages in debug mode
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Arguments of `exportArchive` as passed from JavaScript
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportRequest {
    files: Vec<ArchiveEntry>,
    metadata: PackageMetadata,
}

/// EPUB Editor - main interface for importing and exporting books
#[wasm_bindgen]
pub struct EpubEditor {
    config: EditorConfig,
}

#[wasm_bindgen]
impl EpubEditor {
    /// Create an editor with the default export layout
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            config: EditorConfig::default(),
        }
    }

    /// Create an editor from a (partial) config object
    #[wasm_bindgen(js_name = "withConfig")]
    pub fn with_config(config: JsValue) -> Result<EpubEditor, JsValue> {
        let config: EditorConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| js_error("ConfigError", &e.to_string()))?;
        Ok(Self { config })
    }

    /// Parse EPUB bytes into `{ metadata, manifest, spine, files, packagePath }`
    #[wasm_bindgen(js_name = "importArchive")]
    pub fn import_archive(&self, data: &[u8]) -> Result<JsValue, JsValue> {
        let package = epub::import_archive(data).map_err(epub_error)?;

        serde_wasm_bindgen::to_value(&package)
            .map_err(|e| js_error("SerializationError", &e.to_string()))
    }

    /// Build an EPUB from an edited file list and metadata
    #[wasm_bindgen(js_name = "exportArchive")]
    pub fn export_archive(&self, files: JsValue, metadata: JsValue) -> Result<Vec<u8>, JsValue> {
        self.export_archive_in_order(files, metadata, Vec::new())
    }

    /// Build an EPUB, placing the given archive paths first in the spine when
    /// the editor is configured to preserve the imported reading order
    #[wasm_bindgen(js_name = "exportArchiveInOrder")]
    pub fn export_archive_in_order(
        &self,
        files: JsValue,
        metadata: JsValue,
        reading_order: Vec<String>,
    ) -> Result<Vec<u8>, JsValue> {
        let request = ExportRequest {
            files: serde_wasm_bindgen::from_value(files)
                .map_err(|e| js_error("InvalidArgumentError", &e.to_string()))?,
            metadata: serde_wasm_bindgen::from_value(metadata)
                .map_err(|e| js_error("InvalidArgumentError", &e.to_string()))?,
        };

        epub::compose_archive(&request.files, &request.metadata, &self.config, &reading_order)
            .map_err(epub_error)
    }

    /// Resolve the MIME type used in generated manifests for a path
    #[wasm_bindgen(js_name = "resolveMimeType")]
    pub fn resolve_mime_type(path: &str) -> String {
        epub::resolve_mime_type(path).to_string()
    }

    /// Archive path of the generated package document
    #[wasm_bindgen(getter, js_name = "packagePath")]
    pub fn package_path(&self) -> String {
        self.config.package_path.clone()
    }
}

impl Default for EpubEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl EpubEditor {
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }
}

fn epub_error(e: EpubError) -> JsValue {
    js_error(e.kind(), &e.to_string())
}

/// A JS `Error` whose `name` carries the error kind
fn js_error(name: &str, message: &str) -> JsValue {
    let error = js_sys::Error::new(message);
    error.set_name(name);
    error.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editor_creation() {
        let editor = EpubEditor::new();
        assert_eq!(editor.config(), &EditorConfig::default());
        assert_eq!(EpubEditor::resolve_mime_type("IMG.PNG"), "image/png");
    }

    #[test]
    fn test_export_request_shape() {
        let request: ExportRequest = serde_json::from_value(serde_json::json!({
            "files": [
                { "path": "OEBPS/chapter1.xhtml", "content": { "kind": "text", "value": "<html/>" } }
            ],
            "metadata": { "title": "T", "author": "A", "language": "en", "identifier": "" }
        }))
        .unwrap();
        assert_eq!(request.files[0].content.as_text(), Some("<html/>"));
        assert!(!request.files[0].is_directory);
    }
}
