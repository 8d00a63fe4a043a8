//! EPUB import and export
//!
//! Turns an EPUB archive into a [`ProjectPackage`] and an edited file set back
//! into an EPUB archive.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod archive;
pub mod compose;
pub mod container;
pub mod mime;
pub mod opf;
pub mod paths;

pub use archive::{pack, unpack};
pub use compose::{compose_archive, derive_package, PackageDocument};
pub use container::{resolve_rootfile, rootfile_paths, write_container, CONTAINER_PATH};
pub use mime::{is_text_mime_type, resolve_mime_type, XHTML_MIME_TYPE};
pub use opf::{parse_package, write_package, ParsedPackage};

use crate::config::EditorConfig;

/// Path of the OCF mimetype marker
pub const MIMETYPE_PATH: &str = "mimetype";

/// Contents of the OCF mimetype marker
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

#[derive(Error, Debug)]
pub enum EpubError {
    #[error("Failed to read ZIP archive: {0}")]
    ArchiveFormat(#[from] zip::result::ZipError),

    #[error("Unsafe path in archive: {0}")]
    UnsafeEntry(String),

    #[error("Failed to write ZIP archive: {0}")]
    ArchiveWrite(String),

    #[error("Invalid container.xml: {0}")]
    InvalidContainer(String),

    #[error("Invalid OPF package: {0}")]
    InvalidPackage(String),

    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl EpubError {
    /// Name of the error kind as surfaced to the host application
    pub fn kind(&self) -> &'static str {
        match self {
            EpubError::ArchiveFormat(_) | EpubError::UnsafeEntry(_) => "ArchiveFormatError",
            EpubError::ArchiveWrite(_) => "ArchiveWriteError",
            EpubError::InvalidContainer(_) => "InvalidContainerError",
            EpubError::InvalidPackage(_) => "InvalidPackageError",
            EpubError::Xml(_) => "XmlWriteError",
            EpubError::Utf8(_) => "EncodingError",
        }
    }
}

pub type Result<T> = std::result::Result<T, EpubError>;

/// Parse package and container XML. DOCTYPE prologs from EPUB 2 and OEB tools are allowed.
pub(crate) fn parse_xml(text: &str) -> std::result::Result<roxmltree::Document<'_>, roxmltree::Error> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    roxmltree::Document::parse_with_options(text, options)
}

/// Content of a single file, kept as text or raw bytes depending on its type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FileContent {
    Text(String),
    Binary(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl FileContent {
    /// Pick a representation for `bytes` based on the MIME type of `path`.
    ///
    /// Text types that turn out not to be UTF-8 are kept as binary so nothing
    /// is lost on the way back out.
    pub fn classify(path: &str, bytes: Vec<u8>) -> Self {
        if !is_text_mime_type(resolve_mime_type(path)) {
            return FileContent::Binary(bytes);
        }
        match String::from_utf8(bytes) {
            Ok(text) => FileContent::Text(text),
            Err(e) => {
                tracing::debug!("{} is not valid UTF-8, keeping raw bytes", path);
                FileContent::Binary(e.into_bytes())
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(text) => text.as_bytes(),
            FileContent::Binary(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text(text) => Some(text),
            FileContent::Binary(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileContent::Text(text) => text.into_bytes(),
            FileContent::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<String> for FileContent {
    fn from(text: String) -> Self {
        FileContent::Text(text)
    }
}

impl From<&str> for FileContent {
    fn from(text: &str) -> Self {
        FileContent::Text(text.to_string())
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(bytes: Vec<u8>) -> Self {
        FileContent::Binary(bytes)
    }
}

/// One unpacked entry of the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub path: String,
    pub content: FileContent,
    #[serde(default)]
    pub is_directory: bool,
}

impl ArchiveEntry {
    pub fn file(path: impl Into<String>, content: impl Into<FileContent>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            is_directory: false,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Binary(Vec::new()),
            is_directory: true,
        }
    }
}

/// Dublin Core metadata the editor works with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    pub title: String,
    pub author: String,
    pub language: String,
    pub identifier: String,
}

impl Default for PackageMetadata {
    fn default() -> Self {
        Self {
            title: "Unknown Title".to_string(),
            author: "Unknown Author".to_string(),
            language: "en".to_string(),
            identifier: String::new(),
        }
    }
}

/// Manifest item from OPF
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
}

/// Spine item (reading order entry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpineItem {
    pub idref: String,
}

/// Everything an import produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPackage {
    pub metadata: PackageMetadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub files: Vec<ArchiveEntry>,
    /// Archive path of the OPF the package was read from
    pub package_path: String,
}

impl ProjectPackage {
    /// Look up a file by archive path
    pub fn file(&self, path: &str) -> Option<&ArchiveEntry> {
        self.files.iter().find(|entry| entry.path == path)
    }

    /// Archive paths of the spine entries, in reading order
    pub fn reading_order(&self) -> Vec<String> {
        paths::reading_order(&self.package_path, &self.manifest, &self.spine)
    }
}

/// Parse an EPUB archive into a project package
pub fn import_archive(data: &[u8]) -> Result<ProjectPackage> {
    let files = unpack(data)?;

    let container = files
        .iter()
        .find(|entry| entry.path == CONTAINER_PATH)
        .ok_or_else(|| EpubError::InvalidContainer(format!("missing {}", CONTAINER_PATH)))?;
    let container_xml = container
        .content
        .as_text()
        .ok_or_else(|| EpubError::InvalidContainer("container.xml is not UTF-8".to_string()))?;
    let package_path = resolve_rootfile(container_xml)?;

    let opf_xml = files
        .iter()
        .find(|entry| entry.path == package_path)
        .ok_or_else(|| {
            EpubError::InvalidContainer(format!("rootfile {} not found in archive", package_path))
        })?
        .content
        .as_text()
        .ok_or_else(|| EpubError::InvalidPackage(format!("{} is not UTF-8", package_path)))?;
    let parsed = parse_package(opf_xml)?;

    tracing::info!(
        "Imported \"{}\": {} files, {} manifest items, {} spine items",
        parsed.metadata.title,
        files.len(),
        parsed.manifest.len(),
        parsed.spine.len()
    );

    Ok(ProjectPackage {
        metadata: parsed.metadata,
        manifest: parsed.manifest,
        spine: parsed.spine,
        files,
        package_path,
    })
}

/// Build an EPUB archive from an edited file set using the default layout
pub fn export_archive(files: &[ArchiveEntry], metadata: &PackageMetadata) -> Result<Vec<u8>> {
    compose_archive(files, metadata, &EditorConfig::default(), &[])
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_default() {
        let metadata = PackageMetadata::default();
        assert_eq!(metadata.title, "Unknown Title");
        assert_eq!(metadata.author, "Unknown Author");
        assert_eq!(metadata.language, "en");
        assert!(metadata.identifier.is_empty());
    }

    #[test]
    fn test_import_minimal_book() {
        let package = import_archive(&fixtures::minimal_epub()).unwrap();

        assert_eq!(package.metadata.title, "Test Book");
        assert_eq!(package.metadata.author, "Jane Doe");
        assert_eq!(package.manifest.len(), 1);
        assert_eq!(
            package.spine,
            vec![SpineItem { idref: package.manifest[0].id.clone() }]
        );
        assert_eq!(package.package_path, "OEBPS/content.opf");
        assert_eq!(package.files.len(), 4);
        assert_eq!(
            package.file("OEBPS/chapter1.xhtml").unwrap().content.as_text(),
            Some(fixtures::CHAPTER_XHTML)
        );
        assert_eq!(package.reading_order(), vec!["OEBPS/chapter1.xhtml".to_string()]);
    }

    #[test]
    fn test_import_rejects_garbage() {
        let err = import_archive(b"definitely not a zip").unwrap_err();
        assert_eq!(err.kind(), "ArchiveFormatError");
    }

    #[test]
    fn test_import_missing_container() {
        let data = pack(&[ArchiveEntry::file(MIMETYPE_PATH, EPUB_MIMETYPE)], None).unwrap();
        let err = import_archive(&data).unwrap_err();
        assert_eq!(err.kind(), "InvalidContainerError");
    }

    #[test]
    fn test_import_missing_rootfile_entry() {
        let data = pack(
            &[
                ArchiveEntry::file(MIMETYPE_PATH, EPUB_MIMETYPE),
                ArchiveEntry::file(CONTAINER_PATH, fixtures::CONTAINER_XML),
            ],
            None,
        )
        .unwrap();
        let err = import_archive(&data).unwrap_err();
        assert!(matches!(err, EpubError::InvalidContainer(_)));
    }

    #[test]
    fn test_import_broken_package() {
        let data = pack(
            &[
                ArchiveEntry::file(CONTAINER_PATH, fixtures::CONTAINER_XML),
                ArchiveEntry::file("OEBPS/content.opf", "<package><metadata/></package>"),
            ],
            None,
        )
        .unwrap();
        let err = import_archive(&data).unwrap_err();
        assert_eq!(err.kind(), "InvalidPackageError");
    }

    #[test]
    fn test_classify_content() {
        assert_eq!(
            FileContent::classify("a.css", b"p {}".to_vec()),
            FileContent::Text("p {}".to_string())
        );
        assert_eq!(
            FileContent::classify("a.png", vec![0x89, b'P', b'N', b'G']),
            FileContent::Binary(vec![0x89, b'P', b'N', b'G'])
        );
        // Unknown extension, not UTF-8
        assert_eq!(
            FileContent::classify("blob.bin", vec![0xff, 0xfe, 0x00]),
            FileContent::Binary(vec![0xff, 0xfe, 0x00])
        );
    }

    #[test]
    fn test_file_content_serde_shape() {
        let json = serde_json::to_value(FileContent::Text("hi".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "text", "value": "hi" }));

        let back: FileContent =
            serde_json::from_value(serde_json::json!({ "kind": "binary", "value": [1, 2] })).unwrap();
        assert_eq!(back, FileContent::Binary(vec![1, 2]));
    }
}
