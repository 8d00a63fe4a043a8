//! Export composition
//!
//! Derives a fresh manifest and spine from the current file set, writes the
//! container pointer and OPF, and packs everything into an EPUB archive.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::archive::dedup_entries;
use super::container::{write_container, CONTAINER_PATH};
use super::mime::{resolve_mime_type, XHTML_MIME_TYPE};
use super::opf::write_package;
use super::paths::relative_href;
use super::{
    pack, ArchiveEntry, ManifestItem, PackageMetadata, Result, SpineItem, EPUB_MIMETYPE,
    MIMETYPE_PATH,
};
use crate::config::{EditorConfig, SpinePolicy};

/// Manifest and spine derived for an export, plus the files they describe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDocument<'a> {
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    /// Files listed in the manifest, in manifest order
    pub content: Vec<&'a ArchiveEntry>,
    /// META-INF files carried into the archive without a manifest entry
    pub passthrough: Vec<&'a ArchiveEntry>,
}

/// What happens to a file of the edited set on export
enum Disposition {
    /// Listed in the manifest
    Content,
    /// Copied verbatim, not listed
    Passthrough,
    /// Replaced by a generated file
    Regenerated,
}

fn disposition(entry: &ArchiveEntry) -> Disposition {
    let path = entry.path.as_str();
    if entry.is_directory
        || path == MIMETYPE_PATH
        || path == CONTAINER_PATH
        || path.to_ascii_lowercase().ends_with(".opf")
    {
        Disposition::Regenerated
    } else if path.starts_with("META-INF/") {
        Disposition::Passthrough
    } else {
        Disposition::Content
    }
}

/// Derive manifest and spine for `files`.
///
/// Item ids are `item1`, `item2`, ... in file-set order, so the same file set
/// always yields the same package. A path listed twice is taken once, with
/// its last content.
pub fn derive_package<'a>(
    files: &'a [ArchiveEntry],
    config: &EditorConfig,
    reading_order: &[String],
) -> PackageDocument<'a> {
    let mut content = Vec::new();
    let mut passthrough = Vec::new();
    for entry in dedup_entries(files) {
        match disposition(entry) {
            Disposition::Content => content.push(entry),
            Disposition::Passthrough => passthrough.push(entry),
            Disposition::Regenerated => {
                tracing::debug!("Dropping {} from export, it is regenerated", entry.path);
            }
        }
    }

    let package_dir = config.package_dir();
    let manifest: Vec<ManifestItem> = content
        .iter()
        .enumerate()
        .map(|(idx, entry)| ManifestItem {
            id: format!("item{}", idx + 1),
            href: relative_href(package_dir, &entry.path),
            media_type: resolve_mime_type(&entry.path).to_string(),
        })
        .collect();

    // Positions of XHTML documents within `content`/`manifest`
    let documents: Vec<usize> = manifest
        .iter()
        .enumerate()
        .filter(|(_, item)| item.media_type == XHTML_MIME_TYPE)
        .map(|(idx, _)| idx)
        .collect();

    let order: Vec<usize> = match config.spine_policy {
        SpinePolicy::FileOrder => documents,
        SpinePolicy::PreserveImported => {
            let mut placed = HashSet::new();
            let mut order = Vec::with_capacity(documents.len());
            for path in reading_order {
                if let Some(&idx) = documents.iter().find(|&&idx| content[idx].path == *path) {
                    if placed.insert(idx) {
                        order.push(idx);
                    }
                }
            }
            order.extend(documents.into_iter().filter(|idx| !placed.contains(idx)));
            order
        }
    };

    let spine = order
        .into_iter()
        .map(|idx| SpineItem {
            idref: manifest[idx].id.clone(),
        })
        .collect();

    PackageDocument {
        manifest,
        spine,
        content,
        passthrough,
    }
}

/// Build a complete EPUB archive from an edited file set
pub fn compose_archive(
    files: &[ArchiveEntry],
    metadata: &PackageMetadata,
    config: &EditorConfig,
    reading_order: &[String],
) -> Result<Vec<u8>> {
    compose_archive_at(files, metadata, config, reading_order, Utc::now())
}

pub(crate) fn compose_archive_at(
    files: &[ArchiveEntry],
    metadata: &PackageMetadata,
    config: &EditorConfig,
    reading_order: &[String],
    modified: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let document = derive_package(files, config, reading_order);
    let opf = write_package(metadata, &document.manifest, &document.spine, modified)?;

    let mut entries = Vec::with_capacity(document.content.len() + document.passthrough.len() + 3);
    entries.push(ArchiveEntry::file(MIMETYPE_PATH, EPUB_MIMETYPE));
    entries.push(ArchiveEntry::file(CONTAINER_PATH, write_container(&config.package_path)?));
    entries.extend(document.passthrough.iter().map(|&entry| entry.clone()));
    entries.push(ArchiveEntry::file(config.package_path.as_str(), opf));
    entries.extend(document.content.iter().map(|&entry| entry.clone()));

    let data = pack(&entries, config.compression_level)?;
    tracing::info!(
        "Exported \"{}\": {} manifest items, {} spine items, {} bytes",
        metadata.title,
        document.manifest.len(),
        document.spine.len(),
        data.len()
    );
    Ok(data)
}
