//! ZIP container codec
//!
//! Converts between archive bytes and a flat list of entries.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use unicode_normalization::UnicodeNormalization;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{ArchiveEntry, EpubError, FileContent, Result, MIMETYPE_PATH};

/// Unpack every file in the archive, in archive order. Directories are skipped.
pub fn unpack(data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        let path = normalize_entry_name(file.name())?;
        let mut content = Vec::new();
        file.read_to_end(&mut content).map_err(ZipError::Io)?;

        entries.push(ArchiveEntry {
            content: FileContent::classify(&path, content),
            path,
            is_directory: false,
        });
    }

    tracing::debug!("Unpacked {} entries", entries.len());
    Ok(entries)
}

/// Pack entries into a new archive.
///
/// A path given more than once is written once, with the last content given.
/// A `mimetype` entry is written first and stored uncompressed, as OCF requires.
/// Everything else is deflated in the order given.
pub fn pack(entries: &[ArchiveEntry], compression_level: Option<i32>) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(compression_level);
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);

    let entries = dedup_entries(entries);

    let mimetype = entries.iter().find(|e| e.path == MIMETYPE_PATH && !e.is_directory);
    if let Some(entry) = mimetype {
        writer.start_file(MIMETYPE_PATH, stored).map_err(write_error)?;
        writer.write_all(entry.content.as_bytes()).map_err(write_error)?;
    }

    for entry in entries {
        if entry.is_directory {
            writer.add_directory(entry.path.as_str(), deflated).map_err(write_error)?;
            continue;
        }
        if entry.path == MIMETYPE_PATH {
            continue;
        }
        writer.start_file(entry.path.as_str(), deflated).map_err(write_error)?;
        writer.write_all(entry.content.as_bytes()).map_err(write_error)?;
    }

    let cursor = writer.finish().map_err(write_error)?;
    Ok(cursor.into_inner())
}

/// Collapse repeated paths: the last entry wins, at the position of the first
pub(crate) fn dedup_entries(entries: &[ArchiveEntry]) -> Vec<&ArchiveEntry> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<&ArchiveEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        match positions.get(entry.path.as_str()) {
            Some(&idx) => {
                tracing::warn!("Duplicate entry {}, keeping the last one", entry.path);
                unique[idx] = entry;
            }
            None => {
                positions.insert(entry.path.as_str(), unique.len());
                unique.push(entry);
            }
        }
    }
    unique
}

fn write_error(e: impl std::fmt::Display) -> EpubError {
    EpubError::ArchiveWrite(e.to_string())
}

/// NFC-normalize an entry name, dropping `.` and empty segments, and reject
/// names that escape the archive root
fn normalize_entry_name(name: &str) -> Result<String> {
    let name = name.replace('\\', "/");
    if name.starts_with('/') || name.split('/').any(|segment| segment == "..") {
        return Err(EpubError::UnsafeEntry(name));
    }

    let segments: Vec<&str> = name
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    if segments.is_empty() {
        return Err(EpubError::UnsafeEntry(name));
    }
    Ok(segments.join("/").nfc().collect())
}
