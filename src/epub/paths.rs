//! Conversions between manifest hrefs and archive paths
//!
//! Hrefs are relative to the directory holding the OPF and may be
//! percent-encoded; archive paths are root-relative and decoded.

use std::collections::HashMap;

use super::{ManifestItem, SpineItem};

/// Directory part of the package path ("" for an OPF at the archive root)
pub fn package_dir(package_path: &str) -> &str {
    package_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve a manifest href to an archive path
pub fn resolve_href(package_dir: &str, href: &str) -> String {
    let href = href.split(['#', '?']).next().unwrap_or(href);
    let href = urlencoding::decode(href)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| href.to_string());

    let mut segments: Vec<&str> = package_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Build the href of an archive path as seen from the package directory
pub fn relative_href(package_dir: &str, path: &str) -> String {
    let base: Vec<&str> = package_dir.split('/').filter(|s| !s.is_empty()).collect();
    let target: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // The last target segment is the file name and never part of the shared prefix
    let shared = base
        .iter()
        .zip(&target[..target.len().saturating_sub(1)])
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = std::iter::repeat("..".to_string())
        .take(base.len() - shared)
        .collect();
    parts.extend(
        target[shared..]
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned()),
    );
    parts.join("/")
}

/// Archive paths of the spine entries, in reading order.
///
/// Spine entries pointing at unknown manifest ids are skipped.
pub fn reading_order(package_path: &str, manifest: &[ManifestItem], spine: &[SpineItem]) -> Vec<String> {
    let dir = package_dir(package_path);
    let hrefs: HashMap<&str, &str> = manifest
        .iter()
        .map(|item| (item.id.as_str(), item.href.as_str()))
        .collect();

    spine
        .iter()
        .filter_map(|itemref| hrefs.get(itemref.idref.as_str()))
        .map(|href| resolve_href(dir, href))
        .collect()
}
