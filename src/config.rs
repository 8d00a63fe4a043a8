//! Editor configuration

use serde::{Deserialize, Serialize};
use std::env;

/// How the spine of an exported package is ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpinePolicy {
    /// XHTML files in file-set order
    #[default]
    FileOrder,
    /// The imported reading order first, then any new XHTML files in file-set order
    PreserveImported,
}

impl SpinePolicy {
    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "preserveimported" | "preserve" => SpinePolicy::PreserveImported,
            _ => SpinePolicy::FileOrder,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Archive path of the generated OPF
    pub package_path: String,
    pub spine_policy: SpinePolicy,
    /// Deflate level for packed entries (library default when unset)
    pub compression_level: Option<i32>,
    /// Name of the project metadata file kept next to the extracted files
    pub sidecar_name: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            package_path: "OEBPS/content.opf".to_string(),
            spine_policy: SpinePolicy::FileOrder,
            compression_level: None,
            sidecar_name: "metadata.json".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn from_env() -> Self {
        let defaults = EditorConfig::default();
        EditorConfig {
            package_path: env::var("EPUB_PACKAGE_PATH")
                .ok()
                .map(|path| path.trim_matches('/').to_string())
                .filter(|path| !path.is_empty())
                .unwrap_or(defaults.package_path),
            spine_policy: env::var("EPUB_SPINE_POLICY")
                .map(|name| SpinePolicy::from_name(&name))
                .unwrap_or(defaults.spine_policy),
            compression_level: env::var("EPUB_COMPRESSION_LEVEL")
                .ok()
                .and_then(|level| level.parse().ok()),
            sidecar_name: env::var("EPUB_SIDECAR_NAME").unwrap_or(defaults.sidecar_name),
        }
    }

    /// Directory holding the generated OPF ("" when it sits at the archive root)
    pub fn package_dir(&self) -> &str {
        crate::epub::paths::package_dir(&self.package_path)
    }
}
