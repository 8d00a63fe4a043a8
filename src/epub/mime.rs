//! MIME type resolution for manifest generation

/// Media type of XHTML content documents, the only type placed in a generated spine
pub const XHTML_MIME_TYPE: &str = "application/xhtml+xml";

/// Fallback for extensions outside the table
pub const DEFAULT_MIME_TYPE: &str = "text/plain";

const MIME_TYPES: &[(&str, &str)] = &[
    ("html", XHTML_MIME_TYPE),
    ("xhtml", XHTML_MIME_TYPE),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
];

/// Resolve the MIME type of a file from its extension (case-insensitive)
pub fn resolve_mime_type(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return DEFAULT_MIME_TYPE;
    };

    MIME_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Whether content of this type is edited as text
pub fn is_text_mime_type(mime: &str) -> bool {
    mime.starts_with("text/") || mime.ends_with("+xml") || mime == "application/javascript"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(resolve_mime_type("OEBPS/chapter1.xhtml"), XHTML_MIME_TYPE);
        assert_eq!(resolve_mime_type("index.html"), XHTML_MIME_TYPE);
        assert_eq!(resolve_mime_type("styles/main.css"), "text/css");
        assert_eq!(resolve_mime_type("cover.jpeg"), "image/jpeg");
        assert_eq!(resolve_mime_type("fonts/serif.woff2"), "font/woff2");
        assert_eq!(resolve_mime_type("images/map.svg"), "image/svg+xml");
    }

    #[test]
    fn test_unknown_extensions() {
        assert_eq!(resolve_mime_type("unknown.xyz"), "text/plain");
        assert_eq!(resolve_mime_type("mimetype"), "text/plain");
        assert_eq!(resolve_mime_type(""), "text/plain");
        assert_eq!(resolve_mime_type("trailing."), "text/plain");
        // A dot in a directory name is not an extension
        assert_eq!(resolve_mime_type("OEBPS.png/readme"), "text/plain");
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(resolve_mime_type("IMG.PNG"), resolve_mime_type("img.png"));
        assert_eq!(resolve_mime_type("Chapter.XHTML"), XHTML_MIME_TYPE);
    }

    #[test]
    fn test_text_classification() {
        assert!(is_text_mime_type(XHTML_MIME_TYPE));
        assert!(is_text_mime_type("text/css"));
        assert!(is_text_mime_type("image/svg+xml"));
        assert!(is_text_mime_type("application/javascript"));
        assert!(!is_text_mime_type("image/png"));
        assert!(!is_text_mime_type("font/woff"));
    }
}
