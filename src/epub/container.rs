//! OCF container pointer (`META-INF/container.xml`)

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use super::{parse_xml, EpubError, Result};

/// Archive path of the container pointer
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

const CONTAINER_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:container";
const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// Resolve the package document path. Only the first rootfile is honored.
pub fn resolve_rootfile(container_xml: &str) -> Result<String> {
    let doc = parse_xml(container_xml).map_err(|e| EpubError::InvalidContainer(e.to_string()))?;

    let rootfile = rootfile_nodes(&doc)?
        .next()
        .ok_or_else(|| EpubError::InvalidContainer("no <rootfile> element".to_string()))?;

    match rootfile.attribute("full-path") {
        Some(path) if !path.trim().is_empty() => Ok(path.trim().to_string()),
        _ => Err(EpubError::InvalidContainer(
            "<rootfile> has no full-path attribute".to_string(),
        )),
    }
}

/// Every rootfile path in document order; entries without `full-path` are skipped
pub fn rootfile_paths(container_xml: &str) -> Result<Vec<String>> {
    let doc = parse_xml(container_xml).map_err(|e| EpubError::InvalidContainer(e.to_string()))?;

    let paths: Vec<String> = rootfile_nodes(&doc)?
        .filter_map(|node| node.attribute("full-path"))
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .collect();
    Ok(paths)
}

fn rootfile_nodes<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
) -> Result<impl Iterator<Item = roxmltree::Node<'a, 'input>>> {
    let root = doc.root_element();
    if root.tag_name().name() != "container" {
        return Err(EpubError::InvalidContainer(format!(
            "unexpected root element <{}>",
            root.tag_name().name()
        )));
    }

    let rootfiles = root
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "rootfiles")
        .ok_or_else(|| EpubError::InvalidContainer("no <rootfiles> element".to_string()))?;

    Ok(rootfiles
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "rootfile"))
}

/// Build a container pointer naming `package_path` as the single rootfile
pub fn write_container(package_path: &str) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut container = BytesStart::new("container");
    container.push_attribute(("version", "1.0"));
    container.push_attribute(("xmlns", CONTAINER_NS));
    writer.write_event(Event::Start(container))?;
    writer.write_event(Event::Start(BytesStart::new("rootfiles")))?;

    let mut rootfile = BytesStart::new("rootfile");
    rootfile.push_attribute(("full-path", package_path));
    rootfile.push_attribute(("media-type", PACKAGE_MEDIA_TYPE));
    writer.write_event(Event::Empty(rootfile))?;

    writer.write_event(Event::End(BytesEnd::new("rootfiles")))?;
    writer.write_event(Event::End(BytesEnd::new("container")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OPS/package.opf" media-type="application/oebps-package+xml"/>
    <rootfile full-path="OPS/alt.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    #[test]
    fn test_resolve_first_rootfile() {
        assert_eq!(resolve_rootfile(CONTAINER).unwrap(), "OPS/package.opf");
        assert_eq!(
            rootfile_paths(CONTAINER).unwrap(),
            vec!["OPS/package.opf".to_string(), "OPS/alt.opf".to_string()]
        );
    }

    #[test]
    fn test_doctype_is_accepted() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE container>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/book.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;
        assert_eq!(resolve_rootfile(xml).unwrap(), "OEBPS/book.opf");
        assert_eq!(rootfile_paths(xml).unwrap(), vec!["OEBPS/book.opf".to_string()]);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(resolve_rootfile(""), Err(EpubError::InvalidContainer(_))));
    }

    #[test]
    fn test_missing_rootfile() {
        let xml = r#"<container xmlns="urn:oasis:names:tc:opendocument:xmlns:container"><rootfiles/></container>"#;
        assert!(matches!(resolve_rootfile(xml), Err(EpubError::InvalidContainer(_))));

        let xml = r#"<container><something/></container>"#;
        assert!(matches!(resolve_rootfile(xml), Err(EpubError::InvalidContainer(_))));
    }

    #[test]
    fn test_missing_full_path() {
        let xml = r#"<container><rootfiles><rootfile media-type="application/oebps-package+xml"/></rootfiles></container>"#;
        let err = resolve_rootfile(xml).unwrap_err();
        assert_eq!(err.kind(), "InvalidContainerError");
    }

    #[test]
    fn test_wrong_root() {
        let xml = r#"<package><rootfiles><rootfile full-path="a.opf"/></rootfiles></package>"#;
        assert!(matches!(resolve_rootfile(xml), Err(EpubError::InvalidContainer(_))));
    }

    #[test]
    fn test_write_container() {
        let xml = write_container("OEBPS/content.opf").unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert_eq!(resolve_rootfile(&xml).unwrap(), "OEBPS/content.opf");

        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(doc.root_element().tag_name().namespace(), Some(CONTAINER_NS));
    }

    #[test]
    fn test_write_container_escapes_path() {
        let xml = write_container("OEBPS/a&b\".opf").unwrap();
        assert_eq!(resolve_rootfile(&xml).unwrap(), "OEBPS/a&b\".opf");
    }
}
