//! OPF (Open Packaging Format) parser and writer
//!
//! Reads metadata, manifest and spine out of a package document and writes
//! them back as an EPUB 3 package.

use std::collections::HashSet;
use std::io::Cursor;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{parse_xml, EpubError, ManifestItem, PackageMetadata, Result, SpineItem};

const OPF_NS: &str = "http://www.idpf.org/2007/opf";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// Dublin Core 1.0, still bound to `dc:` by some OEB-era packages
const DC_LEGACY_NS: &str = "http://purl.org/dc/elements/1.0/";

/// Unique identifier id used by generated packages
const UID: &str = "uid";

/// Parsed OPF structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPackage {
    pub metadata: PackageMetadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
}

/// Parse an OPF package document
pub fn parse_package(content: &str) -> Result<ParsedPackage> {
    let doc = parse_xml(content).map_err(|e| EpubError::InvalidPackage(e.to_string()))?;

    let package = doc.root_element();
    if package.tag_name().name() != "package" {
        return Err(EpubError::InvalidPackage(format!(
            "unexpected root element <{}>",
            package.tag_name().name()
        )));
    }

    let metadata = parse_metadata(&required_child(&package, "metadata")?);
    let manifest = parse_manifest(&required_child(&package, "manifest")?)?;
    let spine = parse_spine(&required_child(&package, "spine")?, &manifest)?;

    Ok(ParsedPackage {
        metadata,
        manifest,
        spine,
    })
}

fn required_child<'a, 'input>(
    parent: &roxmltree::Node<'a, 'input>,
    name: &str,
) -> Result<roxmltree::Node<'a, 'input>> {
    parent
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .ok_or_else(|| EpubError::InvalidPackage(format!("missing <{}> element", name)))
}

fn parse_metadata(metadata: &roxmltree::Node) -> PackageMetadata {
    let defaults = PackageMetadata::default();

    PackageMetadata {
        title: dc_text(metadata, "title").unwrap_or(defaults.title),
        author: dc_text(metadata, "creator").unwrap_or(defaults.author),
        language: dc_text(metadata, "language").unwrap_or(defaults.language),
        identifier: dc_text(metadata, "identifier").unwrap_or(defaults.identifier),
    }
}

/// Text of the first Dublin Core element with this name, if it has any
fn dc_text(metadata: &roxmltree::Node, name: &str) -> Option<String> {
    let node = metadata.children().find(|n| {
        n.is_element()
            && n.tag_name().name() == name
            && matches!(n.tag_name().namespace(), Some(DC_NS | DC_LEGACY_NS))
    })?;

    let text = get_text_content(&node);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Get text content from a node recursively
fn get_text_content(node: &roxmltree::Node) -> String {
    let mut text = String::new();
    for child in node.children() {
        if child.is_text() {
            if let Some(t) = child.text() {
                text.push_str(t);
            }
        } else {
            text.push_str(&get_text_content(&child));
        }
    }
    text
}

fn parse_manifest(manifest: &roxmltree::Node) -> Result<Vec<ManifestItem>> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();

    for node in manifest
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "item")
    {
        let item = ManifestItem {
            id: required_attribute(&node, "id")?,
            href: required_attribute(&node, "href")?,
            media_type: required_attribute(&node, "media-type")?,
        };
        if !seen.insert(item.id.clone()) {
            return Err(EpubError::InvalidPackage(format!(
                "duplicate manifest id '{}'",
                item.id
            )));
        }
        items.push(item);
    }

    Ok(items)
}

fn parse_spine(spine: &roxmltree::Node, manifest: &[ManifestItem]) -> Result<Vec<SpineItem>> {
    spine
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "itemref")
        .map(|node| {
            let idref = required_attribute(&node, "idref")?;
            if !manifest.iter().any(|item| item.id == idref) {
                return Err(EpubError::InvalidPackage(format!(
                    "spine references unknown manifest id '{}'",
                    idref
                )));
            }
            Ok(SpineItem { idref })
        })
        .collect()
}

fn required_attribute(node: &roxmltree::Node, name: &str) -> Result<String> {
    node.attribute(name).map(|s| s.to_string()).ok_or_else(|| {
        EpubError::InvalidPackage(format!(
            "<{}> is missing the {} attribute",
            node.tag_name().name(),
            name
        ))
    })
}

/// Serialize an EPUB 3 package document
pub fn write_package(
    metadata: &PackageMetadata,
    manifest: &[ManifestItem],
    spine: &[SpineItem],
    modified: DateTime<Utc>,
) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut package = BytesStart::new("package");
    package.push_attribute(("version", "3.0"));
    package.push_attribute(("xmlns", OPF_NS));
    package.push_attribute(("unique-identifier", UID));
    writer.write_event(Event::Start(package))?;

    // Metadata
    let mut metadata_elem = BytesStart::new("metadata");
    metadata_elem.push_attribute(("xmlns:dc", DC_NS));
    writer.write_event(Event::Start(metadata_elem))?;
    write_simple_element(&mut writer, BytesStart::new("dc:title"), &metadata.title)?;
    write_simple_element(&mut writer, BytesStart::new("dc:creator"), &metadata.author)?;
    write_simple_element(&mut writer, BytesStart::new("dc:language"), &metadata.language)?;

    let mut identifier = BytesStart::new("dc:identifier");
    identifier.push_attribute(("id", UID));
    write_simple_element(&mut writer, identifier, &metadata.identifier)?;

    let mut meta = BytesStart::new("meta");
    meta.push_attribute(("property", "dcterms:modified"));
    write_simple_element(
        &mut writer,
        meta,
        &modified.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    )?;
    writer.write_event(Event::End(BytesEnd::new("metadata")))?;

    // Manifest
    writer.write_event(Event::Start(BytesStart::new("manifest")))?;
    for item in manifest {
        let mut elem = BytesStart::new("item");
        elem.push_attribute(("id", item.id.as_str()));
        elem.push_attribute(("href", item.href.as_str()));
        elem.push_attribute(("media-type", item.media_type.as_str()));
        writer.write_event(Event::Empty(elem))?;
    }
    writer.write_event(Event::End(BytesEnd::new("manifest")))?;

    // Spine
    writer.write_event(Event::Start(BytesStart::new("spine")))?;
    for itemref in spine {
        let mut elem = BytesStart::new("itemref");
        elem.push_attribute(("idref", itemref.idref.as_str()));
        writer.write_event(Event::Empty(elem))?;
    }
    writer.write_event(Event::End(BytesEnd::new("spine")))?;

    writer.write_event(Event::End(BytesEnd::new("package")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn write_simple_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    start: BytesStart,
    value: &str,
) -> Result<()> {
    let end = BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(end))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SIMPLE_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="bookid">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
        <dc:title>Test Book</dc:title>
        <dc:title>Second Title</dc:title>
        <dc:creator opf:role="aut" opf:file-as="Author, Test">Test Author</dc:creator>
        <dc:language>en-GB</dc:language>
        <dc:identifier id="bookid" opf:scheme="ISBN">978-3-16-148410-0</dc:identifier>
    </metadata>
    <manifest>
        <item id="chapter1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
        <item id="css" href="style.css" media-type="text/css"/>
    </manifest>
    <spine toc="ncx">
        <itemref idref="chapter1"/>
    </spine>
</package>"#;

    fn modified() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_parse_simple_opf() {
        let parsed = parse_package(SIMPLE_OPF).unwrap();

        assert_eq!(parsed.metadata.title, "Test Book");
        assert_eq!(parsed.metadata.author, "Test Author");
        assert_eq!(parsed.metadata.language, "en-GB");
        assert_eq!(parsed.metadata.identifier, "978-3-16-148410-0");
        assert_eq!(parsed.manifest.len(), 2);
        assert_eq!(parsed.manifest[1].media_type, "text/css");
        assert_eq!(parsed.spine, vec![SpineItem { idref: "chapter1".to_string() }]);
    }

    #[test]
    fn test_metadata_defaults_applied_independently() {
        let opf = r#"<package xmlns="http://www.idpf.org/2007/opf">
            <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Only Title</dc:title></metadata>
            <manifest/>
            <spine/>
        </package>"#;
        let parsed = parse_package(opf).unwrap();

        assert_eq!(parsed.metadata.title, "Only Title");
        assert_eq!(parsed.metadata.author, "Unknown Author");
        assert_eq!(parsed.metadata.language, "en");
        assert_eq!(parsed.metadata.identifier, "");
        assert!(parsed.manifest.is_empty());
        assert!(parsed.spine.is_empty());
    }

    #[test]
    fn test_empty_elements_fall_back() {
        let opf = r#"<package xmlns="http://www.idpf.org/2007/opf">
            <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
                <dc:title>  </dc:title>
                <dc:identifier id="uid"/>
            </metadata>
            <manifest/>
            <spine/>
        </package>"#;
        let parsed = parse_package(opf).unwrap();
        assert_eq!(parsed.metadata, PackageMetadata::default());
    }

    #[test]
    fn test_doctype_prolog() {
        let opf = r#"<?xml version="1.0"?>
<!DOCTYPE package PUBLIC "+//ISBN 0-9673008-1-9//DTD OEB 1.2 Package//EN" "http://openebook.org/dtds/oeb-1.2/oebpkg12.dtd">
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="id">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
        <dc:title>Old Book</dc:title>
    </metadata>
    <manifest>
        <item id="c1" href="c1.html" media-type="application/xhtml+xml"/>
    </manifest>
    <spine>
        <itemref idref="c1"/>
    </spine>
</package>"#;
        let parsed = parse_package(opf).unwrap();
        assert_eq!(parsed.metadata.title, "Old Book");
        assert_eq!(parsed.spine.len(), 1);
    }

    #[test]
    fn test_dublin_core_1_0_namespace() {
        let opf = r#"<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.0/">
        <dc:title>Legacy Title</dc:title>
        <dc:creator>Legacy Author</dc:creator>
    </metadata>
    <manifest/>
    <spine/>
</package>"#;
        let parsed = parse_package(opf).unwrap();
        assert_eq!(parsed.metadata.title, "Legacy Title");
        assert_eq!(parsed.metadata.author, "Legacy Author");
        assert_eq!(parsed.metadata.language, "en");
    }

    #[test]
    fn test_missing_sections() {
        for opf in [
            r#"<notpackage/>"#,
            r#"<package><manifest/><spine/></package>"#,
            r#"<package><metadata/><spine/></package>"#,
            r#"<package><metadata/><manifest/></package>"#,
            "",
        ] {
            let err = parse_package(opf).unwrap_err();
            assert_eq!(err.kind(), "InvalidPackageError", "input: {:?}", opf);
        }
    }

    #[test]
    fn test_missing_attributes() {
        let opf = r#"<package><metadata/><manifest><item id="a" href="a.xhtml"/></manifest><spine/></package>"#;
        assert!(matches!(parse_package(opf), Err(EpubError::InvalidPackage(_))));

        let opf = r#"<package><metadata/><manifest/><spine><itemref/></spine></package>"#;
        assert!(matches!(parse_package(opf), Err(EpubError::InvalidPackage(_))));
    }

    #[test]
    fn test_duplicate_and_dangling_ids() {
        let opf = r#"<package><metadata/><manifest>
            <item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
            <item id="a" href="b.xhtml" media-type="application/xhtml+xml"/>
        </manifest><spine/></package>"#;
        assert!(matches!(parse_package(opf), Err(EpubError::InvalidPackage(_))));

        let opf = r#"<package><metadata/><manifest/><spine><itemref idref="ghost"/></spine></package>"#;
        assert!(matches!(parse_package(opf), Err(EpubError::InvalidPackage(_))));
    }

    #[test]
    fn test_write_and_parse_back() {
        let metadata = PackageMetadata {
            title: "Tom & Jerry <Collected> \"Edition\"".to_string(),
            author: "A > B".to_string(),
            language: "en".to_string(),
            identifier: "urn:uuid:1234".to_string(),
        };
        let manifest = vec![ManifestItem {
            id: "item1".to_string(),
            href: "a&b.xhtml".to_string(),
            media_type: "application/xhtml+xml".to_string(),
        }];
        let spine = vec![SpineItem { idref: "item1".to_string() }];

        let xml = write_package(&metadata, &manifest, &spine, modified()).unwrap();
        assert!(xml.contains("<meta property=\"dcterms:modified\">2024-05-01T12:30:00Z</meta>"));
        assert!(xml.contains("<dc:identifier id=\"uid\">urn:uuid:1234</dc:identifier>"));

        let parsed = parse_package(&xml).unwrap();
        assert_eq!(parsed.metadata, metadata);
        assert_eq!(parsed.manifest, manifest);
        assert_eq!(parsed.spine, spine);
    }

    #[test]
    fn test_write_empty_package() {
        let xml = write_package(&PackageMetadata::default(), &[], &[], modified()).unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(doc.root_element().attribute("unique-identifier"), Some("uid"));
        assert_eq!(doc.root_element().tag_name().namespace(), Some(OPF_NS));
    }
}
