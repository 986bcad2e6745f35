//! `[Content_Types].xml` parsing/serialization.
//!
//! Grounded on the teacher's `ooxml::opc::pkgreader::ContentTypeMap`, which
//! parses the same `<Default Extension=.. ContentType=..>` /
//! `<Override PartName=.. ContentType=..>` element pairs; this is a flat
//! attribute list so it is parsed with a plain `quick_xml::Reader` rather
//! than going through the full DOM arena.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::constants::{content_type, DEFAULT_EXTENSIONS};
use super::error::{OpcError, Result};

#[derive(Debug, Default, Clone)]
pub struct ContentTypeMap {
    pub defaults: HashMap<String, String>,
    pub overrides: HashMap<String, String>,
}

impl ContentTypeMap {
    pub fn bootstrap() -> Self {
        let mut defaults = HashMap::new();
        for (ext, ct) in DEFAULT_EXTENSIONS {
            defaults.insert(ext.to_string(), ct.to_string());
        }
        Self {
            defaults,
            overrides: HashMap::new(),
        }
    }

    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut map = Self::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf).map_err(|e| OpcError::InvalidRelationship(e.to_string()))? {
                Event::Empty(e) | Event::Start(e) => {
                    let local = e.local_name();
                    let local = local.as_ref();
                    if local == b"Default" {
                        let (mut ext, mut ct) = (None, None);
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"Extension" => ext = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                                b"ContentType" => ct = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                                _ => {}
                            }
                        }
                        if let (Some(ext), Some(ct)) = (ext, ct) {
                            map.defaults.insert(ext, ct);
                        }
                    } else if local == b"Override" {
                        let (mut pn, mut ct) = (None, None);
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"PartName" => pn = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                                b"ContentType" => ct = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                                _ => {}
                            }
                        }
                        if let (Some(pn), Some(ct)) = (pn, ct) {
                            map.overrides.insert(pn, ct);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(map)
    }

    pub fn content_type_for(&self, partname: &str, ext: &str) -> Option<&str> {
        self.overrides
            .get(partname)
            .or_else(|| self.defaults.get(ext))
            .map(|s| s.as_str())
    }

    pub fn set_override(&mut self, partname: impl Into<String>, content_type: impl Into<String>) {
        self.overrides.insert(partname.into(), content_type.into());
    }

    pub fn to_xml(&self) -> String {
        use crate::xml::escape::escape_xml;

        let mut xml = String::with_capacity(1024);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<Types xmlns="{}">"#,
            content_type::CONTENT_TYPES
        ));
        xml.push('\n');

        let mut defaults: Vec<(&String, &String)> = self.defaults.iter().collect();
        defaults.sort_by_key(|(ext, _)| ext.as_str());
        for (ext, ct) in defaults {
            xml.push_str(&format!(
                r#"  <Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(ct)
            ));
            xml.push('\n');
        }

        let mut overrides: Vec<(&String, &String)> = self.overrides.iter().collect();
        overrides.sort_by_key(|(pn, _)| pn.as_str());
        for (pn, ct) in overrides {
            xml.push_str(&format!(
                r#"  <Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(pn),
                escape_xml(ct)
            ));
            xml.push('\n');
        }
        xml.push_str("</Types>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults_and_overrides() {
        let xml = br#"<?xml version="1.0"?>
        <Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
          <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
          <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
        </Types>"#;
        let map = ContentTypeMap::parse(xml).unwrap();
        assert_eq!(map.defaults.get("rels").unwrap(), "application/vnd.openxmlformats-package.relationships+xml");
        assert!(map.overrides.contains_key("/word/document.xml"));
    }
}
