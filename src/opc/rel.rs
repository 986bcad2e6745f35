//! Relationship-related objects for OPC packages.
//!
//! Ported from the teacher's `ooxml::opc::rel` near verbatim: relationship
//! management is pure OPC plumbing with no WordprocessingML content in it.

use std::collections::HashMap;

use super::error::{OpcError, Result};
use super::packuri::PackURI;

#[derive(Debug, Clone)]
pub struct Relationship {
    r_id: String,
    reltype: String,
    target_ref: String,
    base_uri: String,
    is_external: bool,
}

impl Relationship {
    pub fn new(
        r_id: String,
        reltype: String,
        target_ref: String,
        base_uri: String,
        is_external: bool,
    ) -> Self {
        Self {
            r_id,
            reltype,
            target_ref,
            base_uri,
            is_external,
        }
    }

    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    pub fn target_partname(&self) -> Result<PackURI> {
        if self.is_external {
            return Err(OpcError::InvalidRelationship(
                "cannot get target_partname for external relationship".to_string(),
            ));
        }
        PackURI::from_rel_ref(&self.base_uri, &self.target_ref).map_err(OpcError::InvalidPackUri)
    }
}

/// Collection of relationships originating from a single source part.
#[derive(Debug)]
pub struct Relationships {
    base_uri: String,
    rels: HashMap<String, Relationship>,
}

impl Relationships {
    pub fn new(base_uri: String) -> Self {
        Self {
            base_uri,
            rels: HashMap::new(),
        }
    }

    pub fn add_relationship(
        &mut self,
        reltype: String,
        target_ref: String,
        r_id: String,
        is_external: bool,
    ) -> &Relationship {
        let rel = Relationship::new(r_id.clone(), reltype, target_ref, self.base_uri.clone(), is_external);
        self.rels.insert(r_id.clone(), rel);
        self.rels.get(r_id.as_str()).expect("just inserted")
    }

    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.get(r_id)
    }

    pub fn get_or_add(&mut self, reltype: &str, target_ref: &str) -> &Relationship {
        for rel in self.rels.values() {
            if rel.reltype() == reltype && rel.target_ref() == target_ref && !rel.is_external() {
                let r_id = rel.r_id().to_string();
                return self.rels.get(&r_id).expect("looked up by known key");
            }
        }
        let r_id = self.next_r_id();
        self.add_relationship(reltype.to_string(), target_ref.to_string(), r_id, false)
    }

    pub fn get_or_add_ext_rel(&mut self, reltype: &str, target_ref: &str) -> String {
        for rel in self.rels.values() {
            if rel.reltype() == reltype && rel.target_ref() == target_ref && rel.is_external() {
                return rel.r_id().to_string();
            }
        }
        let r_id = self.next_r_id();
        self.add_relationship(reltype.to_string(), target_ref.to_string(), r_id.clone(), true);
        r_id
    }

    /// Next `rIdN`, filling gaps if any exist.
    fn next_r_id(&self) -> String {
        let mut used_numbers: Vec<u32> = self
            .rels
            .keys()
            .filter_map(|r_id| {
                if r_id.len() > 3 && &r_id[..3] == "rId" {
                    atoi_simd::parse::<u32>(&r_id.as_bytes()[3..]).ok()
                } else {
                    None
                }
            })
            .collect();
        used_numbers.sort_unstable();

        let mut next_num = 1u32;
        for &num in &used_numbers {
            match num.cmp(&next_num) {
                std::cmp::Ordering::Equal => next_num += 1,
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Less => {}
            }
        }
        format!("rId{next_num}")
    }

    pub fn part_with_reltype(&self, reltype: &str) -> Result<&Relationship> {
        let matching: Vec<&Relationship> = self.rels.values().filter(|r| r.reltype() == reltype).collect();
        match matching.len() {
            0 => Err(OpcError::RelationshipNotFound(format!("no relationship of type '{reltype}'"))),
            1 => Ok(matching[0]),
            _ => Err(OpcError::InvalidRelationship(format!(
                "multiple relationships of type '{reltype}'"
            ))),
        }
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    pub fn remove(&mut self, r_id: &str) -> Option<Relationship> {
        self.rels.remove(r_id)
    }

    pub fn to_xml(&self) -> String {
        use crate::xml::escape::escape_xml;

        let mut xml = String::with_capacity(1024);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
        xml.push('\n');

        let mut rels: Vec<&Relationship> = self.rels.values().collect();
        rels.sort_by_key(|r| r.r_id());

        for rel in rels {
            let target_mode = if rel.is_external() { r#" TargetMode="External""# } else { "" };
            xml.push_str(&format!(
                r#"  <Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape_xml(rel.r_id()),
                escape_xml(rel.reltype()),
                escape_xml(rel.target_ref()),
                target_mode
            ));
            xml.push('\n');
        }
        xml.push_str("</Relationships>");
        xml
    }
}

impl Default for Relationships {
    fn default() -> Self {
        Self::new("/".to_string())
    }
}

/// Parse a `.rels` part's XML into a [`Relationships`] collection scoped to `base_uri`.
pub fn parse_rels_xml(xml: &[u8], base_uri: &str) -> Result<Relationships> {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut rels = Relationships::new(base_uri.to_string());
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| OpcError::InvalidRelationship(e.to_string()))?
        {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let (mut id, mut reltype, mut target, mut external) = (None, None, None, false);
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                        b"Type" => reltype = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                        b"Target" => target = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                        b"TargetMode" => external = attr.value.as_ref() == b"External",
                        _ => {}
                    }
                }
                if let (Some(id), Some(reltype), Some(target)) = (id, reltype, target) {
                    rels.add_relationship(reltype, target, id, external);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_r_id_fills_gaps() {
        let mut rels = Relationships::new("/word".to_string());
        rels.add_relationship("t1".into(), "a".into(), "rId1".into(), false);
        rels.add_relationship("t1".into(), "b".into(), "rId3".into(), false);
        assert_eq!(rels.next_r_id(), "rId2");
    }

    #[test]
    fn get_or_add_reuses_existing() {
        let mut rels = Relationships::new("/word".to_string());
        let id1 = rels.get_or_add("t1", "target1").r_id().to_string();
        let id2 = rels.get_or_add("t1", "target1").r_id().to_string();
        assert_eq!(id1, id2);
        let id3 = rels.get_or_add("t1", "target2").r_id().to_string();
        assert_ne!(id1, id3);
    }
}
