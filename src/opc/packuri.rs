//! The `PackURI` value type: a partname within an OPC package.
//!
//! Ported from the teacher's `ooxml::opc::packuri` near verbatim — this is
//! pure Open Packaging Conventions bookkeeping (path joining/normalization,
//! `.rels` sibling computation) with no WordprocessingML-specific behavior,
//! so there is nothing in it to "transform" for this spec.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackURI {
    uri: String,
}

impl PackURI {
    pub fn new<S: Into<String>>(uri: S) -> Result<Self, String> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(format!("PackURI must begin with slash, got '{uri}'"));
        }
        Ok(PackURI { uri })
    }

    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self, String> {
        let joined = Self::join_paths(base_uri, relative_ref);
        let normalized = Self::normalize_path(&joined);
        Self::new(normalized)
    }

    pub fn base_uri(&self) -> &str {
        if self.uri == "/" {
            return "/";
        }
        match self.uri.rfind('/') {
            Some(0) => "/",
            Some(pos) => &self.uri[..pos],
            None => "/",
        }
    }

    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    pub fn ext(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(pos) => &filename[pos + 1..],
            None => "",
        }
    }

    pub fn membername(&self) -> &str {
        if self.uri == "/" {
            ""
        } else {
            &self.uri[1..]
        }
    }

    pub fn relative_ref(&self, base_uri: &str) -> String {
        if base_uri == "/" {
            return self.membername().to_string();
        }

        let from_parts: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to_parts: Vec<&str> = self.uri.split('/').filter(|s| !s.is_empty()).collect();

        let common = from_parts
            .iter()
            .zip(to_parts.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut result = String::new();
        for _ in common..from_parts.len() {
            result.push_str("../");
        }
        for (i, part) in to_parts.iter().enumerate().skip(common) {
            if i > common {
                result.push('/');
            }
            result.push_str(part);
        }
        result
    }

    /// The `.rels` part corresponding to this partname, e.g.
    /// `/word/_rels/document.xml.rels` for `/word/document.xml`.
    pub fn rels_uri(&self) -> Result<PackURI, String> {
        let filename = self.filename();
        let base_uri = self.base_uri();
        let rels_filename = format!("{filename}.rels");
        let rels_uri_str = if base_uri == "/" {
            format!("/_rels/{rels_filename}")
        } else {
            format!("{base_uri}/_rels/{rels_filename}")
        };
        Self::new(rels_uri_str)
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    fn join_paths(base: &str, rel: &str) -> String {
        if base.ends_with('/') {
            format!("{base}{rel}")
        } else {
            format!("{base}/{rel}")
        }
    }

    fn normalize_path(path: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for part in path.split('/') {
            match part {
                "" | "." => {
                    if parts.is_empty() {
                        parts.push("");
                    }
                }
                ".." => {
                    if parts.len() > 1 {
                        parts.pop();
                    }
                }
                _ => parts.push(part),
            }
        }
        if parts.is_empty() || (parts.len() == 1 && parts[0].is_empty()) {
            return "/".to_string();
        }
        parts.join("/")
    }
}

impl std::fmt::Display for PackURI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

pub const PACKAGE_URI: &str = "/";
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_leading_slash() {
        assert!(PackURI::new("/word/document.xml").is_ok());
        assert!(PackURI::new("word/document.xml").is_err());
    }

    #[test]
    fn base_uri_and_filename() {
        let uri = PackURI::new("/word/_rels/document.xml.rels").unwrap();
        assert_eq!(uri.base_uri(), "/word/_rels");
        assert_eq!(uri.filename(), "document.xml.rels");
    }

    #[test]
    fn membername_strips_leading_slash() {
        let uri = PackURI::new("/word/document.xml").unwrap();
        assert_eq!(uri.membername(), "word/document.xml");
        assert_eq!(PackURI::new("/").unwrap().membername(), "");
    }

    #[test]
    fn rels_uri_nests_under_base() {
        let uri = PackURI::new("/word/document.xml").unwrap();
        assert_eq!(uri.rels_uri().unwrap().as_str(), "/word/_rels/document.xml.rels");

        let root = PackURI::new("/").unwrap();
        assert_eq!(root.rels_uri().unwrap().as_str(), "/_rels/.rels");
    }

    #[test]
    fn from_rel_ref_resolves_relative_paths() {
        let resolved = PackURI::from_rel_ref("/word", "../media/image1.png").unwrap();
        assert_eq!(resolved.as_str(), "/media/image1.png");

        let resolved = PackURI::from_rel_ref("/word", "styles.xml").unwrap();
        assert_eq!(resolved.as_str(), "/word/styles.xml");
    }
}
