//! Minimal XML document tree for electronic documents.
//!
//! Electronic invoices arrive as XML; schema fields of kind `xpath` look
//! elements up by a slash-separated path from the root. Only element names
//! and text content are kept; attributes and namespaces are ignored.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, XmlError};

/// A parsed XML element.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Finds the first descendant at the given slash-separated path, e.g.
    /// `"client/country"`. An empty path returns the element itself.
    pub fn find(&self, path: &str) -> Option<&XmlElement> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.children.iter().find(|c| c.name == segment)?;
        }
        Some(current)
    }
}

/// A parsed XML document.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub root: XmlElement,
}

impl XmlDocument {
    /// Parses an XML string into a tree.
    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    stack.push(XmlElement {
                        name,
                        ..Default::default()
                    });
                }
                Ok(Event::Empty(start)) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    let element = XmlElement {
                        name,
                        ..Default::default()
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
                Ok(Event::Text(text)) => {
                    if let Some(current) = stack.last_mut() {
                        let decoded = text
                            .unescape()
                            .map_err(|e| XmlError::Malformed(e.to_string()))?;
                        if !current.text.is_empty() {
                            current.text.push(' ');
                        }
                        current.text.push_str(decoded.trim());
                    }
                }
                Ok(Event::End(_)) => {
                    let finished = stack.pop().ok_or_else(|| {
                        XmlError::Malformed("unexpected closing tag".to_string())
                    })?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(finished),
                        None => root = Some(finished),
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(XmlError::Malformed(e.to_string()).into()),
            }
        }

        let root = root.ok_or(XmlError::NoRoot)?;
        Ok(XmlDocument { root })
    }

    /// Finds an element by slash-separated path below the root.
    pub fn find(&self, path: &str) -> Option<&XmlElement> {
        self.root.find(path)
    }

    /// Flattens the tree into `name: text` lines so regex fields can also
    /// run over XML-sourced documents.
    pub fn to_text(&self) -> String {
        fn walk(element: &XmlElement, out: &mut String) {
            if !element.text.is_empty() {
                out.push_str(&element.name);
                out.push_str(": ");
                out.push_str(&element.text);
                out.push('\n');
            }
            for child in &element.children {
                walk(child, out);
            }
        }
        let mut out = String::new();
        walk(&self.root, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_and_find() {
        let doc = XmlDocument::parse(
            r#"<invoice>
                <client>
                    <name>ENAP SIPETROL</name>
                    <country>Ecuador</country>
                </client>
                <total>230.00</total>
            </invoice>"#,
        )
        .unwrap();

        assert_eq!(doc.root.name, "invoice");
        assert_eq!(doc.find("client/country").unwrap().text, "Ecuador");
        assert_eq!(doc.find("total").unwrap().text, "230.00");
        assert!(doc.find("client/ruc").is_none());
    }

    #[test]
    fn test_to_text_flattens_leaves() {
        let doc = XmlDocument::parse(
            "<invoice><client><name>ENAP</name><country>Ecuador</country></client></invoice>",
        )
        .unwrap();
        assert_eq!(doc.to_text(), "name: ENAP\ncountry: Ecuador\n");
    }

    #[test]
    fn test_empty_elements() {
        let doc = XmlDocument::parse("<a><b/><c>x</c></a>").unwrap();
        assert_eq!(doc.find("b").unwrap().text, "");
        assert_eq!(doc.find("c").unwrap().text, "x");
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("").is_err());
    }
}
