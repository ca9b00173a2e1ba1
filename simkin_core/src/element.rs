// simkin_core/src/element.rs

//! A minimal SDF-like element tree: the already-parsed form of a scene
//! description, and the carrier for serialized state records.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElementError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("document has no root element")]
    Empty,
}

/// One named node of the tree: attributes, text content and ordered children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The first child with the given name, in document order.
    pub fn first_child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.first_child(name).map(|c| c.text.trim())
    }

    /// Parses an XML document and returns its root element.
    pub fn from_xml_str(xml: &str) -> Result<Element, ElementError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => stack.push(Self::open(&e)?),
                Event::Empty(e) => {
                    let element = Self::open(&e)?;
                    Self::close(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        let text = t
                            .unescape()
                            .map_err(|e| ElementError::Malformed(e.to_string()))?;
                        top.text.push_str(&text);
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| ElementError::Malformed("unbalanced end tag".into()))?;
                    Self::close(&mut stack, &mut root, element)?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(ElementError::Malformed("unclosed element".into()));
        }
        root.ok_or(ElementError::Empty)
    }

    fn open(e: &BytesStart) -> Result<Element, ElementError> {
        let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()).to_string());
        for attr in e.attributes() {
            let attr = attr.map_err(|e| ElementError::Malformed(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| ElementError::Malformed(e.to_string()))?
                .to_string();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn close(
        stack: &mut [Element],
        root: &mut Option<Element>,
        element: Element,
    ) -> Result<(), ElementError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if root.is_none() => *root = Some(element),
            None => return Err(ElementError::Malformed("more than one root element".into())),
        }
        Ok(())
    }
}

impl fmt::Display for Element {
    /// Compact XML with single-quoted attributes, e.g. `<link name='a'>...</link>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (k, v) in &self.attributes {
            write!(f, " {}='{}'", k, quick_xml::escape::escape(v.as_str()))?;
        }
        if self.text.is_empty() && self.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">{}", quick_xml::escape::escape(self.text.as_str()))?;
        for child in &self.children {
            write!(f, "{child}")?;
        }
        write!(f, "</{}>", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_in_document_order() {
        let xml = "<model name='car'><link name='a'><pose>1 2 3 0 0 0</pose></link>\
                   <link name=\"b\"/><static>true</static></model>";
        let root = Element::from_xml_str(xml).unwrap();
        assert_eq!(root.name, "model");
        assert_eq!(root.attribute("name"), Some("car"));

        let links: Vec<_> = root.children_named("link").collect();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].attribute("name"), Some("a"));
        assert_eq!(links[0].child_text("pose"), Some("1 2 3 0 0 0"));
        assert_eq!(links[1].attribute("name"), Some("b"));
        assert_eq!(root.child_text("static"), Some("true"));
    }

    #[test]
    fn display_reads_back_to_the_same_tree() {
        let tree = Element::new("link")
            .with_attribute("name", "wheel <fl>")
            .with_child(Element::new("pose").with_text("0 0 0 0 0 0"))
            .with_child(Element::new("collision").with_attribute("name", "c"));
        let text = tree.to_string();
        assert!(text.starts_with("<link name='wheel &lt;fl&gt;'>"));
        assert_eq!(Element::from_xml_str(&text).unwrap(), tree);
    }

    #[test]
    fn rejects_unbalanced_and_empty_documents() {
        assert!(Element::from_xml_str("").is_err());
        assert!(Element::from_xml_str("<a><b></a>").is_err());
        assert!(Element::from_xml_str("<a/><b/>").is_err());
    }

    #[test]
    fn set_attribute_overwrites() {
        let mut e = Element::new("joint").with_attribute("type", "revolute");
        e.set_attribute("type", "prismatic");
        assert_eq!(e.attribute("type"), Some("prismatic"));
        assert_eq!(e.attributes.len(), 1);
    }
}
