//! Parsed payload node tree.
//!
//! Built with `quick-xml`'s namespace-aware reader. Routing only needs the first
//! element child of a body; codecs render subtrees back to text with
//! [`XmlElement::to_local_xml`].

use quick_xml::escape::escape;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::descriptor::QualifiedName;

/// Errors from building a node tree.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Syntax(#[from] quick_xml::Error),
    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),
    #[error("document has no root element")]
    NoRootElement,
    #[error("content after the root element")]
    TrailingContent,
    #[error("text outside the root element")]
    StrayText,
    #[error("unclosed element <{0}>")]
    Unclosed(String),
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name plus the namespace it resolved to.
    pub name: QualifiedName,
    pub prefix: Option<String>,
    /// Raw attributes, namespace declarations included.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// An element without namespace, attributes or children.
    #[must_use]
    pub fn new(local_name: impl Into<String>) -> Self {
        Self {
            name: QualifiedName::local(local_name),
            prefix: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parses a document and returns its root element.
    ///
    /// # Errors
    ///
    /// Fails on malformed XML, a missing root, or content after the root.
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = NsReader::from_str(xml);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let (resolved, event) = reader.read_resolved_event()?;
            let namespace = match resolved {
                ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
                _ => None,
            };
            match event {
                Event::Start(start) => stack.push(Self::from_start(&start, namespace)?),
                Event::Empty(start) => {
                    let element = Self::from_start(&start, namespace)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // Balanced end tags are enforced by the reader.
                    if let Some(mut element) = stack.pop() {
                        element.drop_indentation();
                        attach(&mut stack, &mut root, element)?;
                    }
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Text(text.into_owned())),
                        None if is_blank(&text) => {}
                        None => return Err(XmlError::StrayText),
                    }
                }
                Event::CData(data) => {
                    let Some(parent) = stack.last_mut() else {
                        return Err(XmlError::StrayText);
                    };
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    parent.children.push(XmlNode::Text(text));
                }
                Event::Comment(comment) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&comment.into_inner()).into_owned();
                        parent.children.push(XmlNode::Comment(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.name.local_name));
        }
        root.ok_or(XmlError::NoRootElement)
    }

    /// Removes whitespace-only text between element children. Text of
    /// elements without element children is kept verbatim.
    fn drop_indentation(&mut self) {
        if self.first_element_child().is_some() {
            self.children
                .retain(|node| !matches!(node, XmlNode::Text(text) if is_blank(text)));
        }
    }

    fn from_start(start: &BytesStart<'_>, namespace: Option<String>) -> Result<Self, XmlError> {
        let local_name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let prefix = start
            .name()
            .prefix()
            .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name: QualifiedName {
                namespace,
                local_name,
            },
            prefix,
            attributes,
            children: Vec::new(),
        })
    }

    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }

    /// Element children in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// The first child that is an element, skipping text and comments.
    #[must_use]
    pub fn first_element_child(&self) -> Option<&XmlElement> {
        self.elements().next()
    }

    /// First element child with the given local name.
    #[must_use]
    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.local_name() == local_name)
    }

    /// Concatenated direct text content.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Renders the subtree with local names only.
    ///
    /// Prefixes, namespace declarations and comments are dropped, so the result
    /// stands alone outside the envelope it was cut from.
    #[must_use]
    pub fn to_local_xml(&self) -> String {
        let mut out = String::new();
        self.write_local(&mut out);
        out
    }

    fn write_local(&self, out: &mut String) {
        let name = self.local_name();
        out.push('<');
        out.push_str(name);
        for (key, value) in &self.attributes {
            if key == "xmlns" || key.starts_with("xmlns:") || key.contains(':') {
                continue;
            }
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.write_local(out),
                XmlNode::Text(text) => out.push_str(&escape(text.as_str())),
                XmlNode::Comment(_) => {}
            }
        }
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
}

fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(XmlError::TrailingContent),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = r#"<?xml version="1.0"?>
        <soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
          <soap:Body>
            <!-- leading comment -->
            <c:add xmlns:c="urn:calc"><x>2</x><y>3</y></c:add>
          </soap:Body>
        </soap:Envelope>"#;

    #[test]
    fn parses_namespaced_tree() {
        let root = XmlElement::parse(ENVELOPE).unwrap();
        assert_eq!(root.local_name(), "Envelope");
        assert_eq!(
            root.name.namespace.as_deref(),
            Some("http://schemas.xmlsoap.org/soap/envelope/")
        );
        assert_eq!(root.prefix.as_deref(), Some("soap"));

        let body = root.child("Body").unwrap();
        let payload = body.first_element_child().unwrap();
        assert_eq!(payload.local_name(), "add");
        assert_eq!(payload.name.namespace.as_deref(), Some("urn:calc"));
        assert_eq!(payload.child("y").unwrap().text(), "3");
    }

    #[test]
    fn first_element_child_skips_text_and_comments() {
        let body = XmlElement::parse("<Body>text<!--c--><first/><second/></Body>").unwrap();
        assert_eq!(body.first_element_child().unwrap().local_name(), "first");
    }

    #[test]
    fn local_rendering_strips_prefixes() {
        let root = XmlElement::parse(ENVELOPE).unwrap();
        let payload = root.child("Body").unwrap().first_element_child().unwrap();
        assert_eq!(payload.to_local_xml(), "<add><x>2</x><y>3</y></add>");
    }

    #[test]
    fn local_rendering_escapes_text() {
        let element = XmlElement::new("note").with_text("a < b & c");
        assert_eq!(element.to_local_xml(), "<note>a &lt; b &amp; c</note>");
    }

    #[test]
    fn rejects_missing_root() {
        assert!(matches!(
            XmlElement::parse("<?xml version=\"1.0\"?>"),
            Err(XmlError::NoRootElement)
        ));
    }

    #[test]
    fn rejects_second_root() {
        assert!(matches!(
            XmlElement::parse("<a/><b/>"),
            Err(XmlError::TrailingContent)
        ));
    }

    #[test]
    fn text_content_is_kept_verbatim() {
        let body =
            XmlElement::parse("<Body>\n  <e>\n    <note>  hi  </note>\n    <pad> </pad>\n  </e>\n</Body>")
                .unwrap();
        let payload = body.first_element_child().unwrap();
        assert_eq!(payload.to_local_xml(), "<e><note>  hi  </note><pad> </pad></e>");
        assert_eq!(payload.child("note").unwrap().text(), "  hi  ");
    }

    #[test]
    fn rejects_text_outside_root() {
        assert!(matches!(XmlElement::parse("garbage<a/>"), Err(XmlError::StrayText)));
        assert!(matches!(XmlElement::parse("<a/>tail"), Err(XmlError::StrayText)));
        assert!(XmlElement::parse("\n  <a/>\n").is_ok());
    }

    #[test]
    fn rejects_mismatched_end() {
        assert!(XmlElement::parse("<a><b></a>").is_err());
    }
}
