//! Minimal XML element tree, writer, and canonical form.
//!
//! SAML messages have no mixed content, so an element keeps its text as one
//! string next to its child elements. Text of a leaf element is kept
//! verbatim; whitespace-only text around child elements is layout and is
//! dropped. Namespace prefixes are resolved while parsing; lookups use the
//! namespace URI and local name only.

use std::borrow::Cow;

use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};

const MAX_DEPTH: usize = 64;

// ============================================================================
// Element Tree
// ============================================================================

/// A parsed XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Namespace URI, if the element is namespaced.
    pub namespace: Option<String>,
    /// Local name.
    pub name: String,
    /// Attributes by local name, without namespace declarations.
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
    /// Concatenated text content.
    pub text: String,
}

impl XmlElement {
    /// Parses a document and returns its root element.
    ///
    /// Document type declarations are refused.
    ///
    /// # Errors
    ///
    /// Returns `XmlParse` for malformed XML.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        let mut reader = Reader::from_str(xml);

        let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
        let mut stack: Vec<Self> = Vec::new();
        let mut root: Option<Self> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(SamlError::XmlParse("document nested too deeply".into()));
                    }
                    let element = open_element(&e, &mut scopes)?;
                    stack.push(element);
                }
                Event::Empty(e) => {
                    let element = open_element(&e, &mut scopes)?;
                    scopes.pop();
                    attach(element, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    scopes.pop();
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| SamlError::XmlParse("unbalanced end tag".into()))?;
                    if !element.children.is_empty() && element.text.trim().is_empty() {
                        element.text.clear();
                    }
                    attach(element, &mut stack, &mut root)?;
                }
                Event::Text(t) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(c) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::DocType(_) => {
                    return Err(SamlError::XmlParse("DOCTYPE is not allowed".into()));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(SamlError::XmlParse("unexpected end of document".into()));
        }
        root.ok_or_else(|| SamlError::XmlParse("document has no root element".into()))
    }

    /// Returns true if this element has the given namespace and local name.
    #[must_use]
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Returns an attribute value by local name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns a required attribute value.
    ///
    /// # Errors
    ///
    /// Returns `XmlParse` if the attribute is absent.
    pub fn required_attribute(&self, name: &str) -> SamlResult<&str> {
        self.attribute(name).ok_or_else(|| {
            SamlError::XmlParse(format!("{} is missing attribute {name}", self.name))
        })
    }

    /// Returns the first child with the given local name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns all children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Returns the text of the first child with the given local name.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }
}

fn open_element(
    e: &quick_xml::events::BytesStart<'_>,
    scopes: &mut Vec<Vec<(String, String)>>,
) -> SamlResult<XmlElement> {
    let mut declarations = Vec::new();
    let mut attributes = Vec::new();

    for attr in e.attributes() {
        let attr = attr?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr.unescape_value()?.into_owned();
        if key == "xmlns" {
            declarations.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push((prefix.to_string(), value));
        } else {
            let local = key.rsplit(':').next().unwrap_or(key);
            attributes.push((local.to_string(), value));
        }
    }
    scopes.push(declarations);

    let qname = utf8(e.name().as_ref())?.to_string();
    let (prefix, local) = match qname.split_once(':') {
        Some((p, l)) => (p, l),
        None => ("", qname.as_str()),
    };
    let namespace = scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter())
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty());

    if !prefix.is_empty() && namespace.is_none() {
        return Err(SamlError::XmlParse(format!("unbound namespace prefix: {prefix}")));
    }

    Ok(XmlElement {
        namespace,
        name: local.to_string(),
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> SamlResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(SamlError::XmlParse("document has more than one root".into()))
    }
}

fn utf8(bytes: &[u8]) -> SamlResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| SamlError::XmlParse(e.to_string()))
}

// ============================================================================
// Writer
// ============================================================================

/// Writer producing compact, deterministic XML.
///
/// No whitespace is emitted between elements and attributes are written in
/// the order given.
#[derive(Debug, Default)]
pub struct XmlWriter {
    out: String,
    open: Vec<String>,
}

impl XmlWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write_tag(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attributes {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            self.out.push_str(&escape(value));
            self.out.push('"');
        }
    }

    /// Opens an element.
    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> &mut Self {
        self.write_tag(name, attributes);
        self.out.push('>');
        self.open.push(name.to_string());
        self
    }

    /// Writes an element with no content.
    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> &mut Self {
        self.write_tag(name, attributes);
        self.out.push_str("/>");
        self
    }

    /// Writes an element holding only text.
    pub fn text_element(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) -> &mut Self {
        self.write_tag(name, attributes);
        self.out.push('>');
        self.out.push_str(&escape(text));
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
        self
    }

    /// Closes the innermost open element.
    pub fn end(&mut self) -> &mut Self {
        if let Some(name) = self.open.pop() {
            self.out.push_str("</");
            self.out.push_str(&name);
            self.out.push('>');
        }
        self
    }

    /// Returns the document, closing any element left open.
    #[must_use]
    pub fn finish(mut self) -> String {
        while !self.open.is_empty() {
            self.end();
        }
        self.out
    }
}

fn escape(value: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(value)
}

// ============================================================================
// Canonical Form
// ============================================================================

/// Returns the canonical form of XML produced by [`XmlWriter`].
///
/// The XML declaration and whitespace-only text between sibling tags are
/// removed. The content of a leaf element is kept even when it is only
/// whitespace, so `<a> </a>` and `<a></a>` stay distinct.
#[must_use]
pub fn canonicalize(xml: &str) -> String {
    let mut body = xml.trim_start();
    if body.starts_with("<?xml") {
        if let Some(end) = body.find("?>") {
            body = &body[end + 2..];
        }
    }

    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    let mut inside_open_tag = false;
    while let Some(open) = rest.find('<') {
        let (text, tail) = rest.split_at(open);
        let leaf_content = inside_open_tag && tail.starts_with("</");
        if leaf_content || !text.trim().is_empty() {
            out.push_str(text);
        }
        let Some(close) = tail.find('>') else {
            out.push_str(tail);
            return out;
        };
        let tag = &tail[..=close];
        out.push_str(tag);
        inside_open_tag = !(tag.starts_with("</")
            || tag.starts_with("<?")
            || tag.starts_with("<!")
            || tag.ends_with("/>"));
        rest = &tail[close + 1..];
    }
    if !rest.trim().is_empty() {
        out.push_str(rest);
    }
    out
}

// ============================================================================
// Value Helpers
// ============================================================================

/// Formats a timestamp with as many fractional digits as needed.
#[must_use]
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses an `xs:dateTime` value.
///
/// # Errors
///
/// Returns `XmlParse` if the value is not RFC 3339.
pub fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SamlError::XmlParse(format!("invalid timestamp {value:?}: {e}")))
}

/// Encodes bytes as standard base64.
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decodes base64 text, ignoring embedded whitespace.
///
/// # Errors
///
/// Returns `XmlParse` for invalid base64.
pub fn decode_base64(text: &str) -> SamlResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaces_and_attributes() {
        let xml = r#"<?xml version="1.0"?>
            <md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="https://idp">
                <md:IDPSSODescriptor protocolSupportEnumeration="urn:p">
                    <ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
                        <ds:KeyName> signing &amp; more </ds:KeyName>
                    </ds:KeyInfo>
                </md:IDPSSODescriptor>
            </md:EntityDescriptor>"#;
        let root = XmlElement::parse(xml).unwrap();
        assert!(root.is("urn:oasis:names:tc:SAML:2.0:metadata", "EntityDescriptor"));
        assert_eq!(root.attribute("entityID"), Some("https://idp"));

        let key_info = root.child("IDPSSODescriptor").unwrap().child("KeyInfo").unwrap();
        assert_eq!(key_info.namespace.as_deref(), Some("http://www.w3.org/2000/09/xmldsig#"));
        assert_eq!(key_info.child_text("KeyName"), Some(" signing & more "));
        assert!(key_info.text.is_empty());
    }

    #[test]
    fn leaf_text_is_kept_verbatim() {
        let root = XmlElement::parse("<a>\n  <b> </b>\n  <c></c>\n  <d>x\n y </d>\n</a>").unwrap();
        assert!(root.text.is_empty());
        assert_eq!(root.child_text("b"), Some(" "));
        assert_eq!(root.child_text("c"), Some(""));
        assert_eq!(root.child_text("d"), Some("x\n y "));
    }

    #[test]
    fn default_namespace_applies() {
        let root = XmlElement::parse(r#"<a xmlns="urn:x"><b/></a>"#).unwrap();
        assert_eq!(root.children[0].namespace.as_deref(), Some("urn:x"));
    }

    #[test]
    fn rejects_doctype_and_unbound_prefix() {
        assert!(XmlElement::parse("<!DOCTYPE a [<!ENTITY x \"y\">]><a/>").is_err());
        assert!(XmlElement::parse("<p:a/>").is_err());
        assert!(XmlElement::parse("<a><b></a>").is_err());
    }

    #[test]
    fn writer_escapes_and_closes() {
        let mut w = XmlWriter::new();
        w.start("a", &[("k", "x\"y")])
            .text_element("b", &[], "1 < 2")
            .empty("c", &[]);
        let xml = w.finish();
        assert_eq!(xml, r#"<a k="x&quot;y"><b>1 &lt; 2</b><c/></a>"#);

        let parsed = XmlElement::parse(&xml).unwrap();
        assert_eq!(parsed.attribute("k"), Some("x\"y"));
        assert_eq!(parsed.child_text("b"), Some("1 < 2"));
    }

    #[test]
    fn canonical_form_strips_declaration_and_layout() {
        let xml = "<?xml version=\"1.0\"?>\n<a>\n  <b> text </b>\n</a>\n";
        assert_eq!(canonicalize(xml), "<a><b> text </b></a>");
    }

    #[test]
    fn canonical_form_keeps_whitespace_only_leaves() {
        assert_eq!(canonicalize("<a><b> </b><c/> <d></d></a>"), "<a><b> </b><c/><d></d></a>");
        assert_ne!(canonicalize("<a><b> </b></a>"), canonicalize("<a><b></b></a>"));
        assert_eq!(canonicalize("<a>\n  <b>\t</b>\n</a>"), "<a><b>\t</b></a>");
    }

    #[test]
    fn instants_keep_their_precision() {
        let instant = parse_instant("2024-05-01T10:00:00.123456Z").unwrap();
        assert_eq!(format_instant(&instant), "2024-05-01T10:00:00.123456Z");
        assert!(parse_instant("yesterday").is_err());
    }
}
