//! Element tree and exclusive canonicalization for signed SAML documents.
//!
//! The tree keeps namespace declarations and whitespace exactly as received so
//! that a signed subtree can be re-serialized byte for byte the way the
//! identity provider digested it (Exclusive XML Canonicalization 1.0, without
//! comments).

use std::collections::{BTreeMap, BTreeSet};

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use super::AuthError;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefix to namespace URI. The default namespace uses the empty prefix.
pub(super) type Namespaces = BTreeMap<String, String>;

#[derive(Debug)]
pub(super) enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug)]
pub(super) struct Element {
    /// Qualified name as written.
    name: String,
    /// `xmlns` declarations made on this element.
    namespaces: Vec<(String, String)>,
    /// Attributes other than namespace declarations, values unescaped.
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// Parse a document and return its root element.
    ///
    /// Comments and processing instructions are dropped. Documents with a
    /// DOCTYPE are refused.
    pub(super) fn parse(xml: &str) -> Result<Self, AuthError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().expand_empty_elements = true;

        let mut stack: Vec<Self> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event().map_err(malformed)? {
                Event::Start(start) => {
                    if root.is_some() {
                        return Err(malformed("content after the root element"));
                    }
                    stack.push(Self::open(&start)?);
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| malformed("unbalanced end tag"))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => root = Some(element),
                    }
                }
                Event::Text(text) => {
                    let raw = std::str::from_utf8(&text).map_err(malformed)?;
                    let text = unescape(&normalize_newlines(raw)).map_err(malformed)?.into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text)),
                        None if text.trim().is_empty() => {}
                        None => return Err(malformed("text outside the root element")),
                    }
                }
                Event::CData(data) => {
                    let raw = std::str::from_utf8(&data).map_err(malformed)?;
                    let parent = stack
                        .last_mut()
                        .ok_or_else(|| malformed("CDATA outside the root element"))?;
                    parent.children.push(Node::Text(normalize_newlines(raw)));
                }
                Event::DocType(_) => return Err(malformed("DOCTYPE is not allowed")),
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(malformed("unexpected end of document"));
        }
        root.ok_or_else(|| malformed("empty document"))
    }

    fn open(start: &BytesStart<'_>) -> Result<Self, AuthError> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(malformed)?
            .to_string();
        let mut namespaces = Vec::new();
        let mut attributes = Vec::new();

        for attr in start.attributes() {
            let attr = attr.map_err(malformed)?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(malformed)?;
            let raw = std::str::from_utf8(&attr.value).map_err(malformed)?;
            // Attribute value normalization: literal whitespace becomes a space,
            // character references survive.
            let raw = normalize_newlines(raw).replace(['\t', '\n'], " ");
            let value = unescape(&raw).map_err(malformed)?.into_owned();

            if key == "xmlns" {
                namespaces.push((String::new(), value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                namespaces.push((prefix.to_string(), value));
            } else {
                attributes.push((key.to_string(), value));
            }
        }

        Ok(Self {
            name,
            namespaces,
            attributes,
            children: Vec::new(),
        })
    }

    pub(super) fn local_name(&self) -> &str {
        self.name.rsplit_once(':').map_or(self.name.as_str(), |(_, local)| local)
    }

    fn prefix(&self) -> &str {
        self.name.split_once(':').map_or("", |(prefix, _)| prefix)
    }

    /// Value of an unprefixed attribute.
    pub(super) fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements, in document order.
    pub(super) fn elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Child elements with the given local name.
    pub(super) fn elements_named<'a>(
        &'a self,
        local_name: &str,
    ) -> impl Iterator<Item = &'a Self> {
        self.elements().filter(move |e| e.local_name() == local_name)
    }

    /// First child element with the given local name.
    pub(super) fn child(&self, local_name: &str) -> Option<&Self> {
        self.elements_named(local_name).next()
    }

    /// Concatenated text content of this element (direct children only).
    pub(super) fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// This element and every element below it, breadth first.
    pub(super) fn descendants(&self) -> Vec<&Self> {
        let mut out = vec![self];
        let mut index = 0;
        while let Some(element) = out.get(index).copied() {
            out.extend(element.elements());
            index += 1;
        }
        out
    }
}

/// Namespaces in scope below the last element of `path` (root first).
pub(super) fn in_scope(path: &[&Element]) -> Namespaces {
    let mut scope = Namespaces::new();
    for element in path {
        for (prefix, uri) in &element.namespaces {
            scope.insert(prefix.clone(), uri.clone());
        }
    }
    scope
}

/// Exclusive canonical form of `element`.
///
/// `inherited` holds the namespaces in scope from the element's ancestors,
/// `inclusive` the `InclusiveNamespaces` prefix list (`#default` for the
/// default namespace). `exclude` is omitted from the output, which is how the
/// enveloped-signature transform drops the `Signature` element.
pub(super) fn canonicalize(
    element: &Element,
    inherited: &Namespaces,
    inclusive: &[&str],
    exclude: Option<&Element>,
) -> Result<String, AuthError> {
    let inclusive: Vec<&str> = inclusive
        .iter()
        .map(|prefix| if *prefix == "#default" { "" } else { *prefix })
        .collect();
    let mut out = String::new();
    write_element(
        element,
        inherited,
        &Namespaces::new(),
        &inclusive,
        exclude,
        &mut out,
    )?;
    Ok(out)
}

fn write_element(
    element: &Element,
    inherited: &Namespaces,
    rendered: &Namespaces,
    inclusive: &[&str],
    exclude: Option<&Element>,
    out: &mut String,
) -> Result<(), AuthError> {
    let mut scope = inherited.clone();
    for (prefix, uri) in &element.namespaces {
        scope.insert(prefix.clone(), uri.clone());
    }

    // Visibly utilized prefixes, plus the inclusive list.
    let mut utilized: BTreeSet<&str> = BTreeSet::new();
    utilized.insert(element.prefix());
    for (key, _) in &element.attributes {
        if let Some((prefix, _)) = key.split_once(':')
            && prefix != "xml"
        {
            utilized.insert(prefix);
        }
    }
    for prefix in inclusive {
        if scope.contains_key(*prefix) {
            utilized.insert(*prefix);
        }
    }

    let mut rendered = rendered.clone();
    let mut declarations = Vec::new();
    for prefix in utilized {
        let uri = scope.get(prefix).map_or("", String::as_str);
        let current = rendered.get(prefix).map_or("", String::as_str);
        if prefix.is_empty() {
            if uri == current {
                continue;
            }
        } else if uri.is_empty() {
            return Err(malformed(format!("undeclared namespace prefix {prefix}")));
        } else if rendered.contains_key(prefix) && uri == current {
            continue;
        }
        declarations.push((prefix, uri));
        rendered.insert(prefix.to_string(), uri.to_string());
    }

    let mut attributes = Vec::with_capacity(element.attributes.len());
    for (key, value) in &element.attributes {
        let (uri, local) = match key.split_once(':') {
            Some(("xml", local)) => (XML_NS, local),
            Some((prefix, local)) => (
                scope
                    .get(prefix)
                    .map(String::as_str)
                    .ok_or_else(|| malformed(format!("undeclared namespace prefix {prefix}")))?,
                local,
            ),
            None => ("", key.as_str()),
        };
        attributes.push((uri, local, key.as_str(), value.as_str()));
    }
    attributes.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    out.push('<');
    out.push_str(&element.name);
    for (prefix, uri) in declarations {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attribute(uri, out);
        out.push('"');
    }
    for (_, _, key, value) in attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_attribute(value, out);
        out.push('"');
    }
    out.push('>');

    for node in &element.children {
        match node {
            Node::Text(text) => escape_text(text, out),
            Node::Element(child) if exclude.is_some_and(|skip| std::ptr::eq(skip, child)) => {}
            Node::Element(child) => {
                write_element(child, &scope, &rendered, inclusive, exclude, out)?;
            }
        }
    }

    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
    Ok(())
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn normalize_newlines(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

pub(super) fn malformed(err: impl std::fmt::Display) -> AuthError {
    AuthError::MalformedResponse(err.to_string())
}
