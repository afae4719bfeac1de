#![forbid(unsafe_code)]

//! Rendering pieces shared by the inclusive and exclusive canonicalizers.

use roxmltree::{Node, NodeType};
use sigill_core::ns;
use sigill_xml::writer::{escape_attr, escape_text};
use sigill_xml::NodeSet;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for default namespace).
    pub prefix: String,
    /// The namespace URI ("" undeclares the default namespace).
    pub uri: String,
}

impl NsDecl {
    pub fn render(&self, out: &mut Vec<u8>) {
        let uri = escape_attr(&self.uri);
        let decl = if self.prefix.is_empty() {
            format!(" xmlns=\"{uri}\"")
        } else {
            format!(" xmlns:{}=\"{uri}\"", self.prefix)
        };
        out.extend_from_slice(decl.as_bytes());
    }
}

impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> Ordering {
        // Default namespace first, then lexicographic by prefix.
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// Namespace URI ("" for none).
    pub ns_uri: String,
    pub local_name: String,
    /// `prefix:local` or just `local`.
    pub qualified_name: String,
    pub value: String,
}

impl Attr {
    pub fn render(&self, out: &mut Vec<u8>) {
        let attr = format!(" {}=\"{}\"", self.qualified_name, escape_attr(&self.value));
        out.extend_from_slice(attr.as_bytes());
    }

    /// Prefix of the qualified name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.qualified_name.split_once(':').map(|(p, _)| p)
    }
}

impl Ord for Attr {
    fn cmp(&self, other: &Self) -> Ordering {
        // Unqualified attributes first by local name, then (namespace URI, local name).
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then_with(|| self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The attribute axis of an element.
pub fn element_attrs(node: &Node<'_, '_>) -> Vec<Attr> {
    node.attributes()
        .map(|a| {
            let ns_uri = a.namespace().unwrap_or("");
            let qualified_name = match attr_prefix(node, ns_uri) {
                Some(prefix) => format!("{prefix}:{}", a.name()),
                None => a.name().to_owned(),
            };
            Attr {
                ns_uri: ns_uri.to_owned(),
                local_name: a.name().to_owned(),
                qualified_name,
                value: a.value().to_owned(),
            }
        })
        .collect()
}

fn attr_prefix(node: &Node<'_, '_>, ns_uri: &str) -> Option<String> {
    if ns_uri.is_empty() {
        return None;
    }
    if ns_uri == ns::XML {
        return Some("xml".to_owned());
    }
    node.namespaces()
        .find(|n| n.uri() == ns_uri && n.name().is_some())
        .and_then(|n| n.name())
        .map(str::to_owned)
}

/// The element's prefix ("" when unprefixed).
pub fn element_prefix(qualified_name: &str) -> &str {
    qualified_name.split_once(':').map_or("", |(p, _)| p)
}

/// In-scope namespace bindings of an element, without the `xml` prefix.
pub fn inscope_namespaces(node: &Node<'_, '_>) -> BTreeMap<String, String> {
    let mut levels = Vec::new();
    let mut current = Some(*node);
    while let Some(n) = current {
        if n.is_element() {
            let level: Vec<(String, String)> = n
                .namespaces()
                .map(|ns| (ns.name().unwrap_or("").to_owned(), ns.uri().to_owned()))
                .collect();
            levels.push(level);
        }
        current = n.parent();
    }

    let mut result = BTreeMap::new();
    for level in levels.into_iter().rev() {
        for (prefix, uri) in level {
            if prefix == "xml" {
                continue;
            }
            if uri.is_empty() {
                result.remove(&prefix);
            } else {
                result.insert(prefix, uri);
            }
        }
    }
    result
}

/// Write the start tag `<name ns-decls attrs>`.
pub fn start_tag(out: &mut Vec<u8>, name: &str, ns_decls: &[NsDecl], attrs: &[Attr]) {
    out.push(b'<');
    out.extend_from_slice(name.as_bytes());
    for decl in ns_decls {
        decl.render(out);
    }
    for attr in attrs {
        attr.render(out);
    }
    out.push(b'>');
}

pub fn end_tag(out: &mut Vec<u8>, name: &str) {
    out.extend_from_slice(b"</");
    out.extend_from_slice(name.as_bytes());
    out.push(b'>');
}

/// Render a text, comment or processing-instruction node.
pub fn leaf(node: Node<'_, '_>, out: &mut Vec<u8>, with_comments: bool, node_set: Option<&NodeSet>) {
    if node_set.is_some_and(|set| !set.contains(&node)) {
        return;
    }
    match node.node_type() {
        NodeType::Text => {
            out.extend_from_slice(escape_text(node.text().unwrap_or("")).as_bytes());
        }
        NodeType::Comment if with_comments => {
            top_level(node, out, |out| {
                out.extend_from_slice(b"<!--");
                out.extend_from_slice(node.text().unwrap_or("").as_bytes());
                out.extend_from_slice(b"-->");
            });
        }
        NodeType::PI => {
            let Some(pi) = node.pi() else { return };
            top_level(node, out, |out| {
                out.extend_from_slice(b"<?");
                out.extend_from_slice(pi.target.as_bytes());
                if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
                    out.push(b' ');
                    out.extend_from_slice(value.replace('\r', "&#xD;").as_bytes());
                }
                out.extend_from_slice(b"?>");
            });
        }
        _ => {}
    }
}

/// Comments and PIs outside the document element are separated from it by
/// a line feed.
fn top_level(node: Node<'_, '_>, out: &mut Vec<u8>, body: impl FnOnce(&mut Vec<u8>)) {
    let at_root = node
        .parent()
        .is_some_and(|p| p.node_type() == NodeType::Root);
    if at_root && node.prev_siblings().any(|s| s.is_element()) {
        out.push(b'\n');
    }
    body(out);
    if at_root && node.next_siblings().any(|s| s.is_element()) {
        out.push(b'\n');
    }
}
