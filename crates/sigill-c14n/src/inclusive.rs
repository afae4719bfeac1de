#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0).
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! The canonical form:
//! - Outputs namespace declarations sorted by prefix (default first)
//! - Outputs attributes sorted by (namespace-URI, local-name)
//! - Escapes text and attribute values per C14N rules
//! - Optionally preserves or strips comments
//! - Supports document-subset canonicalization via NodeSet

use crate::render::{self, Attr, NsDecl};
use roxmltree::{Node, NodeType};
use sigill_core::{ns, Error};
use sigill_xml::document::qualified_name;
use sigill_xml::NodeSet;
use std::collections::BTreeMap;

/// Canonicalize a document using Inclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    let mut output = Vec::new();
    let ctx = C14nContext {
        with_comments,
        node_set,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new());
    Ok(output)
}

struct C14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
}

impl C14nContext<'_> {
    fn is_visible(&self, node: &Node<'_, '_>) -> bool {
        self.node_set.map_or(true, |set| set.contains(node))
    }

    fn process_node(&self, node: Node<'_, '_>, output: &mut Vec<u8>, rendered: &BTreeMap<String, String>) {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, rendered);
                }
            }
            NodeType::Element => self.process_element(node, output, rendered),
            _ => render::leaf(node, output, self.with_comments, self.node_set),
        }
    }

    /// `rendered` holds the namespace bindings in effect at the nearest
    /// ancestor that was output.
    fn process_element(&self, node: Node<'_, '_>, output: &mut Vec<u8>, rendered: &BTreeMap<String, String>) {
        if !self.is_visible(&node) {
            for child in node.children() {
                self.process_node(child, output, rendered);
            }
            return;
        }

        let inscope = render::inscope_namespaces(&node);
        let mut ns_decls: Vec<NsDecl> = inscope
            .iter()
            .filter(|(prefix, uri)| rendered.get(*prefix) != Some(*uri))
            .map(|(prefix, uri)| NsDecl {
                prefix: prefix.clone(),
                uri: uri.clone(),
            })
            .collect();
        if rendered.get("").is_some_and(|d| !d.is_empty()) && !inscope.contains_key("") {
            ns_decls.push(NsDecl {
                prefix: String::new(),
                uri: String::new(),
            });
        }
        ns_decls.sort();

        let mut attrs = render::element_attrs(&node);
        // A subset root picks up xml:* attributes from its omitted ancestors.
        if self.node_set.is_some() {
            let parent_hidden = node
                .parent()
                .map_or(true, |p| !p.is_element() || !self.is_visible(&p));
            if parent_hidden {
                let inherited = inherited_xml_attrs(&node, &attrs);
                attrs.extend(inherited);
            }
        }
        attrs.sort();

        let name = qualified_name(node);
        render::start_tag(output, &name, &ns_decls, &attrs);

        let mut child_rendered = rendered.clone();
        for decl in ns_decls {
            child_rendered.insert(decl.prefix, decl.uri);
        }
        for child in node.children() {
            self.process_node(child, output, &child_rendered);
        }

        render::end_tag(output, &name);
    }
}

/// xml:* attributes of ancestors (nearest wins) not already on the element.
fn inherited_xml_attrs(node: &Node<'_, '_>, existing: &[Attr]) -> Vec<Attr> {
    let mut inherited: BTreeMap<String, String> = BTreeMap::new();
    for ancestor in node.ancestors().skip(1).filter(|n| n.is_element()) {
        for attr in ancestor.attributes() {
            if attr.namespace() == Some(ns::XML) {
                inherited
                    .entry(attr.name().to_owned())
                    .or_insert_with(|| attr.value().to_owned());
            }
        }
    }

    inherited
        .into_iter()
        .filter(|(name, _)| {
            !existing
                .iter()
                .any(|a| a.ns_uri == ns::XML && a.local_name == *name)
        })
        .map(|(name, value)| Attr {
            ns_uri: ns::XML.to_owned(),
            qualified_name: format!("xml:{name}"),
            local_name: name,
            value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str) -> String {
        let doc = sigill_xml::parse(xml).unwrap();
        String::from_utf8(canonicalize(&doc, false, None).unwrap()).unwrap()
    }

    #[test]
    fn test_simple_c14n() {
        assert_eq!(c14n(r#"<root><a b="1" a="2"/></root>"#), r#"<root><a a="2" b="1"></a></root>"#);
    }

    #[test]
    fn test_namespace_rendering() {
        let out = c14n(r#"<root xmlns:b="http://b" xmlns:a="http://a"><a:child/></root>"#);
        assert_eq!(out, r#"<root xmlns:a="http://a" xmlns:b="http://b"><a:child></a:child></root>"#);
    }

    #[test]
    fn redundant_declarations_are_dropped() {
        let out = c14n(r#"<a xmlns="urn:x"><b xmlns="urn:x"/><c xmlns=""/></a>"#);
        assert_eq!(out, r#"<a xmlns="urn:x"><b></b><c xmlns=""></c></a>"#);
    }

    #[test]
    fn test_text_escaping() {
        assert_eq!(c14n("<root>a &amp; b &lt; c &gt; d</root>"), "<root>a &amp; b &lt; c &gt; d</root>");
        assert_eq!(c14n(r#"<r a="&quot;x&quot;"/>"#), r#"<r a="&quot;x&quot;"></r>"#);
    }

    #[test]
    fn comments_and_pis() {
        let xml = "<!--head--><?pi data?><r><!--in--></r><!--tail-->";
        let doc = sigill_xml::parse(xml).unwrap();
        let with = String::from_utf8(canonicalize(&doc, true, None).unwrap()).unwrap();
        assert_eq!(with, "<!--head-->\n<?pi data?>\n<r><!--in--></r>\n<!--tail-->");
        let without = String::from_utf8(canonicalize(&doc, false, None).unwrap()).unwrap();
        assert_eq!(without, "<?pi data?>\n<r></r>");
    }

    #[test]
    fn subset_excludes_subtree() {
        let xml = r#"<root xml:lang="en"><keep>1</keep><drop>2</drop></root>"#;
        let doc = sigill_xml::parse(xml).unwrap();
        let mut set = NodeSet::all(&doc);
        let drop = doc.descendants().find(|n| n.has_tag_name("drop")).unwrap();
        set.subtract_tree(drop);
        let out = String::from_utf8(canonicalize(&doc, false, Some(&set)).unwrap()).unwrap();
        assert_eq!(out, r#"<root xml:lang="en"><keep>1</keep></root>"#);

        let keep = doc.descendants().find(|n| n.has_tag_name("keep")).unwrap();
        let subset = NodeSet::tree(keep, false);
        let out = String::from_utf8(canonicalize(&doc, false, Some(&subset)).unwrap()).unwrap();
        assert_eq!(out, r#"<keep xml:lang="en">1</keep>"#);
    }
}
