#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Only "visibly utilized" namespace declarations are output. A prefix is
//! visibly utilized by an element when its tag name or one of its attributes
//! uses it, or when it appears in the InclusiveNamespaces PrefixList
//! (`#default` standing for the default namespace).

use crate::render::{self, NsDecl};
use roxmltree::{Node, NodeType};
use sigill_core::Error;
use sigill_xml::document::qualified_name;
use sigill_xml::NodeSet;
use std::collections::{BTreeMap, BTreeSet};

/// Canonicalize using Exclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let prefixes = inclusive_prefixes
        .iter()
        .map(|p| if p == "#default" { String::new() } else { p.clone() })
        .collect();
    let ctx = ExcC14nContext {
        with_comments,
        node_set,
        inclusive_prefixes: prefixes,
    };
    let mut output = Vec::new();
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new());
    Ok(output)
}

struct ExcC14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    inclusive_prefixes: BTreeSet<String>,
}

impl ExcC14nContext<'_> {
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

    fn process_element(&self, node: Node<'_, '_>, output: &mut Vec<u8>, rendered: &BTreeMap<String, String>) {
        if !self.is_visible(&node) {
            for child in node.children() {
                self.process_node(child, output, rendered);
            }
            return;
        }

        let name = qualified_name(node);
        let mut attrs = render::element_attrs(&node);
        attrs.sort();

        let mut utilized: BTreeSet<String> = self.inclusive_prefixes.clone();
        utilized.insert(render::element_prefix(&name).to_owned());
        for attr in &attrs {
            if let Some(prefix) = attr.prefix() {
                utilized.insert(prefix.to_owned());
            }
        }

        let inscope = render::inscope_namespaces(&node);
        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for prefix in utilized.iter().filter(|p| p.as_str() != "xml") {
            match inscope.get(prefix) {
                Some(uri) if rendered.get(prefix) != Some(uri) => ns_decls.push(NsDecl {
                    prefix: prefix.clone(),
                    uri: uri.clone(),
                }),
                None if prefix.is_empty() && rendered.get("").is_some_and(|d| !d.is_empty()) => {
                    ns_decls.push(NsDecl {
                        prefix: String::new(),
                        uri: String::new(),
                    })
                }
                _ => {}
            }
        }
        ns_decls.sort();

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
