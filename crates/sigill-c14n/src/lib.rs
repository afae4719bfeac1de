#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for sigill.
//!
//! Canonical XML 1.0 and Exclusive Canonical XML 1.0, each with and without
//! comments, over whole documents, subtrees or arbitrary node subsets.

pub mod exclusive;
pub mod inclusive;
pub mod render;

use sigill_core::{algorithm, Error};
use sigill_xml::NodeSet;

/// A `CanonicalizationMethod`, identified on the wire by [`uri`](Self::uri).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum C14nMode {
    #[default]
    Inclusive,
    InclusiveWithComments,
    Exclusive,
    ExclusiveWithComments,
}

impl C14nMode {
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// `None` for anything outside the C14N 1.0 family.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::InclusiveWithComments | Self::ExclusiveWithComments)
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

/// Canonicalize XML text.
///
/// - `node_set`: optional document subset; `None` means the whole document
/// - `inclusive_prefixes`: for exclusive C14N, the InclusiveNamespaces PrefixList
pub fn canonicalize(
    xml: &str,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let doc = sigill_xml::parse(xml)?;
    canonicalize_doc(&doc, mode, node_set, inclusive_prefixes)
}

/// Canonicalize a pre-parsed document.
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    if mode.is_exclusive() {
        exclusive::canonicalize(doc, mode.with_comments(), node_set, inclusive_prefixes)
    } else {
        inclusive::canonicalize(doc, mode.with_comments(), node_set)
    }
}

/// Canonicalize the subtree rooted at `node` (a document subset, so
/// namespaces inherited from ancestors are rendered on `node`).
pub fn canonicalize_subtree(
    node: roxmltree::Node<'_, '_>,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let set = NodeSet::tree(node, mode.with_comments());
    canonicalize_doc(node.document(), mode, Some(&set), inclusive_prefixes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_uris_round_trip() {
        for mode in [
            C14nMode::Inclusive,
            C14nMode::InclusiveWithComments,
            C14nMode::Exclusive,
            C14nMode::ExclusiveWithComments,
        ] {
            assert_eq!(C14nMode::from_uri(mode.uri()), Some(mode));
        }
        assert_eq!(C14nMode::from_uri("http://www.w3.org/2006/12/xml-c14n11"), None);
    }

    #[test]
    fn subtree_inherits_namespaces() {
        let xml = r#"<s:Env xmlns:s="urn:s" xmlns:w="urn:w"><s:Body><w:hello/></s:Body></s:Env>"#;
        let doc = sigill_xml::parse(xml).unwrap();
        let hello = doc.descendants().find(|n| n.has_tag_name(("urn:w", "hello"))).unwrap();

        let inclusive = canonicalize_subtree(hello, C14nMode::Inclusive, &[]).unwrap();
        assert_eq!(
            String::from_utf8(inclusive).unwrap(),
            r#"<w:hello xmlns:s="urn:s" xmlns:w="urn:w"></w:hello>"#
        );

        let exclusive = canonicalize_subtree(hello, C14nMode::Exclusive, &[]).unwrap();
        assert_eq!(
            String::from_utf8(exclusive).unwrap(),
            r#"<w:hello xmlns:w="urn:w"></w:hello>"#
        );
    }

    #[test]
    fn xml_declaration_and_empty_tags_are_normalized() {
        let out = canonicalize(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root><node>hello world!</node><e/></root>",
            C14nMode::Inclusive,
            None,
            &[],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<root><node>hello world!</node><e></e></root>"
        );
    }
}
