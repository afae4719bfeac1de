#![forbid(unsafe_code)]

//! Reference URI dereferencing.

use crate::pipeline::TransformData;
use sigill_core::Error;
use sigill_xml::{NodeSet, SameDocumentRef, XmlDocument};

/// Dereference a same-document `URI` into the transform input.
///
/// `""` selects the whole document and `#id` the subtree of the element
/// carrying that identifier. Comments are excluded in both cases.
pub fn dereference(doc: &XmlDocument, uri: &str) -> Result<TransformData, Error> {
    let parsed = doc.parse_doc()?;
    let node_set = match SameDocumentRef::parse(uri)? {
        SameDocumentRef::Document => NodeSet::all_without_comments(&parsed),
        SameDocumentRef::Id(id) => {
            let element = sigill_xml::document::find_by_id(&parsed, &id)
                .ok_or_else(|| Error::InvalidUri(format!("no element with identifier {id:?}")))?;
            NodeSet::tree_without_comments(element)
        }
    };
    tracing::trace!(uri, nodes = node_set.len(), "dereferenced");
    Ok(TransformData::Xml {
        xml_text: doc.text().to_owned(),
        node_set: Some(node_set),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<root xmlns:a="urn:a"><!--c--><a:item Id="one">x<!--c--></a:item><item ID="two">y</item></root>"#;

    fn octets(uri: &str) -> Vec<u8> {
        let doc = XmlDocument::parse(DOC).unwrap();
        dereference(&doc, uri).unwrap().into_binary().unwrap()
    }

    #[test]
    fn whole_document_without_comments() {
        assert_eq!(
            octets(""),
            br#"<root xmlns:a="urn:a"><a:item Id="one">x</a:item><item ID="two">y</item></root>"#.to_vec()
        );
    }

    #[test]
    fn id_reference_keeps_inherited_namespaces() {
        assert_eq!(octets("#one"), br#"<a:item xmlns:a="urn:a" Id="one">x</a:item>"#.to_vec());
        assert_eq!(octets("#two"), br#"<item xmlns:a="urn:a" ID="two">y</item>"#.to_vec());
    }

    #[test]
    fn unknown_id_and_external_uri() {
        let doc = XmlDocument::parse(DOC).unwrap();
        assert!(matches!(dereference(&doc, "#missing"), Err(Error::InvalidUri(_))));
        assert!(matches!(dereference(&doc, "http://example.com/"), Err(Error::InvalidUri(_))));
    }
}
