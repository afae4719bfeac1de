#![forbid(unsafe_code)]

//! Enveloped signature transform.
//!
//! Removes the enclosing `<Signature>` element and its descendants from
//! the node set.

use crate::pipeline::{Transform, TransformData};
use sigill_core::{algorithm, Error};
use sigill_xml::{ElementRef, NodeSet};

pub struct EnvelopedSignatureTransform {
    signature: ElementRef,
}

impl EnvelopedSignatureTransform {
    pub fn new(signature: ElementRef) -> Self {
        Self { signature }
    }
}

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &str {
        algorithm::ENVELOPED_SIGNATURE
    }

    fn execute(&self, input: TransformData) -> Result<TransformData, Error> {
        let TransformData::Xml { xml_text, node_set } = input else {
            return Err(Error::Transform(
                "enveloped-signature transform requires XML input".into(),
            ));
        };

        let node_set = {
            let doc = sigill_xml::parse(&xml_text)?;
            let signature = self
                .signature
                .resolve(&doc)
                .ok_or_else(|| Error::Transform("Signature element not found".into()))?;
            let mut set = node_set.unwrap_or_else(|| NodeSet::all(&doc));
            set.subtract_tree(signature);
            set
        };
        Ok(TransformData::Xml { xml_text, node_set: Some(node_set) })
    }
}
