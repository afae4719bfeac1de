#![forbid(unsafe_code)]

//! XML-DSig signature verification.
//!
//! Processing order:
//! 1. Locate `<Signature>` and read `<SignedInfo>`
//! 2. Canonicalize `<SignedInfo>` with the method it declares
//! 3. Resolve the verification key (done by the adapter)
//! 4. Check `<SignatureValue>`
//! 5. For each `<Reference>`: dereference, run transforms, digest, compare
//!
//! Steps 1 and 2 raise errors. From step 4 on every failure is an
//! [`VerifyResult::Invalid`] outcome.

use crate::reference;
use base64::Engine;
use roxmltree::Node;
use sigill_c14n::C14nMode;
use sigill_core::{ns, Error};
use sigill_keys::{keyinfo, Key};
use sigill_transforms::pipeline::from_uri as transform_from_uri;
use sigill_transforms::TransformPipeline;
use sigill_xml::document::{find_child_element, find_child_elements, find_element};
use sigill_xml::{ElementRef, XmlDocument};

/// Result of signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// Signature and every reference digest check out.
    Valid,
    /// Signature or a reference failed to verify.
    Invalid { reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid)
    }
}

/// A key found inside a signature's `<KeyInfo>`.
#[derive(Debug, Clone)]
pub struct EmbeddedKey {
    pub key: Key,
    /// The `SignatureMethod` of the signature carrying the key.
    pub algorithm: Option<String>,
}

/// The first `<ds:Signature>` in document order.
pub fn locate_signature<'a, 'input>(doc: &'a roxmltree::Document<'input>) -> Option<Node<'a, 'input>> {
    find_element(doc, ns::DSIG, ns::node::SIGNATURE)
}

/// Every `<ds:Signature>` in document order.
pub fn locate_signatures<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
) -> Vec<Node<'a, 'input>> {
    doc.descendants()
        .filter(|n| n.has_tag_name((ns::DSIG, ns::node::SIGNATURE)))
        .collect()
}

/// The key carried in the `<KeyInfo>` of `signature`, if any.
pub fn locate_key(signature: Node<'_, '_>) -> Option<EmbeddedKey> {
    let key_info = find_child_element(signature, ns::DSIG, ns::node::KEY_INFO)?;
    let key = keyinfo::extract_key_value(key_info)?;
    let algorithm = find_child_element(signature, ns::DSIG, ns::node::SIGNED_INFO)
        .and_then(|si| find_child_element(si, ns::DSIG, ns::node::SIGNATURE_METHOD))
        .and_then(|sm| sm.attribute(ns::attr::ALGORITHM))
        .map(str::to_owned);
    Some(EmbeddedKey { key, algorithm })
}

/// `<SignedInfo>` read and canonicalized, ready to be checked against a key.
pub(crate) struct PreparedSignature<'a, 'input> {
    signature: Node<'a, 'input>,
    signed_info: Node<'a, 'input>,
    canonical: Vec<u8>,
    pub signature_method: String,
}

/// Read `<SignedInfo>` and canonicalize it with its declared method.
pub(crate) fn prepare<'a, 'input>(
    signature: Node<'a, 'input>,
) -> Result<PreparedSignature<'a, 'input>, Error> {
    let signed_info = required_child(signature, ns::node::SIGNED_INFO)?;

    let c14n_node = required_child(signed_info, ns::node::CANONICALIZATION_METHOD)?;
    let c14n_uri = algorithm_of(c14n_node)?;
    let mode = C14nMode::from_uri(c14n_uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("canonicalization: {c14n_uri}")))?;
    let canonical =
        sigill_c14n::canonicalize_subtree(signed_info, mode, &read_inclusive_prefixes(c14n_node))?;

    let signature_method =
        algorithm_of(required_child(signed_info, ns::node::SIGNATURE_METHOD)?)?.to_owned();

    Ok(PreparedSignature { signature, signed_info, canonical, signature_method })
}

/// Check the signature value and every reference with `key`.
pub(crate) fn check(doc: &XmlDocument, prepared: &PreparedSignature<'_, '_>, key: &Key) -> VerifyResult {
    match check_signature_value(prepared, key).and_then(|()| check_references(doc, prepared)) {
        Ok(()) => VerifyResult::Valid,
        Err(e) => VerifyResult::Invalid { reason: e.to_string() },
    }
}

fn check_signature_value(prepared: &PreparedSignature<'_, '_>, key: &Key) -> Result<(), Error> {
    let method = prepared.signature_method.as_str();
    if !key.supports_algorithm(method) {
        return Err(Error::Key(format!("{:?} cannot verify {method}", key.data)));
    }
    let algorithm = sigill_crypto::sign::from_uri(method)?;
    let value = decode_base64(required_child(prepared.signature, ns::node::SIGNATURE_VALUE)?)?;
    if !algorithm.verify(&key.to_verifying_key(), &prepared.canonical, &value)? {
        return Err(Error::Crypto("signature value does not match".into()));
    }
    Ok(())
}

fn check_references(doc: &XmlDocument, prepared: &PreparedSignature<'_, '_>) -> Result<(), Error> {
    let signature = doc.element_ref(prepared.signature);
    let mut count = 0;
    for reference in find_child_elements(prepared.signed_info, ns::DSIG, ns::node::REFERENCE) {
        check_reference(doc, reference, signature)?;
        count += 1;
    }
    if count == 0 {
        return Err(Error::MissingElement(ns::node::REFERENCE.into()));
    }
    Ok(())
}

fn check_reference(
    doc: &XmlDocument,
    reference: Node<'_, '_>,
    signature: Option<ElementRef>,
) -> Result<(), Error> {
    let uri = reference.attribute(ns::attr::URI).unwrap_or("");

    let mut pipeline = TransformPipeline::new();
    if let Some(transforms) = find_child_element(reference, ns::DSIG, ns::node::TRANSFORMS) {
        for transform in find_child_elements(transforms, ns::DSIG, ns::node::TRANSFORM) {
            let algorithm = algorithm_of(transform)?;
            pipeline.push(transform_from_uri(algorithm, signature, read_inclusive_prefixes(transform))?);
        }
    }

    let digest_method = algorithm_of(required_child(reference, ns::node::DIGEST_METHOD)?)?;
    let expected = decode_base64(required_child(reference, ns::node::DIGEST_VALUE)?)?;
    let actual = reference::compute_digest(doc, uri, &pipeline, digest_method)?;
    if actual != expected {
        return Err(Error::Crypto(format!("digest mismatch for reference {uri:?}")));
    }
    tracing::trace!(uri, "reference digest matches");
    Ok(())
}

/// The PrefixList of an `<ec:InclusiveNamespaces>` child, if present.
fn read_inclusive_prefixes(node: Node<'_, '_>) -> Vec<String> {
    find_child_element(node, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|n| n.attribute(ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

fn required_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<Node<'a, 'input>, Error> {
    find_child_element(node, ns::DSIG, name).ok_or_else(|| Error::MissingElement(name.into()))
}

fn algorithm_of<'a>(node: Node<'a, '_>) -> Result<&'a str, Error> {
    node.attribute(ns::attr::ALGORITHM).ok_or_else(|| {
        Error::MissingAttribute(format!("Algorithm on {}", node.tag_name().name()))
    })
}

fn decode_base64(node: Node<'_, '_>) -> Result<Vec<u8>, Error> {
    let clean: String = node
        .text()
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(clean)
        .map_err(|e| Error::Base64(format!("{}: {e}", node.tag_name().name())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature_xml(c14n: &str) -> String {
        format!(
            r#"<root><ds:Signature xmlns:ds="{}"><ds:SignedInfo><ds:CanonicalizationMethod Algorithm="{c14n}"/><ds:SignatureMethod Algorithm="{}"/></ds:SignedInfo></ds:Signature></root>"#,
            ns::DSIG,
            sigill_core::algorithm::RSA_SHA1
        )
    }

    #[test]
    fn locates_first_signature() {
        let xml = format!(
            r#"<root><a/><Signature xmlns="{0}" Id="one"/><Signature xmlns="{0}" Id="two"/></root>"#,
            ns::DSIG
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(locate_signature(&doc).unwrap().attribute("Id"), Some("one"));
        assert_eq!(locate_signatures(&doc).len(), 2);

        let unsigned = roxmltree::Document::parse("<root/>").unwrap();
        assert!(locate_signature(&unsigned).is_none());
    }

    #[test]
    fn prepare_reads_declared_method() {
        let xml = signature_xml(sigill_core::algorithm::EXC_C14N);
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let prepared = prepare(locate_signature(&doc).unwrap()).unwrap();
        assert_eq!(prepared.signature_method, sigill_core::algorithm::RSA_SHA1);
        assert!(prepared.canonical.starts_with(b"<ds:SignedInfo xmlns:ds="));
    }

    #[test]
    fn prepare_rejects_unknown_canonicalization() {
        let xml = signature_xml("urn:unknown");
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(matches!(
            prepare(locate_signature(&doc).unwrap()),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn prepare_needs_signed_info() {
        let xml = format!(r#"<Signature xmlns="{}"/>"#, ns::DSIG);
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(matches!(
            prepare(doc.root_element()),
            Err(Error::MissingElement(ref name)) if name == "SignedInfo"
        ));
    }

    #[test]
    fn inclusive_prefixes() {
        let xml = format!(
            r#"<t xmlns:ec="{}"><ec:InclusiveNamespaces PrefixList="a  b"/></t>"#,
            ns::EXC_C14N
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(read_inclusive_prefixes(doc.root_element()), ["a", "b"]);
    }
}
