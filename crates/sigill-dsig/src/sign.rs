#![forbid(unsafe_code)]

//! Enveloped signature creation.
//!
//! The signature is built in four steps:
//! 1. Give the target an identifier (when it is an element) and pick the reference URI
//! 2. Append a `<ds:Signature>` template with empty digest and signature values
//! 3. Run the reference through its transforms and fill in `<DigestValue>`
//! 4. Canonicalize `<SignedInfo>`, sign it and fill in `<SignatureValue>`
//!
//! The digest is computed with the template already in the document.

use crate::reference;
use base64::Engine;
use sigill_c14n::C14nMode;
use sigill_core::{ns, Error};
use sigill_crypto::SigningKey;
use sigill_keys::{keyinfo, Key};
use sigill_transforms::TransformPipeline;
use sigill_xml::document::find_child_element;
use sigill_xml::{ElementRef, XmlDocument, XmlWriter};

/// What a signature covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureTarget {
    /// The whole document, referenced with `URI=""`.
    #[default]
    Document,
    /// One element, referenced by its identifier.
    Element(ElementRef),
}

impl From<ElementRef> for SignatureTarget {
    fn from(el: ElementRef) -> Self {
        Self::Element(el)
    }
}

/// Algorithms and keys for one signing operation.
pub(crate) struct SignOptions<'a> {
    pub canonical_method: &'a str,
    pub signature_method: &'a str,
    pub digest_method: &'a str,
    pub transforms: &'a [String],
    pub signing_key: &'a SigningKey,
    /// Key written into `<KeyInfo>`.
    pub key_info: Option<&'a Key>,
}

/// Sign `target` and append the signature to `append_to`.
///
/// The document is only replaced once every step has succeeded.
pub(crate) fn sign(
    doc: &mut XmlDocument,
    target: SignatureTarget,
    append_to: ElementRef,
    opts: &SignOptions<'_>,
) -> Result<(), Error> {
    let mode = C14nMode::from_uri(opts.canonical_method).ok_or_else(|| {
        Error::UnsupportedAlgorithm(format!("canonicalization: {}", opts.canonical_method))
    })?;
    let algorithm = sigill_crypto::sign::from_uri(opts.signature_method)?;
    sigill_crypto::digest::from_uri(opts.digest_method)?;

    let mut work = doc.clone();
    let uri = reference_uri(&mut work, target)?;
    tracing::debug!(
        uri = %uri,
        signature_method = opts.signature_method,
        digest_method = opts.digest_method,
        "signing reference"
    );

    work.append_child_xml(append_to, &signature_template(&uri, opts)?)?;
    let signature = appended_signature(&work, append_to)?;

    let pipeline = TransformPipeline::from_uris(opts.transforms, Some(signature))?;
    let digest = reference::compute_digest(&work, &uri, &pipeline, opts.digest_method)?;
    let digest_value = signature_part(
        &work,
        signature,
        &[ns::node::SIGNED_INFO, ns::node::REFERENCE, ns::node::DIGEST_VALUE],
    )?;
    work.set_text(digest_value, &b64().encode(digest))?;

    let canonical = {
        let parsed = work.parse_doc()?;
        let signed_info = resolve_path(&work, &parsed, signature, &[ns::node::SIGNED_INFO])?;
        sigill_c14n::canonicalize_subtree(signed_info, mode, &[])?
    };
    tracing::trace!(len = canonical.len(), "canonicalized SignedInfo");
    let value = algorithm.sign(opts.signing_key, &canonical)?;
    let signature_value = signature_part(&work, signature, &[ns::node::SIGNATURE_VALUE])?;
    work.set_text(signature_value, &b64().encode(value))?;

    *doc = work;
    Ok(())
}

/// `""` for the whole document, `#id` for an element. An element without
/// an identifier is given a fresh `Id`; an existing one is never replaced.
fn reference_uri(doc: &mut XmlDocument, target: SignatureTarget) -> Result<String, Error> {
    let el = match target {
        SignatureTarget::Document => return Ok(String::new()),
        SignatureTarget::Element(el) => el,
    };
    if let Some(id) = doc.id_of(el)? {
        tracing::debug!(id = %id, "reusing element identifier");
        return Ok(format!("#{id}"));
    }
    let id = format!("pfx{}", uuid::Uuid::new_v4());
    doc.insert_attribute(el, ns::attr::ID, &id)?;
    Ok(format!("#{id}"))
}

fn ds(local: &str) -> String {
    format!("{}:{local}", ns::DSIG_PREFIX)
}

/// The template in the xmlseclibs layout: line breaks only around the
/// `SignedInfo` children and before `KeyInfo`.
fn signature_template(uri: &str, opts: &SignOptions<'_>) -> Result<String, Error> {
    let mut w = XmlWriter::new();
    w.start_element(&ds(ns::node::SIGNATURE), &[("xmlns:ds", ns::DSIG)])
        .raw("\n  ")
        .start_element(&ds(ns::node::SIGNED_INFO), &[])
        .empty_element(
            &ds(ns::node::CANONICALIZATION_METHOD),
            &[(ns::attr::ALGORITHM, opts.canonical_method)],
        )
        .raw("\n    ")
        .empty_element(
            &ds(ns::node::SIGNATURE_METHOD),
            &[(ns::attr::ALGORITHM, opts.signature_method)],
        )
        .raw("\n  ")
        .start_element(&ds(ns::node::REFERENCE), &[(ns::attr::URI, uri)]);

    if !opts.transforms.is_empty() {
        w.start_element(&ds(ns::node::TRANSFORMS), &[]);
        for transform in opts.transforms {
            w.empty_element(&ds(ns::node::TRANSFORM), &[(ns::attr::ALGORITHM, transform)]);
        }
        w.end_element();
    }

    w.empty_element(&ds(ns::node::DIGEST_METHOD), &[(ns::attr::ALGORITHM, opts.digest_method)])
        .empty_element(&ds(ns::node::DIGEST_VALUE), &[])
        .end_element()
        .end_element()
        .empty_element(&ds(ns::node::SIGNATURE_VALUE), &[])
        .raw("\n");

    if let Some(key) = opts.key_info {
        keyinfo::write_key_info(&mut w, key)?;
    }
    w.end_element();
    Ok(w.finish())
}

/// The `<Signature>` just appended as the last child of `parent`.
fn appended_signature(doc: &XmlDocument, parent: ElementRef) -> Result<ElementRef, Error> {
    let parsed = doc.parse_doc()?;
    doc.resolve(&parsed, parent)?
        .children()
        .filter(|n| n.is_element())
        .last()
        .filter(|n| n.has_tag_name((ns::DSIG, ns::node::SIGNATURE)))
        .and_then(|n| doc.element_ref(n))
        .ok_or_else(|| Error::MissingElement(ns::node::SIGNATURE.into()))
}

fn resolve_path<'a, 'input>(
    doc: &XmlDocument,
    parsed: &'a roxmltree::Document<'input>,
    signature: ElementRef,
    path: &[&str],
) -> Result<roxmltree::Node<'a, 'input>, Error> {
    let mut node = doc.resolve(parsed, signature)?;
    for name in path {
        node = find_child_element(node, ns::DSIG, name)
            .ok_or_else(|| Error::MissingElement((*name).into()))?;
    }
    Ok(node)
}

fn signature_part(doc: &XmlDocument, signature: ElementRef, path: &[&str]) -> Result<ElementRef, Error> {
    let parsed = doc.parse_doc()?;
    let node = resolve_path(doc, &parsed, signature, path)?;
    doc.element_ref(node)
        .ok_or_else(|| Error::XmlStructure("not an element".into()))
}

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigill_core::algorithm;

    fn key() -> Key {
        sigill_keys::loader::load_pem_auto(include_bytes!("../../../testdata/privkey.pem"), None).unwrap()
    }

    fn sign_with(xml: &str, target: Option<&str>, transforms: &[String]) -> XmlDocument {
        let key = key();
        let signing_key = key.to_signing_key().unwrap();
        let opts = SignOptions {
            canonical_method: algorithm::C14N,
            signature_method: algorithm::RSA_SHA1,
            digest_method: algorithm::SHA1,
            transforms,
            signing_key: &signing_key,
            key_info: None,
        };
        let mut doc = XmlDocument::parse(xml).unwrap();
        let target = match target {
            Some(name) => SignatureTarget::Element(doc.find_element("", name).unwrap().unwrap()),
            None => SignatureTarget::Document,
        };
        sign(&mut doc, target, ElementRef::ROOT, &opts).unwrap();
        doc
    }

    #[test]
    fn template_layout() {
        let doc = sign_with(
            "<root><node>hello</node></root>",
            None,
            &[algorithm::ENVELOPED_SIGNATURE.to_owned()],
        );
        let text = doc.text();
        let head = concat!(
            "<root><node>hello</node>",
            "<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">\n",
            "  <ds:SignedInfo><ds:CanonicalizationMethod Algorithm=\"http://www.w3.org/TR/2001/REC-xml-c14n-20010315\"></ds:CanonicalizationMethod>\n",
            "    <ds:SignatureMethod Algorithm=\"http://www.w3.org/2000/09/xmldsig#rsa-sha1\"></ds:SignatureMethod>\n",
            "  <ds:Reference URI=\"\"><ds:Transforms><ds:Transform Algorithm=\"http://www.w3.org/2000/09/xmldsig#enveloped-signature\"></ds:Transform></ds:Transforms>",
            "<ds:DigestMethod Algorithm=\"http://www.w3.org/2000/09/xmldsig#sha1\"></ds:DigestMethod><ds:DigestValue>",
        );
        assert!(text.starts_with(head), "{text}");
        assert!(text.contains("</ds:DigestValue></ds:Reference></ds:SignedInfo><ds:SignatureValue>"));
        assert!(text.ends_with("</ds:SignatureValue>\n</ds:Signature></root>"));
        assert!(!text.contains("KeyInfo"));
    }

    #[test]
    fn no_transforms_element_when_chain_is_empty() {
        let doc = sign_with("<root><a/></root>", Some("root"), &[]);
        assert!(!doc.text().contains("Transforms"));
    }

    #[test]
    fn existing_identifier_is_reused() {
        let doc = sign_with(
            r#"<root><node ID="n1">x</node></root>"#,
            Some("node"),
            &[],
        );
        assert!(doc.text().contains(r#"<node ID="n1">"#));
        assert!(doc.text().contains(r##"URI="#n1""##));
    }

    #[test]
    fn fresh_identifier_is_added() {
        let doc = sign_with("<root><node>x</node></root>", Some("node"), &[]);
        let node = doc.find_element("", "node").unwrap().unwrap();
        let id = doc.id_of(node).unwrap().unwrap();
        assert!(id.starts_with("pfx"));
        assert_eq!(id.len(), 3 + 36);
        assert!(doc.text().contains(&format!("URI=\"#{id}\"")));
    }

    #[test]
    fn unsupported_algorithm_leaves_document_untouched() {
        let key = key();
        let signing_key = key.to_signing_key().unwrap();
        let opts = SignOptions {
            canonical_method: "http://www.w3.org/2006/12/xml-c14n11",
            signature_method: algorithm::RSA_SHA1,
            digest_method: algorithm::SHA1,
            transforms: &[],
            signing_key: &signing_key,
            key_info: None,
        };
        let mut doc = XmlDocument::parse("<root><node>x</node></root>").unwrap();
        let before = doc.clone();
        let node = doc.find_element("", "node").unwrap().unwrap();
        let err = sign(&mut doc, SignatureTarget::Element(node), ElementRef::ROOT, &opts);
        assert!(matches!(err, Err(Error::UnsupportedAlgorithm(_))));
        assert_eq!(doc, before);
    }

    #[test]
    fn key_info_follows_signature_value_on_its_own_line() {
        let key = key();
        let signing_key = key.to_signing_key().unwrap();
        let opts = SignOptions {
            canonical_method: algorithm::C14N,
            signature_method: algorithm::RSA_SHA1,
            digest_method: algorithm::SHA1,
            transforms: &[],
            signing_key: &signing_key,
            key_info: Some(&key),
        };
        let mut doc = XmlDocument::parse("<root/>").unwrap();
        sign(&mut doc, SignatureTarget::Document, ElementRef::ROOT, &opts).unwrap();
        assert!(doc.text().contains("</ds:SignatureValue>\n<ds:KeyInfo>"));
        assert!(doc.text().ends_with("</ds:KeyInfo></ds:Signature></root>"));
    }

    #[test]
    fn earlier_append_target_keeps_later_target_handle() {
        let key = key();
        let signing_key = key.to_signing_key().unwrap();
        let opts = SignOptions {
            canonical_method: algorithm::C14N,
            signature_method: algorithm::RSA_SHA1,
            digest_method: algorithm::SHA1,
            transforms: &[],
            signing_key: &signing_key,
            key_info: None,
        };
        let mut doc = XmlDocument::parse("<root><sigs/><a/><b/></root>").unwrap();
        let sigs = doc.find_element("", "sigs").unwrap().unwrap();
        let a = doc.find_element("", "a").unwrap().unwrap();
        let b = doc.find_element("", "b").unwrap().unwrap();

        sign(&mut doc, SignatureTarget::Element(a), sigs, &opts).unwrap();
        sign(&mut doc, SignatureTarget::Element(b), sigs, &opts).unwrap();

        let id_a = doc.id_of(a).unwrap().unwrap();
        let id_b = doc.id_of(b).unwrap().unwrap();
        assert_ne!(id_a, id_b);
        assert!(doc.element_source(a).unwrap().starts_with("<a Id="));
        assert!(doc.element_source(b).unwrap().starts_with("<b Id="));
        assert!(doc.text().contains(&format!("URI=\"#{id_b}\"")));
        assert_eq!(doc.find_elements(ns::DSIG, ns::node::SIGNATURE).unwrap().len(), 2);
    }
}
