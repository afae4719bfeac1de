#![forbid(unsafe_code)]

//! Signing and verifying the payload of a SOAP envelope.

use crate::error::SoapError;
use sigill_c14n::C14nMode;
use sigill_core::ns;
use sigill_dsig::{SignatureTarget, XmlDsigAdapter};
use sigill_xml::document::find_element;
use sigill_xml::{ElementRef, XmlDocument};

/// Sign the first element of the envelope's `<Body>`.
///
/// The payload is canonicalized (inclusive C14N 1.0) into a standalone
/// document, so the namespaces it inherits from the envelope become
/// explicit declarations. That document is signed as a whole and its
/// canonical form replaces the content of `<Body>`. The rest of the
/// request is left as it was.
///
/// Before anything else, every `ns1` prefix is renamed to `wns1`.
pub fn sign_envelope(adapter: &XmlDsigAdapter, request: &str) -> Result<String, SoapError> {
    let request = rename_ns1(request);
    let mut envelope = XmlDocument::parse(request)?;
    let (body, payload) = extract_payload(&envelope)?;

    let mut payload = XmlDocument::parse(payload)?;
    adapter.sign(&mut payload, SignatureTarget::Document, None)?;
    let signed = canonical_string(payload.text())?;

    envelope.replace_content(body, &signed)?;
    tracing::debug!(len = signed.len(), "signed SOAP body");
    Ok(envelope.into_string())
}

/// Verify the signature inside the first element of the envelope's `<Body>`.
///
/// The payload is extracted exactly as [`sign_envelope`] does before
/// signing, then checked with [`XmlDsigAdapter::verify`].
pub fn verify_envelope(adapter: &mut XmlDsigAdapter, response: &str) -> Result<bool, SoapError> {
    let envelope = XmlDocument::parse(response)?;
    let (_, payload) = extract_payload(&envelope)?;
    let payload = XmlDocument::parse(payload)?;
    Ok(adapter.verify(&payload)?)
}

fn rename_ns1(request: &str) -> String {
    request.replace(":ns1", ":wns1").replace("ns1:", "wns1:")
}

/// The `<Body>` handle and the canonical text of its first element child.
fn extract_payload(envelope: &XmlDocument) -> Result<(ElementRef, String), SoapError> {
    let doc = envelope.parse_doc()?;
    let envelope_ns = doc.root_element().tag_name().namespace().unwrap_or("");
    let body = find_element(&doc, envelope_ns, ns::node::BODY).ok_or(SoapError::MissingBody)?;
    let payload = body
        .children()
        .find(|n| n.is_element())
        .ok_or(SoapError::EmptyBody)?;

    let canonical = sigill_c14n::canonicalize_subtree(payload, C14nMode::Inclusive, &[])?;
    let body = envelope.element_ref(body).ok_or(SoapError::MissingBody)?;
    Ok((body, utf8(canonical)?))
}

fn canonical_string(xml: &str) -> Result<String, SoapError> {
    utf8(sigill_c14n::canonicalize(xml, C14nMode::Inclusive, None, &[])?)
}

fn utf8(bytes: Vec<u8>) -> Result<String, SoapError> {
    String::from_utf8(bytes)
        .map_err(|e| sigill_core::Error::Canonicalization(format!("invalid UTF-8: {e}")).into())
}
