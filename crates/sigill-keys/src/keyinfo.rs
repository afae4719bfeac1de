#![forbid(unsafe_code)]

//! Reading and writing `<ds:KeyInfo>`.

use crate::export;
use crate::key::{Key, KeyData};
use crate::loader;
use base64::Engine;
use rsa::traits::PublicKeyParts;
use sigill_core::{ns, Error};
use sigill_xml::document::{find_child_element, find_child_elements};
use sigill_xml::XmlWriter;

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// Decode element text as base64, ignoring embedded whitespace.
fn decode_text(node: roxmltree::Node<'_, '_>) -> Result<Vec<u8>, Error> {
    let clean: String = node
        .text()
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if clean.is_empty() {
        return Err(Error::Base64(format!("empty {}", node.tag_name().name())));
    }
    b64()
        .decode(&clean)
        .map_err(|e| Error::Base64(format!("{}: {e}", node.tag_name().name())))
}

fn child_bytes(parent: roxmltree::Node<'_, '_>, name: &str) -> Result<Vec<u8>, Error> {
    let node = find_child_element(parent, ns::DSIG, name)
        .ok_or_else(|| Error::MissingElement(name.into()))?;
    decode_text(node)
}

/// Extract the key carried by a `<KeyInfo>` element.
///
/// Looks at `X509Data`, `KeyValue` and `DEREncodedKeyValue` children in
/// document order and returns the first one that yields a key.
pub fn extract_key_value(key_info: roxmltree::Node<'_, '_>) -> Option<Key> {
    for child in key_info.children().filter(|n| n.is_element()) {
        let ns_uri = child.tag_name().namespace().unwrap_or("");
        let found = match (ns_uri, child.tag_name().name()) {
            (ns::DSIG, ns::node::X509_DATA) => extract_x509_certificate(child),
            (ns::DSIG, ns::node::KEY_VALUE) => parse_rsa_key_value(child)
                .or_else(|_| parse_dsa_key_value(child))
                .ok(),
            (ns::DSIG11, ns::node::DER_ENCODED_KEY_VALUE) => {
                decode_text(child).ok().and_then(|der| loader::load_spki_der(&der).ok())
            }
            _ => None,
        };
        if let Some(key) = found {
            tracing::debug!(source = child.tag_name().name(), "key found in KeyInfo");
            return Some(key);
        }
    }
    None
}

/// Key from `<X509Data>`. With several certificates, the leaf is the one
/// whose subject does not issue any other certificate in the list.
fn extract_x509_certificate(x509_data: roxmltree::Node<'_, '_>) -> Option<Key> {
    use der::{Decode, Encode};

    let mut certs = Vec::new();
    for node in find_child_elements(x509_data, ns::DSIG, ns::node::X509_CERTIFICATE) {
        let Ok(der) = decode_text(node) else { continue };
        if let Ok(cert) = x509_cert::Certificate::from_der(&der) {
            certs.push((cert, der));
        }
    }

    let name_der = |name: &x509_cert::name::Name| name.to_der().unwrap_or_default();
    let leaf = certs
        .iter()
        .position(|(cert, _)| {
            let subject = name_der(&cert.tbs_certificate.subject);
            !certs.iter().any(|(other, _)| {
                !std::ptr::eq(cert, other) && name_der(&other.tbs_certificate.issuer) == subject
            })
        })
        .unwrap_or(certs.len().checked_sub(1)?);

    let mut ders: Vec<Vec<u8>> = certs.into_iter().map(|(_, der)| der).collect();
    let leaf_der = ders.remove(leaf);
    let key = loader::load_x509_cert_der(&leaf_der).ok()?;
    ders.insert(0, leaf_der);
    Some(key.with_chain(ders))
}

/// RSA public key from `<KeyValue><RSAKeyValue>`.
pub fn parse_rsa_key_value(key_value: roxmltree::Node<'_, '_>) -> Result<Key, Error> {
    let rsa_kv = find_child_element(key_value, ns::DSIG, ns::node::RSA_KEY_VALUE)
        .ok_or_else(|| Error::MissingElement(ns::node::RSA_KEY_VALUE.into()))?;
    let n = rsa::BigUint::from_bytes_be(&child_bytes(rsa_kv, ns::node::RSA_MODULUS)?);
    let e = rsa::BigUint::from_bytes_be(&child_bytes(rsa_kv, ns::node::RSA_EXPONENT)?);
    let public = rsa::RsaPublicKey::new(n, e)
        .map_err(|err| Error::Key(format!("invalid RSA public key: {err}")))?;
    Ok(Key::new(KeyData::Rsa { private: None, public }))
}

/// DSA public key from `<KeyValue><DSAKeyValue>`.
pub fn parse_dsa_key_value(key_value: roxmltree::Node<'_, '_>) -> Result<Key, Error> {
    let dsa_kv = find_child_element(key_value, ns::DSIG, ns::node::DSA_KEY_VALUE)
        .ok_or_else(|| Error::MissingElement(ns::node::DSA_KEY_VALUE.into()))?;
    let int = |name| child_bytes(dsa_kv, name).map(|b| dsa::BigUint::from_bytes_be(&b));

    let components = dsa::Components::from_components(
        int(ns::node::DSA_P)?,
        int(ns::node::DSA_Q)?,
        int(ns::node::DSA_G)?,
    )
    .map_err(|e| Error::Key(format!("invalid DSA parameters: {e}")))?;
    let public = dsa::VerifyingKey::from_components(components, int(ns::node::DSA_Y)?)
        .map_err(|e| Error::Key(format!("invalid DSA public key: {e}")))?;
    Ok(Key::new(KeyData::Dsa { private: None, public }))
}

fn ds(local: &str) -> String {
    format!("{}:{local}", ns::DSIG_PREFIX)
}

/// Write a `<ds:KeyInfo>` for `key`.
///
/// A key with certificates gets `X509Data/X509Certificate` (leaf only).
/// RSA and DSA keys without one get `KeyValue`; EC keys get a dsig11
/// `DEREncodedKeyValue`.
pub fn write_key_info(w: &mut XmlWriter, key: &Key) -> Result<(), Error> {
    w.start_element(&ds(ns::node::KEY_INFO), &[]);
    if let Some(cert) = key.certificate() {
        w.start_element(&ds(ns::node::X509_DATA), &[])
            .text_element(&ds(ns::node::X509_CERTIFICATE), &b64().encode(cert))
            .end_element();
    } else {
        match &key.data {
            KeyData::Rsa { public, .. } => {
                w.start_element(&ds(ns::node::KEY_VALUE), &[])
                    .start_element(&ds(ns::node::RSA_KEY_VALUE), &[])
                    .text_element(&ds(ns::node::RSA_MODULUS), &b64().encode(public.n().to_bytes_be()))
                    .text_element(&ds(ns::node::RSA_EXPONENT), &b64().encode(public.e().to_bytes_be()))
                    .end_element()
                    .end_element();
            }
            KeyData::Dsa { public, .. } => {
                let c = public.components();
                w.start_element(&ds(ns::node::KEY_VALUE), &[])
                    .start_element(&ds(ns::node::DSA_KEY_VALUE), &[]);
                for (name, value) in [
                    (ns::node::DSA_P, c.p()),
                    (ns::node::DSA_Q, c.q()),
                    (ns::node::DSA_G, c.g()),
                    (ns::node::DSA_Y, public.y()),
                ] {
                    w.text_element(&ds(name), &b64().encode(value.to_bytes_be()));
                }
                w.end_element().end_element();
            }
            KeyData::EcP256 { .. } | KeyData::EcP384 { .. } => {
                let der = export::public_key_der(key)?;
                w.start_element(
                    "dsig11:DEREncodedKeyValue",
                    &[("xmlns:dsig11", ns::DSIG11)],
                )
                .text(&b64().encode(der))
                .end_element();
            }
        }
    }
    w.end_element();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_pem_auto;

    const CERT: &str = include_str!("../../../testdata/cert-only.pem");
    const CERT_DER: &[u8] = include_bytes!("../../../testdata/cert.der");
    const PUBKEY: &str = include_str!("../../../testdata/pubkey.pem");
    const DSA_PUB: &str = include_str!("../../../testdata/dsa-pubkey.pem");
    const EC_PUB: &str = include_str!("../../../testdata/ec-pubkey.pem");

    fn round_trip(key: &Key) -> Key {
        let mut w = XmlWriter::new();
        w.start_element("ds:Signature", &[("xmlns:ds", ns::DSIG)]);
        write_key_info(&mut w, key).unwrap();
        let xml = w.finish();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let key_info = doc
            .descendants()
            .find(|n| n.has_tag_name((ns::DSIG, ns::node::KEY_INFO)))
            .unwrap();
        extract_key_value(key_info).unwrap()
    }

    fn spki(key: &Key) -> Vec<u8> {
        export::public_key_der(key).unwrap()
    }

    #[test]
    fn certificate_is_embedded() {
        let key = load_pem_auto(CERT.as_bytes(), None).unwrap();
        let mut w = XmlWriter::new();
        write_key_info(&mut w, &key).unwrap();
        let xml = w.finish();
        assert!(xml.starts_with("<ds:KeyInfo><ds:X509Data><ds:X509Certificate>"));
        assert!(xml.contains(&export::pem_body_base64(CERT)));

        let back = round_trip(&key);
        assert_eq!(back.certificate(), Some(CERT_DER));
    }

    #[test]
    fn rsa_key_value() {
        let key = load_pem_auto(PUBKEY.as_bytes(), None).unwrap();
        let back = round_trip(&key);
        assert!(back.x509_chain.is_empty());
        assert_eq!(spki(&back), spki(&key));
    }

    #[test]
    fn dsa_key_value() {
        let key = load_pem_auto(DSA_PUB.as_bytes(), None).unwrap();
        assert_eq!(spki(&round_trip(&key)), spki(&key));
    }

    #[test]
    fn ec_der_encoded_key_value() {
        let key = load_pem_auto(EC_PUB.as_bytes(), None).unwrap();
        assert_eq!(spki(&round_trip(&key)), spki(&key));
    }

    #[test]
    fn empty_key_info_has_no_key() {
        let xml = format!(r#"<KeyInfo xmlns="{}"><KeyName>k</KeyName></KeyInfo>"#, ns::DSIG);
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(extract_key_value(doc.root_element()).is_none());
    }

    #[test]
    fn malformed_certificate_is_skipped() {
        let xml = format!(
            r#"<KeyInfo xmlns="{}"><X509Data><X509Certificate>!!!</X509Certificate></X509Data></KeyInfo>"#,
            ns::DSIG
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(extract_key_value(doc.root_element()).is_none());
    }
}
