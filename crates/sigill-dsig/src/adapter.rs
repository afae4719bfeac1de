#![forbid(unsafe_code)]

//! The signing and verification adapter.
//!
//! [`XmlDsigAdapter`] holds the key material and algorithm choices for a
//! signing or verification session. Setters only record what they are
//! given; key material is parsed when `sign` or `verify` first needs it.
//! `set_certificate` is the exception: it unpacks the certificate or
//! PKCS#12 bundle right away and commits the key pair only on success.

use crate::material::{certificate_error, public_pem, Material};
use crate::sign::{self, SignOptions, SignatureTarget};
use crate::verify::{self, EmbeddedKey, VerifyResult};
use sigill_core::{algorithm, Error};
use sigill_keys::{export, loader, Key};
use sigill_xml::{ElementRef, XmlDocument};
use std::path::Path;

const NO_VERIFICATION_KEY: &str =
    "There is no private key or public key set for signature verification.";

/// Signing and verification with a configurable key, algorithm set and
/// transform chain.
///
/// ```no_run
/// use sigill_core::algorithm;
/// use sigill_dsig::{SignatureTarget, XmlDsigAdapter};
/// use sigill_xml::XmlDocument;
///
/// let mut adapter = XmlDsigAdapter::new();
/// adapter
///     .set_private_key("key.pem")
///     .set_public_key("cert.pem")
///     .add_transform(algorithm::ENVELOPED_SIGNATURE);
///
/// let mut doc = XmlDocument::parse("<root><node>hello world!</node></root>")?;
/// adapter.sign(&mut doc, SignatureTarget::Document, None)?;
/// assert!(adapter.verify(&doc)?);
/// # Ok::<(), sigill_core::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct XmlDsigAdapter {
    private_key: Option<Material>,
    public_key: Option<Material>,
    key_algorithm: String,
    digest_algorithm: String,
    canonical_method: String,
    transforms: Vec<String>,
}

impl Default for XmlDsigAdapter {
    fn default() -> Self {
        Self {
            private_key: None,
            public_key: None,
            key_algorithm: algorithm::RSA_SHA1.to_owned(),
            digest_algorithm: algorithm::SHA1.to_owned(),
            canonical_method: algorithm::C14N.to_owned(),
            transforms: Vec::new(),
        }
    }
}

impl XmlDsigAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Key material ─────────────────────────────────────────────────

    /// Set the private key used for RSA-SHA1 signing.
    ///
    /// `key` is read as a file when it is shorter than 1024 bytes and names
    /// an existing file. Otherwise it is taken as the key itself.
    pub fn set_private_key(&mut self, key: impl AsRef<[u8]>) -> &mut Self {
        self.set_private_key_with_algorithm(key, algorithm::RSA_SHA1)
    }

    /// Set the private key and the signature method it is used with.
    pub fn set_private_key_with_algorithm(
        &mut self,
        key: impl AsRef<[u8]>,
        algorithm: &str,
    ) -> &mut Self {
        self.commit_private_key(Material::from_input(key.as_ref()), algorithm)
    }

    pub fn set_private_key_from_path(&mut self, path: impl AsRef<Path>, algorithm: &str) -> &mut Self {
        self.commit_private_key(Material::from_path(path.as_ref()), algorithm)
    }

    pub fn set_private_key_from_bytes(&mut self, key: impl Into<Vec<u8>>, algorithm: &str) -> &mut Self {
        self.commit_private_key(Material::Raw(key.into()), algorithm)
    }

    /// Set the public key or certificate, with the same path handling as
    /// [`set_private_key`](Self::set_private_key).
    pub fn set_public_key(&mut self, key: impl AsRef<[u8]>) -> &mut Self {
        self.public_key = Some(Material::from_input(key.as_ref()));
        self
    }

    pub fn set_public_key_from_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.public_key = Some(Material::from_path(path.as_ref()));
        self
    }

    pub fn set_public_key_from_bytes(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.public_key = Some(Material::Raw(key.into()));
        self
    }

    /// Load the key pair from a PEM certificate with its private key, or
    /// from a PKCS#12 bundle without a password.
    pub fn set_certificate(&mut self, cert: impl AsRef<[u8]>) -> Result<&mut Self, Error> {
        self.commit_certificate(read_input(cert.as_ref())?, None)
    }

    pub fn set_certificate_with_password(
        &mut self,
        cert: impl AsRef<[u8]>,
        password: &str,
    ) -> Result<&mut Self, Error> {
        self.commit_certificate(read_input(cert.as_ref())?, Some(password))
    }

    pub fn set_certificate_from_path(
        &mut self,
        path: impl AsRef<Path>,
        password: Option<&str>,
    ) -> Result<&mut Self, Error> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::Certificate(format!("cannot read {}: {e}", path.display())))?;
        self.commit_certificate(data, password)
    }

    pub fn set_certificate_from_bytes(
        &mut self,
        cert: &[u8],
        password: Option<&str>,
    ) -> Result<&mut Self, Error> {
        self.commit_certificate(cert.to_vec(), password)
    }

    fn commit_private_key(&mut self, material: Material, algorithm: &str) -> &mut Self {
        self.private_key = Some(material);
        self.key_algorithm = algorithm.to_owned();
        self
    }

    fn commit_certificate(&mut self, data: Vec<u8>, password: Option<&str>) -> Result<&mut Self, Error> {
        let (private, public, key_algorithm) = unpack_certificate(&data, password, &self.key_algorithm)?;
        self.private_key = Some(private);
        self.public_key = Some(public);
        self.key_algorithm = key_algorithm;
        Ok(self)
    }

    // ── Algorithms ───────────────────────────────────────────────────

    /// Set the signature method used with the current private key.
    ///
    /// Fails with [`Error::UnsupportedAlgorithm`] when the method is unknown
    /// or does not suit the private key. A private key that was set but
    /// not yet parsed is loaded here to check it.
    pub fn set_key_algorithm(&mut self, uri: &str) -> Result<&mut Self, Error> {
        sigill_crypto::sign::from_uri(uri)?;
        if let Some(material) = &self.private_key {
            let key = material.key()?;
            if !key.supports_algorithm(uri) {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "{uri} cannot be used with a {:?}",
                    key.data
                )));
            }
        }
        self.key_algorithm = uri.to_owned();
        Ok(self)
    }

    pub fn set_digest_algorithm(&mut self, uri: &str) -> &mut Self {
        self.digest_algorithm = uri.to_owned();
        self
    }

    pub fn set_canonical_method(&mut self, uri: &str) -> &mut Self {
        self.canonical_method = uri.to_owned();
        self
    }

    /// Append a transform. Transforms are written in the order added.
    pub fn add_transform(&mut self, uri: &str) -> &mut Self {
        self.transforms.push(uri.to_owned());
        self
    }

    // ── Getters ──────────────────────────────────────────────────────

    /// The private key material as configured, or as PEM after `set_certificate`.
    pub fn private_key(&self) -> Option<&[u8]> {
        self.private_key.as_ref().and_then(Material::bytes)
    }

    /// The current public key or certificate as PEM.
    ///
    /// With `doc`, a key embedded in its first signature takes precedence
    /// and replaces the configured public key and key algorithm. Otherwise
    /// the configured public key is returned, and failing that the public
    /// half of the private key.
    pub fn public_key(&mut self, doc: Option<&XmlDocument>) -> Option<String> {
        doc.and_then(|doc| self.adopt_key_from_document(doc))
            .or_else(|| self.public_key.as_ref().and_then(Material::public_pem))
            .or_else(|| self.derived_public_key().and_then(|key| public_pem(&key).ok()))
    }

    pub fn key_algorithm(&self) -> &str {
        &self.key_algorithm
    }

    pub fn digest_algorithm(&self) -> &str {
        &self.digest_algorithm
    }

    pub fn canonical_method(&self) -> &str {
        &self.canonical_method
    }

    pub fn transforms(&self) -> &[String] {
        &self.transforms
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Sign `target` and insert the signature as the last child of
    /// `append_to`, or of the document element when `None`.
    ///
    /// The public key, when one can be resolved, is embedded in `<KeyInfo>`.
    pub fn sign(
        &self,
        doc: &mut XmlDocument,
        target: SignatureTarget,
        append_to: Option<ElementRef>,
    ) -> Result<(), Error> {
        let private = self
            .private_key
            .as_ref()
            .ok_or_else(Error::missing_private_key)?
            .key()?;
        let signing_key = private.to_signing_key().ok_or_else(Error::missing_private_key)?;
        if !private.supports_algorithm(&self.key_algorithm) {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} cannot be used with a {:?}",
                self.key_algorithm, private.data
            )));
        }

        let key_info = match &self.public_key {
            Some(material) => material.key()?,
            None => private.public_only(),
        };

        let opts = SignOptions {
            canonical_method: &self.canonical_method,
            signature_method: &self.key_algorithm,
            digest_method: &self.digest_algorithm,
            transforms: &self.transforms,
            signing_key: &signing_key,
            key_info: Some(&key_info),
        };
        sign::sign(doc, target, append_to.unwrap_or(ElementRef::ROOT), &opts)
    }

    /// Verify the first signature in `doc`.
    ///
    /// Returns `Ok(false)` when the signature or a reference digest does not
    /// match. Errors are reserved for a missing signature, a missing key and
    /// malformed input found before the signature value is checked. The
    /// document is not modified.
    pub fn verify(&mut self, doc: &XmlDocument) -> Result<bool, Error> {
        let parsed = doc.parse_doc()?;
        let signature = verify::locate_signature(&parsed).ok_or(Error::SignatureNotFound)?;
        let configured = self.configured_public_key()?;
        Ok(self.verify_signature(doc, signature, configured)?.is_valid())
    }

    /// Verify every signature in `doc`. Each one is checked with the
    /// configured key, or else with the key it embeds.
    pub fn verify_all(&mut self, doc: &XmlDocument) -> Result<bool, Error> {
        let parsed = doc.parse_doc()?;
        let signatures = verify::locate_signatures(&parsed);
        if signatures.is_empty() {
            return Err(Error::SignatureNotFound);
        }
        let configured = self.configured_public_key()?;
        for signature in signatures {
            if !self.verify_signature(doc, signature, configured.clone())?.is_valid() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn verify_signature(
        &mut self,
        doc: &XmlDocument,
        signature: roxmltree::Node<'_, '_>,
        configured: Option<Key>,
    ) -> Result<VerifyResult, Error> {
        let prepared = verify::prepare(signature)?;

        let key = match configured {
            Some(key) => {
                tracing::debug!("verifying with the configured public key");
                key
            }
            None => {
                let embedded = verify::locate_key(signature)
                    .ok_or_else(|| Error::MissingKey(NO_VERIFICATION_KEY.into()))?;
                tracing::debug!("verifying with the key embedded in KeyInfo");
                self.adopt(&embedded);
                embedded.key
            }
        };

        let result = verify::check(doc, &prepared, &key);
        match &result {
            VerifyResult::Valid => tracing::debug!(method = %prepared.signature_method, "signature valid"),
            VerifyResult::Invalid { reason } => tracing::debug!(%reason, "signature invalid"),
        }
        Ok(result)
    }

    // ── Key resolution ───────────────────────────────────────────────

    /// The configured public key, else the public half of the private key.
    fn configured_public_key(&self) -> Result<Option<Key>, Error> {
        if let Some(material) = &self.public_key {
            return material.key().map(|key| Some(key.public_only()));
        }
        match &self.private_key {
            Some(material) => material.key().map(|key| Some(key.public_only())),
            None => Ok(None),
        }
    }

    fn derived_public_key(&self) -> Option<Key> {
        let key = self.private_key.as_ref()?.key();
        if let Err(e) = &key {
            tracing::debug!(error = %e, "cannot derive a public key");
        }
        key.ok().map(|k| k.public_only())
    }

    fn adopt_key_from_document(&mut self, doc: &XmlDocument) -> Option<String> {
        let parsed = doc.parse_doc().ok()?;
        let embedded = verify::locate_key(verify::locate_signature(&parsed)?)?;
        self.adopt(&embedded);
        self.public_key.as_ref().and_then(Material::public_pem)
    }

    /// Cache an embedded key as the public key, with its signature method.
    fn adopt(&mut self, embedded: &EmbeddedKey) {
        match Material::public(&embedded.key) {
            Ok(material) => {
                self.public_key = Some(material);
                self.key_algorithm = embedded
                    .algorithm
                    .clone()
                    .unwrap_or_else(|| embedded.key.algorithm_uri().to_owned());
            }
            Err(e) => tracing::warn!(error = %e, "cannot cache embedded key"),
        }
    }
}

/// Read `input` as a file when it names one, as with the key setters.
fn read_input(input: &[u8]) -> Result<Vec<u8>, Error> {
    match Material::from_input(input) {
        Material::Raw(data) => Ok(data),
        Material::Unreadable(reason) => Err(Error::Certificate(reason)),
        Material::Loaded { pem, .. } => Ok(pem.into_bytes()),
    }
}

/// Split certificate material into private and public halves.
///
/// Data containing a PEM certificate is read as PEM, with `password`
/// decrypting an encrypted private key. Anything else is read as PKCS#12,
/// where no password means the empty password. The key algorithm is kept
/// when it suits the key, else replaced by the key's default.
fn unpack_certificate(
    data: &[u8],
    password: Option<&str>,
    key_algorithm: &str,
) -> Result<(Material, Material, String), Error> {
    if data.is_empty() {
        return Err(Error::Certificate(
            "the certificate is empty; check the file or the data provided".into(),
        ));
    }

    let key = if contains(data, b"BEGIN CERTIFICATE") {
        loader::load_pem_auto(data, password).map_err(|e| {
            Error::Certificate(format!("unable to load the PEM certificate: {e}"))
        })?
    } else {
        loader::load_pkcs12(data, password.unwrap_or("")).map_err(|e| {
            Error::Certificate(format!(
                "unable to load the certificate as PKCS#12; check the certificate and password provided ({e})"
            ))
        })?
    };

    if !key.has_private() {
        return Err(Error::Certificate("unable to load the private key from the certificate".into()));
    }
    if key.certificate().is_none() {
        return Err(Error::Certificate("unable to load the public key from the certificate".into()));
    }

    let private_pem = export::private_key_to_pem(&key).map_err(certificate_error)?;
    let public = Material::public(&key).map_err(certificate_error)?;
    let key_algorithm = if key.supports_algorithm(key_algorithm) {
        key_algorithm.to_owned()
    } else {
        key.algorithm_uri().to_owned()
    };
    tracing::debug!(key = ?key.data, algorithm = %key_algorithm, "certificate loaded");
    Ok((Material::Loaded { pem: private_pem, key }, public, key_algorithm))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PRIVKEY: &str = include_str!("../../../testdata/privkey.pem");
    const PUBKEY: &str = include_str!("../../../testdata/pubkey.pem");
    const OTHER_PRIVKEY: &str = include_str!("../../../testdata/other-privkey.pem");
    const CERT_ONLY: &str = include_str!("../../../testdata/cert-only.pem");
    const CERT_WITH_KEY: &str = include_str!("../../../testdata/cert.pem");
    const CERT_ENC: &str = include_str!("../../../testdata/cert-enc.pem");
    const PFX: &[u8] = include_bytes!("../../../testdata/cert.pfx");
    const PFX_LEGACY: &[u8] = include_bytes!("../../../testdata/cert-legacy.pfx");
    const PFX_NOPASS: &[u8] = include_bytes!("../../../testdata/cert-nopass.pfx");
    const EC_PRIVKEY: &str = include_str!("../../../testdata/ec-privkey.pem");
    const DSA_PRIVKEY: &str = include_str!("../../../testdata/dsa-privkey.pem");

    const HELLO: &str = "<root><node>hello world!</node></root>";

    fn enveloped_adapter() -> XmlDsigAdapter {
        let mut adapter = XmlDsigAdapter::new();
        adapter
            .set_private_key(PRIVKEY)
            .set_public_key(PUBKEY)
            .add_transform(algorithm::ENVELOPED_SIGNATURE)
            .add_transform(algorithm::C14N);
        adapter
    }

    fn signed_hello() -> XmlDocument {
        let mut doc = XmlDocument::parse(HELLO).unwrap();
        enveloped_adapter().sign(&mut doc, SignatureTarget::Document, None).unwrap();
        doc
    }

    fn node(doc: &XmlDocument, name: &str) -> ElementRef {
        doc.find_element("", name).unwrap().unwrap()
    }

    fn dsig_text(doc: &XmlDocument, name: &str) -> String {
        let el = doc.find_element(sigill_core::ns::DSIG, name).unwrap().unwrap();
        doc.text_content(el).unwrap()
    }

    fn spki_of_pem(pem: &[u8]) -> Vec<u8> {
        export::public_key_der(&loader::load_pem_auto(pem, None).unwrap()).unwrap()
    }

    /// Flip one base64 character of the first `name` element's text.
    fn tamper(doc: &XmlDocument, name: &str) -> XmlDocument {
        let value = dsig_text(doc, name);
        let first = if value.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{first}{}", &value[1..]);
        XmlDocument::parse(doc.text().replacen(&value, &tampered, 1)).unwrap()
    }

    // ── Round trips ──────────────────────────────────────────────────

    #[test]
    fn sign_then_verify_whole_document() {
        let doc = signed_hello();
        assert!(enveloped_adapter().verify(&doc).unwrap());
    }

    #[test]
    fn modified_content_fails_verification() {
        let doc = signed_hello();
        let modified =
            XmlDocument::parse(doc.text().replace("hello world!", "hello!")).unwrap();
        assert!(!enveloped_adapter().verify(&modified).unwrap());
    }

    #[test]
    fn tampered_signature_value_fails_verification() {
        let doc = signed_hello();
        assert!(!enveloped_adapter().verify(&tamper(&doc, "SignatureValue")).unwrap());
    }

    #[test]
    fn tampered_digest_value_fails_verification() {
        let doc = signed_hello();
        assert!(!enveloped_adapter().verify(&tamper(&doc, "DigestValue")).unwrap());
    }

    #[test]
    fn verify_leaves_document_untouched() {
        let doc = signed_hello();
        let before = doc.text().to_owned();
        enveloped_adapter().verify(&doc).unwrap();
        assert_eq!(doc.text(), before);
    }

    #[test]
    fn wrong_key_fails_verification() {
        let doc = signed_hello();
        let mut other = XmlDsigAdapter::new();
        other.set_private_key(OTHER_PRIVKEY);
        assert!(!other.verify(&doc).unwrap());
    }

    #[test]
    fn exclusive_c14n_with_sha256() {
        let mut adapter = XmlDsigAdapter::new();
        adapter
            .set_private_key_with_algorithm(PRIVKEY, algorithm::RSA_SHA256)
            .set_digest_algorithm(algorithm::SHA256)
            .set_canonical_method(algorithm::EXC_C14N)
            .add_transform(algorithm::ENVELOPED_SIGNATURE)
            .add_transform(algorithm::EXC_C14N);

        let mut doc = XmlDocument::parse(r#"<a:root xmlns:a="urn:a" xmlns:b="urn:b"><b:x>1</b:x></a:root>"#).unwrap();
        adapter.sign(&mut doc, SignatureTarget::Document, None).unwrap();
        assert!(doc.text().contains(algorithm::RSA_SHA256));
        assert!(adapter.verify(&doc).unwrap());
    }

    #[test]
    fn ecdsa_and_dsa_keys() {
        for (pem, method) in [(EC_PRIVKEY, algorithm::ECDSA_SHA256), (DSA_PRIVKEY, algorithm::DSA_SHA1)] {
            let mut signer = XmlDsigAdapter::new();
            signer
                .set_private_key_with_algorithm(pem, method)
                .add_transform(algorithm::ENVELOPED_SIGNATURE);
            let mut doc = XmlDocument::parse(HELLO).unwrap();
            signer.sign(&mut doc, SignatureTarget::Document, None).unwrap();

            let mut verifier = XmlDsigAdapter::new();
            assert!(verifier.verify(&doc).unwrap(), "{method}");
            assert_eq!(verifier.key_algorithm(), method);
        }
    }

    #[test]
    fn transforms_keep_insertion_order() {
        let adapter = enveloped_adapter();
        assert_eq!(adapter.transforms(), [algorithm::ENVELOPED_SIGNATURE, algorithm::C14N]);
        let text = signed_hello().into_string();
        let enveloped = text.find(algorithm::ENVELOPED_SIGNATURE).unwrap();
        let c14n = text.find(&format!("Transform Algorithm=\"{}\"", algorithm::C14N)).unwrap();
        assert!(enveloped < c14n);
    }

    // ── Key algorithm ────────────────────────────────────────────────

    #[test]
    fn key_algorithm_after_certificate() {
        let mut adapter = XmlDsigAdapter::new();
        adapter
            .set_certificate_with_password(PFX, "1234")
            .unwrap()
            .set_key_algorithm(algorithm::RSA_SHA256)
            .unwrap()
            .add_transform(algorithm::ENVELOPED_SIGNATURE);
        assert_eq!(adapter.key_algorithm(), algorithm::RSA_SHA256);

        let mut doc = XmlDocument::parse(HELLO).unwrap();
        adapter.sign(&mut doc, SignatureTarget::Document, None).unwrap();
        assert!(doc.text().contains(&format!("SignatureMethod Algorithm=\"{}\"", algorithm::RSA_SHA256)));
        assert!(XmlDsigAdapter::new().verify(&doc).unwrap());
    }

    #[test]
    fn key_algorithm_must_suit_the_private_key() {
        let mut adapter = XmlDsigAdapter::new();
        adapter.set_certificate_with_password(PFX, "1234").unwrap();
        assert!(matches!(
            adapter.set_key_algorithm(algorithm::ECDSA_SHA256),
            Err(Error::UnsupportedAlgorithm(_))
        ));
        assert_eq!(adapter.key_algorithm(), algorithm::RSA_SHA1);

        assert!(matches!(
            XmlDsigAdapter::new().set_key_algorithm("urn:unknown"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    // ── Element targets ──────────────────────────────────────────────

    #[test]
    fn element_gets_fresh_identifier() {
        let mut doc = XmlDocument::parse(HELLO).unwrap();
        let target = node(&doc, "node");
        enveloped_adapter().sign(&mut doc, target.into(), None).unwrap();

        let id = doc.id_of(target).unwrap().unwrap();
        assert!(id.starts_with("pfx"));
        assert_eq!(doc.text().matches(" Id=\"").count(), 1);
        assert!(doc.text().contains(&format!("URI=\"#{id}\"")));
        assert!(enveloped_adapter().verify(&doc).unwrap());
    }

    #[test]
    fn element_identifier_is_not_overwritten() {
        let mut doc = XmlDocument::parse(r#"<root><node Id="keep">hello</node></root>"#).unwrap();
        let target = node(&doc, "node");
        let adapter = enveloped_adapter();
        adapter.sign(&mut doc, target.into(), None).unwrap();
        adapter.sign(&mut doc, target.into(), None).unwrap();

        assert_eq!(doc.id_of(target).unwrap().as_deref(), Some("keep"));
        assert_eq!(doc.text().matches(r##"URI="#keep""##).count(), 2);
    }

    #[test]
    fn signature_goes_under_document_element() {
        let mut doc = XmlDocument::parse("<root><a><b>deep</b></a></root>").unwrap();
        let target = node(&doc, "b");
        enveloped_adapter().sign(&mut doc, target.into(), None).unwrap();
        let parsed = doc.parse_doc().unwrap();
        let signature = verify::locate_signature(&parsed).unwrap();
        assert_eq!(signature.parent_element().unwrap().tag_name().name(), "root");
    }

    #[test]
    fn explicit_append_target() {
        let mut doc = XmlDocument::parse("<root><data>x</data><sigs/></root>").unwrap();
        let (data, sigs) = (node(&doc, "data"), node(&doc, "sigs"));
        enveloped_adapter().sign(&mut doc, data.into(), Some(sigs)).unwrap();
        let parsed = doc.parse_doc().unwrap();
        let signature = verify::locate_signature(&parsed).unwrap();
        assert_eq!(signature.parent_element().unwrap().tag_name().name(), "sigs");
        assert!(enveloped_adapter().verify(&doc).unwrap());
    }

    #[test]
    fn sibling_signatures_verify_independently() {
        let mut doc = XmlDocument::parse("<root><a>first</a><b>second</b></root>").unwrap();
        let adapter = enveloped_adapter();
        let (a, b) = (node(&doc, "a"), node(&doc, "b"));
        adapter.sign(&mut doc, a.into(), None).unwrap();
        adapter.sign(&mut doc, b.into(), None).unwrap();

        let id_a = doc.id_of(a).unwrap().unwrap();
        let id_b = doc.id_of(b).unwrap().unwrap();
        assert_ne!(id_a, id_b);
        assert_eq!(doc.find_elements(sigill_core::ns::DSIG, "Signature").unwrap().len(), 2);
        assert!(enveloped_adapter().verify_all(&doc).unwrap());

        let modified = XmlDocument::parse(doc.text().replace("second", "2nd")).unwrap();
        assert!(enveloped_adapter().verify(&modified).unwrap());
        assert!(!enveloped_adapter().verify_all(&modified).unwrap());
    }

    #[test]
    fn append_target_before_both_targets() {
        let mut doc = XmlDocument::parse("<root><sigs/><a/><b/></root>").unwrap();
        let adapter = enveloped_adapter();
        let (sigs, a, b) = (node(&doc, "sigs"), node(&doc, "a"), node(&doc, "b"));
        adapter.sign(&mut doc, a.into(), Some(sigs)).unwrap();
        adapter.sign(&mut doc, b.into(), Some(sigs)).unwrap();

        let id_a = doc.id_of(a).unwrap().unwrap();
        let id_b = doc.id_of(b).unwrap().unwrap();
        assert_eq!(doc.id_of(node(&doc, "a")).unwrap(), Some(id_a.clone()));
        assert_eq!(doc.id_of(node(&doc, "b")).unwrap(), Some(id_b.clone()));
        assert!(doc.text().contains(&format!("<ds:Reference URI=\"#{id_a}\">")));
        assert!(doc.text().contains(&format!("<ds:Reference URI=\"#{id_b}\">")));
        assert!(enveloped_adapter().verify_all(&doc).unwrap());
    }

    // ── Errors ───────────────────────────────────────────────────────

    #[test]
    fn sign_without_private_key() {
        let mut doc = XmlDocument::parse(HELLO).unwrap();
        let err = XmlDsigAdapter::new()
            .sign(&mut doc, SignatureTarget::Document, None)
            .unwrap_err();
        assert!(matches!(err, Error::MissingKey(_)));
        assert!(err.to_string().to_lowercase().contains("missing private key"));
        assert_eq!(doc.text(), HELLO);
    }

    #[test]
    fn sign_with_public_key_as_private_key() {
        let mut doc = XmlDocument::parse(HELLO).unwrap();
        let mut adapter = XmlDsigAdapter::new();
        adapter.set_private_key(PUBKEY);
        assert!(matches!(
            adapter.sign(&mut doc, SignatureTarget::Document, None),
            Err(Error::MissingKey(_))
        ));
    }

    #[test]
    fn malformed_private_key_fails_at_sign_time() {
        let mut adapter = XmlDsigAdapter::new();
        adapter.set_private_key("not a key");
        let mut doc = XmlDocument::parse(HELLO).unwrap();
        assert!(matches!(
            adapter.sign(&mut doc, SignatureTarget::Document, None),
            Err(Error::Certificate(_))
        ));
    }

    #[test]
    fn algorithm_must_suit_the_key() {
        let mut adapter = XmlDsigAdapter::new();
        adapter.set_private_key(EC_PRIVKEY);
        let mut doc = XmlDocument::parse(HELLO).unwrap();
        assert!(matches!(
            adapter.sign(&mut doc, SignatureTarget::Document, None),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn verify_unsigned_document() {
        let doc = XmlDocument::parse(HELLO).unwrap();
        assert!(matches!(enveloped_adapter().verify(&doc), Err(Error::SignatureNotFound)));
        assert!(matches!(enveloped_adapter().verify_all(&doc), Err(Error::SignatureNotFound)));
    }

    #[test]
    fn verify_without_any_key() {
        let doc = signed_hello();
        let text = doc.text();
        let start = text.find("<ds:KeyInfo>").unwrap();
        let end = text.find("</ds:KeyInfo>").unwrap() + "</ds:KeyInfo>".len();
        let stripped = XmlDocument::parse(format!("{}{}", &text[..start], &text[end..])).unwrap();

        assert!(matches!(XmlDsigAdapter::new().verify(&stripped), Err(Error::MissingKey(_))));

        let mut external = XmlDsigAdapter::new();
        external.set_public_key(PUBKEY);
        assert!(external.verify(&stripped).unwrap());
    }

    // ── Key resolution ───────────────────────────────────────────────

    #[test]
    fn embedded_key_is_used_and_cached() {
        let doc = signed_hello();
        let mut verifier = XmlDsigAdapter::new();
        assert!(verifier.verify(&doc).unwrap());
        let cached = verifier.public_key(None).unwrap();
        assert_eq!(spki_of_pem(cached.as_bytes()), spki_of_pem(PUBKEY.as_bytes()));
        assert_eq!(verifier.key_algorithm(), algorithm::RSA_SHA1);
    }

    #[test]
    fn configured_key_wins_over_embedded_key() {
        let doc = signed_hello();
        let mut verifier = XmlDsigAdapter::new();
        verifier.set_public_key(CERT_ONLY);
        assert!(verifier.verify(&doc).unwrap());
        assert_eq!(verifier.public_key(None).as_deref(), Some(CERT_ONLY));
    }

    #[test]
    fn public_key_derived_from_private_key() {
        let mut adapter = XmlDsigAdapter::new();
        assert!(adapter.public_key(None).is_none());
        adapter.set_private_key(PRIVKEY);
        assert_eq!(adapter.public_key(None).unwrap().trim(), PUBKEY.trim());
        assert_eq!(adapter.private_key(), Some(PRIVKEY.as_bytes()));
    }

    #[test]
    fn public_key_from_document_takes_precedence() {
        let mut signer = XmlDsigAdapter::new();
        signer
            .set_private_key_with_algorithm(CERT_WITH_KEY, algorithm::RSA_SHA256)
            .add_transform(algorithm::ENVELOPED_SIGNATURE);
        let mut doc = XmlDocument::parse(HELLO).unwrap();
        signer.sign(&mut doc, SignatureTarget::Document, None).unwrap();
        assert!(doc.text().contains("<ds:X509Certificate>"));

        let mut adapter = XmlDsigAdapter::new();
        adapter.set_public_key(PUBKEY);
        let found = adapter.public_key(Some(&doc)).unwrap();
        assert_eq!(found.trim(), CERT_ONLY.trim());
        assert_eq!(adapter.key_algorithm(), algorithm::RSA_SHA256);
        assert_eq!(adapter.public_key(None).unwrap().trim(), CERT_ONLY.trim());
    }

    #[test]
    fn public_key_from_unsigned_document_falls_back() {
        let mut adapter = XmlDsigAdapter::new();
        adapter.set_public_key(PUBKEY);
        let doc = XmlDocument::parse(HELLO).unwrap();
        assert_eq!(adapter.public_key(Some(&doc)).as_deref(), Some(PUBKEY));
    }

    // ── Certificates ─────────────────────────────────────────────────

    #[test]
    fn certificate_from_empty_input() {
        let mut adapter = XmlDsigAdapter::new();
        assert!(matches!(adapter.set_certificate(b""), Err(Error::Certificate(_))));
    }

    #[test]
    fn pkcs12_with_wrong_password() {
        let mut adapter = XmlDsigAdapter::new();
        assert!(matches!(
            adapter.set_certificate_with_password(PFX, "wrong"),
            Err(Error::Certificate(_))
        ));
        assert!(matches!(adapter.set_certificate(PFX), Err(Error::Certificate(_))));
        assert!(adapter.private_key().is_none());
        assert!(adapter.public_key(None).is_none());
    }

    #[test]
    fn failed_certificate_keeps_previous_keys() {
        let mut adapter = XmlDsigAdapter::new();
        adapter.set_private_key(PRIVKEY).set_public_key(PUBKEY);
        assert!(adapter.set_certificate(CERT_ONLY).is_err());
        assert_eq!(adapter.private_key(), Some(PRIVKEY.as_bytes()));
        assert_eq!(adapter.public_key(None).as_deref(), Some(PUBKEY));
    }

    #[test]
    fn pkcs12_with_password() {
        for pfx in [PFX, PFX_LEGACY] {
            let mut adapter = XmlDsigAdapter::new();
            adapter.set_certificate_with_password(pfx, "1234").unwrap();
            assert_eq!(adapter.public_key(None).unwrap().trim(), CERT_ONLY.trim());
            assert_eq!(spki_of_pem(adapter.private_key().unwrap()), spki_of_pem(PUBKEY.as_bytes()));
        }
    }

    #[test]
    fn pkcs12_without_password() {
        let mut adapter = XmlDsigAdapter::new();
        adapter.set_certificate(PFX_NOPASS).unwrap();
        assert!(adapter.private_key().is_some());
    }

    #[test]
    fn pem_certificate_with_plaintext_key() {
        let mut adapter = XmlDsigAdapter::new();
        adapter.set_certificate(CERT_WITH_KEY).unwrap();
        assert_eq!(adapter.public_key(None).unwrap().trim(), CERT_ONLY.trim());
        assert_eq!(spki_of_pem(adapter.private_key().unwrap()), spki_of_pem(PUBKEY.as_bytes()));
        assert_eq!(adapter.key_algorithm(), algorithm::RSA_SHA1);
    }

    #[test]
    fn pem_certificate_with_encrypted_key() {
        let mut adapter = XmlDsigAdapter::new();
        assert!(matches!(adapter.set_certificate(CERT_ENC), Err(Error::Certificate(_))));
        adapter.set_certificate_with_password(CERT_ENC, "1234").unwrap();
        assert_eq!(spki_of_pem(adapter.private_key().unwrap()), spki_of_pem(PUBKEY.as_bytes()));
    }

    #[test]
    fn pem_certificate_without_key() {
        let mut adapter = XmlDsigAdapter::new();
        assert!(matches!(adapter.set_certificate(CERT_ONLY), Err(Error::Certificate(_))));
    }

    #[test]
    fn certificate_signing_embeds_x509() {
        let mut adapter = XmlDsigAdapter::new();
        adapter
            .set_certificate_with_password(PFX, "1234")
            .unwrap()
            .add_transform(algorithm::ENVELOPED_SIGNATURE);
        let mut doc = XmlDocument::parse(HELLO).unwrap();
        adapter.sign(&mut doc, SignatureTarget::Document, None).unwrap();

        let embedded = dsig_text(&doc, "X509Certificate");
        assert_eq!(embedded, export::pem_body_base64(CERT_ONLY));
        assert!(XmlDsigAdapter::new().verify(&doc).unwrap());
    }

    // ── Paths ────────────────────────────────────────────────────────

    fn temp_file(data: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file
    }

    #[test]
    fn key_setters_accept_paths() {
        let private = temp_file(PRIVKEY.as_bytes());
        let public = temp_file(PUBKEY.as_bytes());

        let mut adapter = XmlDsigAdapter::new();
        adapter
            .set_private_key(private.path().to_str().unwrap())
            .set_public_key(public.path().to_str().unwrap())
            .add_transform(algorithm::ENVELOPED_SIGNATURE);
        assert_eq!(adapter.private_key(), Some(PRIVKEY.as_bytes()));

        let mut doc = XmlDocument::parse(HELLO).unwrap();
        adapter.sign(&mut doc, SignatureTarget::Document, None).unwrap();
        assert!(adapter.verify(&doc).unwrap());
    }

    #[test]
    fn explicit_path_and_bytes_setters() {
        let pfx = temp_file(PFX);
        let mut adapter = XmlDsigAdapter::new();
        adapter.set_certificate_from_path(pfx.path(), Some("1234")).unwrap();
        assert!(adapter.private_key().is_some());

        let mut adapter = XmlDsigAdapter::new();
        adapter.set_certificate(pfx.path().to_str().unwrap()).unwrap_err();
        adapter
            .set_certificate_with_password(pfx.path().to_str().unwrap(), "1234")
            .unwrap();

        let mut adapter = XmlDsigAdapter::new();
        adapter
            .set_private_key_from_bytes(PRIVKEY, algorithm::RSA_SHA1)
            .set_public_key_from_bytes(PUBKEY);
        assert_eq!(adapter.public_key(None).as_deref(), Some(PUBKEY));
    }

    #[test]
    fn unreadable_key_file_fails_at_sign_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = XmlDsigAdapter::new();
        adapter.set_private_key_from_path(dir.path().join("missing.pem"), algorithm::RSA_SHA1);
        let mut doc = XmlDocument::parse(HELLO).unwrap();
        assert!(matches!(
            adapter.sign(&mut doc, SignatureTarget::Document, None),
            Err(Error::Certificate(_))
        ));
        assert!(matches!(
            adapter.set_certificate_from_path(dir.path().join("missing.pfx"), None),
            Err(Error::Certificate(_))
        ));
    }

    #[test]
    fn short_path_to_non_key_file_fails_on_use() {
        let junk = temp_file(b"this file holds no key material\n");
        let path = junk.path().to_str().unwrap();
        assert!(path.len() < 1024);

        let mut signer = XmlDsigAdapter::new();
        signer.set_private_key(path);
        let mut doc = XmlDocument::parse(HELLO).unwrap();
        assert!(matches!(
            signer.sign(&mut doc, SignatureTarget::Document, None),
            Err(Error::Certificate(_))
        ));
        assert_eq!(doc.text(), HELLO);

        let mut verifier = XmlDsigAdapter::new();
        verifier.set_public_key(path);
        assert!(matches!(verifier.verify(&signed_hello()), Err(Error::Certificate(_))));
    }
}
