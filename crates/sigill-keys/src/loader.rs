#![forbid(unsafe_code)]

//! Key loading from PEM, DER, PKCS#8, PKCS#12 and X.509.

use crate::export;
use crate::key::{Key, KeyData};
use sigill_core::Error;

const PEM_BEGIN: &str = "-----BEGIN ";
const PEM_END: &str = "-----END ";
/// RFC 1421 header of OpenSSL's traditional encrypted key format.
const LEGACY_ENCRYPTED: &str = "Proc-Type: 4,ENCRYPTED";

/// One decoded PEM block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    pub label: String,
    pub der: Vec<u8>,
}

/// Whether `data` contains at least one PEM block marker.
pub fn looks_like_pem(data: &[u8]) -> bool {
    data.windows(PEM_BEGIN.len()).any(|w| w == PEM_BEGIN.as_bytes())
}

/// Decode every PEM block in `data`, ignoring text between blocks.
pub fn pem_blocks(data: &[u8]) -> Result<Vec<PemBlock>, Error> {
    let text = std::str::from_utf8(data)
        .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?;

    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(PEM_BEGIN) {
        let block = &rest[start..];
        let end_marker = block
            .find(PEM_END)
            .ok_or_else(|| Error::Key("unterminated PEM block".into()))?;
        let tail = &block[end_marker + PEM_END.len()..];
        let close = tail
            .find("-----")
            .ok_or_else(|| Error::Key("unterminated PEM footer".into()))?;
        let len = end_marker + PEM_END.len() + close + "-----".len();

        if block[..len].contains(LEGACY_ENCRYPTED) {
            return Err(Error::Key(
                "legacy encrypted PEM keys are not supported; convert to PKCS#8".into(),
            ));
        }
        let (label, der) = pem_rfc7468::decode_vec(block[..len].as_bytes())
            .map_err(|e| Error::Key(format!("failed to decode PEM block: {e}")))?;
        blocks.push(PemBlock { label: label.to_owned(), der });
        rest = &block[len..];
    }
    Ok(blocks)
}

/// Load a private key from PKCS#8 `PrivateKeyInfo` DER.
pub fn load_pkcs8_der(der: &[u8]) -> Result<Key, Error> {
    use pkcs8::DecodePrivateKey;

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        return Ok(Key::new(KeyData::rsa_private(pk)));
    }
    if let Ok(sk) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
        return Ok(Key::new(KeyData::p256_private(sk)));
    }
    if let Ok(sk) = p384::ecdsa::SigningKey::from_pkcs8_der(der) {
        return Ok(Key::new(KeyData::p384_private(sk)));
    }
    if let Ok(sk) = dsa::SigningKey::from_pkcs8_der(der) {
        return Ok(Key::new(KeyData::dsa_private(sk)));
    }
    Err(Error::Key(
        "unable to parse PKCS#8 private key (tried RSA, P-256, P-384, DSA)".into(),
    ))
}

/// Load a PKCS#1 `RSAPrivateKey`.
pub fn load_pkcs1_der(der: &[u8]) -> Result<Key, Error> {
    use pkcs1::DecodeRsaPrivateKey;
    let pk = rsa::RsaPrivateKey::from_pkcs1_der(der)
        .map_err(|e| Error::Key(format!("failed to parse PKCS#1 RSA private key: {e}")))?;
    Ok(Key::new(KeyData::rsa_private(pk)))
}

/// Load a SEC1 `ECPrivateKey` on P-256 or P-384.
pub fn load_sec1_der(der: &[u8]) -> Result<Key, Error> {
    if let Ok(sk) = p256::SecretKey::from_sec1_der(der) {
        return Ok(Key::new(KeyData::p256_private(sk.into())));
    }
    let sk = p384::SecretKey::from_sec1_der(der)
        .map_err(|e| Error::Key(format!("failed to parse SEC1 EC private key: {e}")))?;
    Ok(Key::new(KeyData::p384_private(sk.into())))
}

/// Decrypt and load a PKCS#8 `EncryptedPrivateKeyInfo`.
pub fn load_encrypted_pkcs8_der(der: &[u8], password: &str) -> Result<Key, Error> {
    use der::Decode;
    let info = pkcs8::EncryptedPrivateKeyInfo::from_der(der)
        .map_err(|e| Error::Key(format!("failed to parse encrypted private key: {e}")))?;
    let doc = info
        .decrypt(password)
        .map_err(|e| Error::Key(format!("failed to decrypt private key (wrong password?): {e}")))?;
    load_pkcs8_der(doc.as_bytes())
}

/// Load a private key from unencrypted DER, trying PKCS#8, PKCS#1 and SEC1.
pub fn load_private_der(der: &[u8]) -> Result<Key, Error> {
    load_pkcs8_der(der)
        .or_else(|_| load_pkcs1_der(der))
        .or_else(|_| load_sec1_der(der))
        .map_err(|_| Error::Key("unable to parse DER private key".into()))
}

/// Load a public key from `SubjectPublicKeyInfo` DER.
pub fn load_spki_der(der: &[u8]) -> Result<Key, Error> {
    use spki::DecodePublicKey;

    if let Ok(public) = rsa::RsaPublicKey::from_public_key_der(der) {
        return Ok(Key::new(KeyData::Rsa { private: None, public }));
    }
    if let Ok(public) = p256::ecdsa::VerifyingKey::from_public_key_der(der) {
        return Ok(Key::new(KeyData::EcP256 { private: None, public }));
    }
    if let Ok(public) = p384::ecdsa::VerifyingKey::from_public_key_der(der) {
        return Ok(Key::new(KeyData::EcP384 { private: None, public }));
    }
    if let Ok(public) = dsa::VerifyingKey::from_public_key_der(der) {
        return Ok(Key::new(KeyData::Dsa { private: None, public }));
    }
    Err(Error::Key(
        "unsupported public key algorithm in SubjectPublicKeyInfo".into(),
    ))
}

/// Load a PKCS#1 `RSAPublicKey`.
pub fn load_pkcs1_public_der(der: &[u8]) -> Result<Key, Error> {
    use pkcs1::DecodeRsaPublicKey;
    let public = rsa::RsaPublicKey::from_pkcs1_der(der)
        .map_err(|e| Error::Key(format!("failed to parse PKCS#1 RSA public key: {e}")))?;
    Ok(Key::new(KeyData::Rsa { private: None, public }))
}

/// The DER `SubjectPublicKeyInfo` of a certificate.
pub fn certificate_spki_der(cert_der: &[u8]) -> Result<Vec<u8>, Error> {
    use der::{Decode, Encode};
    let cert = x509_cert::Certificate::from_der(cert_der)
        .map_err(|e| Error::Key(format!("failed to parse X.509 certificate: {e}")))?;
    cert.tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Key(format!("failed to encode SubjectPublicKeyInfo: {e}")))
}

/// Load the public key of a DER X.509 certificate. The certificate becomes
/// the key's chain.
pub fn load_x509_cert_der(der: &[u8]) -> Result<Key, Error> {
    let spki = certificate_spki_der(der)?;
    Ok(load_spki_der(&spki)?.with_chain(vec![der.to_vec()]))
}

/// Load the first private key of a PKCS#12 bundle, with its certificates.
pub fn load_pkcs12(data: &[u8], password: &str) -> Result<Key, Error> {
    let contents = sigill_pkcs12::parse_pkcs12(data, password)?;
    let pkcs8 = contents
        .private_keys
        .first()
        .ok_or_else(|| Error::Certificate("PKCS#12 bundle contains no private key".into()))?;
    let key = load_pkcs8_der(pkcs8)?;
    Ok(attach_chain(key, contents.certificates))
}

/// Attach `certs` to `key`, moving the certificate that matches the key to
/// the front.
fn attach_chain(key: Key, mut certs: Vec<Vec<u8>>) -> Key {
    if let Ok(own) = export::public_key_der(&key) {
        if let Some(pos) = certs
            .iter()
            .position(|c| certificate_spki_der(c).is_ok_and(|spki| spki == own))
        {
            let leaf = certs.remove(pos);
            certs.insert(0, leaf);
        } else if !certs.is_empty() {
            tracing::warn!("no certificate matches the private key");
        }
    }
    key.with_chain(certs)
}

/// Load key material from PEM text holding any mix of private key,
/// public key and certificate blocks.
///
/// A private key wins, with the certificates attached. Without one, the
/// first certificate's public key is used, then a bare public key.
/// `ENCRYPTED PRIVATE KEY` blocks need `password`.
pub fn load_pem_auto(data: &[u8], password: Option<&str>) -> Result<Key, Error> {
    let blocks = pem_blocks(data)?;

    let mut private = None;
    let mut public = None;
    let mut certs = Vec::new();
    for block in blocks {
        match block.label.as_str() {
            "CERTIFICATE" => certs.push(block.der),
            label if private.is_none() && label.ends_with("PRIVATE KEY") => {
                private = Some(match label {
                    "PRIVATE KEY" => load_pkcs8_der(&block.der)?,
                    "RSA PRIVATE KEY" => load_pkcs1_der(&block.der)?,
                    "EC PRIVATE KEY" => load_sec1_der(&block.der)?,
                    "ENCRYPTED PRIVATE KEY" => {
                        let password = password.ok_or_else(|| {
                            Error::Key("encrypted private key requires a password".into())
                        })?;
                        load_encrypted_pkcs8_der(&block.der, password)?
                    }
                    other => return Err(Error::Key(format!("unsupported PEM label: {other}"))),
                });
            }
            "PUBLIC KEY" if public.is_none() => public = Some(load_spki_der(&block.der)?),
            "RSA PUBLIC KEY" if public.is_none() => public = Some(load_pkcs1_public_der(&block.der)?),
            other => tracing::trace!(label = other, "skipping PEM block"),
        }
    }

    if let Some(key) = private {
        return Ok(attach_chain(key, certs));
    }
    if let Some(leaf) = certs.first() {
        let key = load_x509_cert_der(leaf)?;
        return Ok(key.with_chain(certs));
    }
    public.ok_or_else(|| Error::Key("no key material found in PEM data".into()))
}

/// Load key material in any supported encoding.
///
/// PEM goes through [`load_pem_auto`]. DER is tried as a private key, a
/// public key, a certificate and finally a PKCS#12 bundle.
pub fn load_auto(data: &[u8], password: Option<&str>) -> Result<Key, Error> {
    if data.is_empty() {
        return Err(Error::Key("empty key material".into()));
    }
    if looks_like_pem(data) {
        return load_pem_auto(data, password);
    }
    load_private_der(data)
        .or_else(|_| load_spki_der(data))
        .or_else(|_| load_x509_cert_der(data))
        .or_else(|_| load_pkcs12(data, password.unwrap_or("")))
        .map_err(|_| Error::Key("unable to detect key format".into()))
}
