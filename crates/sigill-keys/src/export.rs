#![forbid(unsafe_code)]

//! PEM/DER export of keys and certificates.

use crate::key::{Key, KeyData};
use pkcs8::{EncodePrivateKey, LineEnding};
use sigill_core::Error;
use spki::EncodePublicKey;

/// PKCS#8 PEM of the private half.
pub fn private_key_to_pem(key: &Key) -> Result<String, Error> {
    let pem = match &key.data {
        KeyData::Rsa { private: Some(k), .. } => k.to_pkcs8_pem(LineEnding::LF),
        KeyData::Dsa { private: Some(k), .. } => k.to_pkcs8_pem(LineEnding::LF),
        KeyData::EcP256 { private: Some(k), .. } => k.to_pkcs8_pem(LineEnding::LF),
        KeyData::EcP384 { private: Some(k), .. } => k.to_pkcs8_pem(LineEnding::LF),
        _ => return Err(Error::missing_private_key()),
    }
    .map_err(|e| Error::Key(format!("failed to encode private key: {e}")))?;
    Ok(pem.to_string())
}

/// `SubjectPublicKeyInfo` DER of the public half.
pub fn public_key_der(key: &Key) -> Result<Vec<u8>, Error> {
    let doc = match &key.data {
        KeyData::Rsa { public, .. } => public.to_public_key_der(),
        KeyData::Dsa { public, .. } => public.to_public_key_der(),
        KeyData::EcP256 { public, .. } => public.to_public_key_der(),
        KeyData::EcP384 { public, .. } => public.to_public_key_der(),
    }
    .map_err(|e| Error::Key(format!("failed to encode public key: {e}")))?;
    Ok(doc.as_bytes().to_vec())
}

/// `PUBLIC KEY` PEM of the public half.
pub fn public_key_to_pem(key: &Key) -> Result<String, Error> {
    let der = public_key_der(key)?;
    pem_rfc7468::encode_string("PUBLIC KEY", LineEnding::LF, &der)
        .map_err(|e| Error::Key(format!("failed to encode public key PEM: {e}")))
}

/// `CERTIFICATE` PEM of a DER certificate.
pub fn certificate_to_pem(cert_der: &[u8]) -> Result<String, Error> {
    pem_rfc7468::encode_string("CERTIFICATE", LineEnding::LF, cert_der)
        .map_err(|e| Error::Key(format!("failed to encode certificate PEM: {e}")))
}

/// The base64 body of the first PEM block, on one line.
///
/// Returns an empty string when `pem` holds no block.
pub fn pem_body_base64(pem: &str) -> String {
    let mut body = String::new();
    let mut inside = false;
    for line in pem.lines().map(str::trim) {
        if line.starts_with("-----BEGIN ") {
            inside = true;
        } else if line.starts_with("-----END ") {
            if inside {
                break;
            }
        } else if inside {
            body.push_str(line);
        }
    }
    body
}
