#![forbid(unsafe_code)]

//! PKCS#12 (.p12/.pfx) reader.
//!
//! Handles the legacy pbeWithSHAAnd3-KeyTripleDES-CBC scheme and PBES2
//! (PBKDF2 with AES-CBC), which covers the bundles produced by OpenSSL 1.x
//! and 3.x as well as most Windows exports.

mod kdf;
mod parse;

/// Contents extracted from a PKCS#12 file.
#[derive(Debug, Default)]
pub struct Pkcs12Contents {
    /// PKCS#8 DER-encoded private keys, in bag order.
    pub private_keys: Vec<Vec<u8>>,
    /// DER-encoded X.509 certificates, in bag order.
    pub certificates: Vec<Vec<u8>>,
}

/// Parse a PKCS#12 file, decrypting with the given password.
///
/// A MAC mismatch is reported as a wrong password.
pub fn parse_pkcs12(data: &[u8], password: &str) -> Result<Pkcs12Contents, sigill_core::Error> {
    parse::parse_pfx(data, password)
}
