#![forbid(unsafe_code)]

//! Reference digest methods.

use digest::Digest;
use sigill_core::{algorithm, Error};

/// A `DigestMethod` supported for references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestMethod {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestMethod {
    pub fn uri(self) -> &'static str {
        match self {
            Self::Sha1 => algorithm::SHA1,
            Self::Sha224 => algorithm::SHA224,
            Self::Sha256 => algorithm::SHA256,
            Self::Sha384 => algorithm::SHA384,
            Self::Sha512 => algorithm::SHA512,
        }
    }

    /// Length of the digest value in bytes.
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => sha1::Sha1::digest(data).to_vec(),
            Self::Sha224 => sha2::Sha224::digest(data).to_vec(),
            Self::Sha256 => sha2::Sha256::digest(data).to_vec(),
            Self::Sha384 => sha2::Sha384::digest(data).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }
}

/// Look up a digest method by its algorithm URI.
pub fn from_uri(uri: &str) -> Result<DigestMethod, Error> {
    [
        DigestMethod::Sha1,
        DigestMethod::Sha224,
        DigestMethod::Sha256,
        DigestMethod::Sha384,
        DigestMethod::Sha512,
    ]
    .into_iter()
    .find(|m| m.uri() == uri)
    .ok_or_else(|| Error::UnsupportedAlgorithm(format!("digest algorithm: {uri}")))
}

/// Digest `data` with the method named by `uri`.
pub fn digest(uri: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
    Ok(from_uri(uri)?.digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_answers() {
        assert_eq!(
            hex::encode(digest(algorithm::SHA1, b"hello").unwrap()),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
        assert_eq!(
            hex::encode(digest(algorithm::SHA256, b"hello").unwrap()),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn output_lengths_match() {
        for uri in [algorithm::SHA224, algorithm::SHA384, algorithm::SHA512] {
            let method = from_uri(uri).unwrap();
            assert_eq!(method.uri(), uri);
            assert_eq!(method.digest(b"").len(), method.output_len());
        }
    }

    #[test]
    fn unknown_uri() {
        assert!(matches!(
            from_uri("http://www.w3.org/2001/04/xmldsig-more#md5"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
