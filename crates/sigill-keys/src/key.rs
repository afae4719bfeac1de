#![forbid(unsafe_code)]

//! Key types.

use sigill_core::algorithm;
use sigill_crypto::SigningKey;

/// Asymmetric key material. The public half is always present.
#[derive(Clone)]
pub enum KeyData {
    Rsa {
        private: Option<rsa::RsaPrivateKey>,
        public: rsa::RsaPublicKey,
    },
    Dsa {
        private: Option<dsa::SigningKey>,
        public: dsa::VerifyingKey,
    },
    EcP256 {
        private: Option<p256::ecdsa::SigningKey>,
        public: p256::ecdsa::VerifyingKey,
    },
    EcP384 {
        private: Option<p384::ecdsa::SigningKey>,
        public: p384::ecdsa::VerifyingKey,
    },
}

impl KeyData {
    pub fn rsa_private(private: rsa::RsaPrivateKey) -> Self {
        let public = private.to_public_key();
        Self::Rsa { private: Some(private), public }
    }

    pub fn dsa_private(private: dsa::SigningKey) -> Self {
        let public = private.verifying_key().clone();
        Self::Dsa { private: Some(private), public }
    }

    pub fn p256_private(private: p256::ecdsa::SigningKey) -> Self {
        let public = *private.verifying_key();
        Self::EcP256 { private: Some(private), public }
    }

    pub fn p384_private(private: p384::ecdsa::SigningKey) -> Self {
        let public = *private.verifying_key();
        Self::EcP384 { private: Some(private), public }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Rsa { .. } => "RSA",
            Self::Dsa { .. } => "DSA",
            Self::EcP256 { .. } => "EC P-256",
            Self::EcP384 { .. } => "EC P-384",
        }
    }

    fn has_private(&self) -> bool {
        match self {
            Self::Rsa { private, .. } => private.is_some(),
            Self::Dsa { private, .. } => private.is_some(),
            Self::EcP256 { private, .. } => private.is_some(),
            Self::EcP384 { private, .. } => private.is_some(),
        }
    }
}

impl std::fmt::Debug for KeyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_private() {
            write!(f, "{} private+public key", self.kind())
        } else {
            write!(f, "{} public key", self.kind())
        }
    }
}

/// A key together with the certificates it was loaded with.
#[derive(Debug, Clone)]
pub struct Key {
    pub data: KeyData,
    /// DER-encoded X.509 certificates, leaf first when known.
    pub x509_chain: Vec<Vec<u8>>,
}

impl Key {
    pub fn new(data: KeyData) -> Self {
        Self { data, x509_chain: Vec::new() }
    }

    pub fn with_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.x509_chain = chain;
        self
    }

    pub fn has_private(&self) -> bool {
        self.data.has_private()
    }

    /// The leaf certificate, if the key came with one.
    pub fn certificate(&self) -> Option<&[u8]> {
        self.x509_chain.first().map(Vec::as_slice)
    }

    /// The private half, ready for signing.
    pub fn to_signing_key(&self) -> Option<SigningKey> {
        match &self.data {
            KeyData::Rsa { private: Some(k), .. } => Some(SigningKey::Rsa(k.clone())),
            KeyData::Dsa { private: Some(k), .. } => Some(SigningKey::Dsa(k.clone())),
            KeyData::EcP256 { private: Some(k), .. } => Some(SigningKey::EcP256(k.clone())),
            KeyData::EcP384 { private: Some(k), .. } => Some(SigningKey::EcP384(k.clone())),
            _ => None,
        }
    }

    /// The public half, ready for verification.
    pub fn to_verifying_key(&self) -> SigningKey {
        match &self.data {
            KeyData::Rsa { public, .. } => SigningKey::RsaPublic(public.clone()),
            KeyData::Dsa { public, .. } => SigningKey::DsaPublic(public.clone()),
            KeyData::EcP256 { public, .. } => SigningKey::EcP256Public(*public),
            KeyData::EcP384 { public, .. } => SigningKey::EcP384Public(*public),
        }
    }

    /// A copy without the private half. Certificates are kept.
    pub fn public_only(&self) -> Key {
        let data = match &self.data {
            KeyData::Rsa { public, .. } => KeyData::Rsa { private: None, public: public.clone() },
            KeyData::Dsa { public, .. } => KeyData::Dsa { private: None, public: public.clone() },
            KeyData::EcP256 { public, .. } => KeyData::EcP256 { private: None, public: *public },
            KeyData::EcP384 { public, .. } => KeyData::EcP384 { private: None, public: *public },
        };
        Key { data, x509_chain: self.x509_chain.clone() }
    }

    /// Default signature method for this key type.
    pub fn algorithm_uri(&self) -> &'static str {
        match &self.data {
            KeyData::Rsa { .. } => algorithm::RSA_SHA1,
            KeyData::Dsa { .. } => algorithm::DSA_SHA1,
            KeyData::EcP256 { .. } => algorithm::ECDSA_SHA256,
            KeyData::EcP384 { .. } => algorithm::ECDSA_SHA384,
        }
    }

    /// Whether `uri` names a signature method this key can be used with.
    pub fn supports_algorithm(&self, uri: &str) -> bool {
        let family = match &self.data {
            KeyData::Rsa { .. } => "rsa-",
            KeyData::Dsa { .. } => "dsa-",
            KeyData::EcP256 { .. } | KeyData::EcP384 { .. } => "ecdsa-",
        };
        uri.rsplit_once('#').is_some_and(|(_, name)| name.starts_with(family))
    }
}
