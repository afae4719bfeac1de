#![forbid(unsafe_code)]

/// Message carried by [`Error::MissingKey`] when signing without a private key.
pub const MISSING_PRIVATE_KEY: &str =
    "Missing private key. Use set_private_key or set_certificate to set one.";

/// Errors produced by the sigill XML signature library.
///
/// The first three variants are the caller-facing precondition failures.
/// Everything else is raised by the signature engine itself (see
/// [`Error::is_engine`]). A signature that is well formed but does not verify
/// is never an error: verification reports it as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    MissingKey(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("Signature DOM element not found.")]
    SignatureNotFound,

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),
}

impl Error {
    /// The standard "no private key configured" error.
    pub fn missing_private_key() -> Self {
        Self::MissingKey(MISSING_PRIVATE_KEY.to_owned())
    }

    /// True for failures of canonicalization, digesting, signing or XML
    /// processing, as opposed to missing keys, bad key material or an
    /// absent signature.
    pub fn is_engine(&self) -> bool {
        !matches!(
            self,
            Self::MissingKey(_) | Self::Certificate(_) | Self::SignatureNotFound
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
