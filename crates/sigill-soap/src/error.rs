#![forbid(unsafe_code)]

/// Errors from SOAP envelope handling.
#[derive(Debug, thiserror::Error)]
pub enum SoapError {
    #[error(transparent)]
    Dsig(#[from] sigill_core::Error),

    #[error("SOAP envelope has no Body element")]
    MissingBody,

    #[error("SOAP Body has no element content")]
    EmptyBody,

    #[error("transport error: {0}")]
    Transport(String),
}
