#![forbid(unsafe_code)]

//! Cryptographic algorithm implementations for sigill.
//!
//! Provides the digest and signature primitives XML-DSig needs, looked up
//! by their algorithm URI.

pub mod digest;
pub mod sign;

pub use digest::DigestMethod;
pub use sign::{SignatureAlgorithm, SigningKey};
