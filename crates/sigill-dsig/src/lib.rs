#![forbid(unsafe_code)]

//! XML-DSig signing and verification for sigill.
//!
//! [`XmlDsigAdapter`] is the entry point: configure key material and
//! algorithms, then [`sign`](XmlDsigAdapter::sign) a document or element
//! and [`verify`](XmlDsigAdapter::verify) it later. Verification answers
//! `Ok(false)` for signatures that do not match and reserves errors for
//! input that cannot be checked at all.

pub mod adapter;
pub mod config;
mod material;
mod reference;
pub mod sign;
pub mod verify;

pub use adapter::XmlDsigAdapter;
pub use config::AdapterConfig;
pub use sign::SignatureTarget;
pub use verify::{locate_key, locate_signature, EmbeddedKey, VerifyResult};
