#![forbid(unsafe_code)]

//! Key management for sigill.
//!
//! Loads private keys, public keys and certificates from PEM, DER and
//! PKCS#12, exports them back to PEM, and reads and writes `<ds:KeyInfo>`.

pub mod export;
pub mod key;
pub mod keyinfo;
pub mod loader;

pub use key::{Key, KeyData};
