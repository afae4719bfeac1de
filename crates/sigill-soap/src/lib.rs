#![forbid(unsafe_code)]

//! SOAP message signing for sigill.
//!
//! [`sign_envelope`] signs the payload of a SOAP request (the first element
//! inside `<Body>`) with an [`XmlDsigAdapter`](sigill_dsig::XmlDsigAdapter)
//! and [`SoapClient`] does so for every request it sends through a
//! [`Transport`].

pub mod client;
pub mod envelope;
pub mod error;

pub use client::{SoapClient, SoapVersion, Transport};
pub use envelope::{sign_envelope, verify_envelope};
pub use error::SoapError;
