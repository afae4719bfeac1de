#![forbid(unsafe_code)]

pub use sigill_core as core;
pub use sigill_xml as xml;
pub use sigill_c14n as c14n;
pub use sigill_crypto as crypto;
pub use sigill_pkcs12 as pkcs12;
pub use sigill_keys as keys;
pub use sigill_transforms as transforms;
pub use sigill_dsig as dsig;
pub use sigill_soap as soap;

pub use sigill_dsig::{AdapterConfig, SignatureTarget, XmlDsigAdapter};
