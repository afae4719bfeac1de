#![forbid(unsafe_code)]

//! Serde-loadable adapter configuration.

use crate::adapter::XmlDsigAdapter;
use serde::{Deserialize, Serialize};
use sigill_core::{algorithm, Error};
use std::path::PathBuf;

/// Configuration for an [`XmlDsigAdapter`].
///
/// Every field is optional in serialized form. Paths are read when the
/// adapter is built, except that key files are only parsed on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Signature method used with `private_key`.
    pub key_algorithm: String,
    pub digest_algorithm: String,
    pub canonical_method: String,
    pub transforms: Vec<String>,
    pub private_key: Option<PathBuf>,
    pub public_key: Option<PathBuf>,
    /// PEM certificate with its key, or a PKCS#12 bundle.
    pub certificate: Option<PathBuf>,
    pub password: Option<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            key_algorithm: algorithm::RSA_SHA1.to_owned(),
            digest_algorithm: algorithm::SHA1.to_owned(),
            canonical_method: algorithm::C14N.to_owned(),
            transforms: Vec::new(),
            private_key: None,
            public_key: None,
            certificate: None,
            password: None,
        }
    }
}

impl AdapterConfig {
    /// Build the adapter. The certificate is loaded first, so explicit
    /// `private_key` and `public_key` paths override what it provides.
    /// A non-default `key_algorithm` applies to the certificate's key too.
    pub fn into_adapter(self) -> Result<XmlDsigAdapter, Error> {
        let mut adapter = XmlDsigAdapter::new();
        adapter
            .set_digest_algorithm(&self.digest_algorithm)
            .set_canonical_method(&self.canonical_method);
        for transform in &self.transforms {
            adapter.add_transform(transform);
        }
        if let Some(path) = &self.certificate {
            adapter.set_certificate_from_path(path, self.password.as_deref())?;
            if self.key_algorithm != algorithm::RSA_SHA1 {
                adapter.set_key_algorithm(&self.key_algorithm)?;
            }
        }
        if let Some(path) = &self.private_key {
            adapter.set_private_key_from_path(path, &self.key_algorithm);
        }
        if let Some(path) = &self.public_key {
            adapter.set_public_key_from_path(path);
        }
        Ok(adapter)
    }
}
