#![forbid(unsafe_code)]

//! Key and certificate material held by the adapter.

use sigill_core::Error;
use sigill_keys::{export, loader, Key};
use std::path::Path;

/// Inputs at least this long are never treated as file names.
const MAX_PATH_LEN: usize = 1024;

/// Material as configured on an adapter. Raw bytes are only parsed when a
/// signing or verification operation needs the key.
#[derive(Clone)]
pub(crate) enum Material {
    Raw(Vec<u8>),
    /// Parsed material together with its PEM form.
    Loaded { pem: String, key: Key },
    /// A file that could not be read. Reported on first use.
    Unreadable(String),
}

impl Material {
    /// Read `input` from disk if it is short and names an existing file,
    /// otherwise keep it as key bytes.
    pub(crate) fn from_input(input: &[u8]) -> Self {
        match path_candidate(input) {
            Some(path) => Self::from_path(path),
            None => Self::Raw(input.to_vec()),
        }
    }

    pub(crate) fn from_path(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(data) => {
                tracing::debug!(path = %path.display(), "read key material from file");
                Self::Raw(data)
            }
            Err(e) => Self::Unreadable(format!("cannot read {}: {e}", path.display())),
        }
    }

    /// Public material for `key`, rendered as certificate PEM when the key
    /// came with one and as `PUBLIC KEY` PEM otherwise.
    pub(crate) fn public(key: &Key) -> Result<Self, Error> {
        let key = key.public_only();
        let pem = public_pem(&key)?;
        Ok(Self::Loaded { pem, key })
    }

    pub(crate) fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Raw(data) => Some(data),
            Self::Loaded { pem, .. } => Some(pem.as_bytes()),
            Self::Unreadable(_) => None,
        }
    }

    pub(crate) fn key(&self) -> Result<Key, Error> {
        match self {
            Self::Raw(data) => loader::load_auto(data, None).map_err(certificate_error),
            Self::Loaded { key, .. } => Ok(key.clone()),
            Self::Unreadable(reason) => Err(Error::Certificate(reason.clone())),
        }
    }

    /// The material as public PEM text, if it is usable as such.
    pub(crate) fn public_pem(&self) -> Option<String> {
        match self {
            Self::Loaded { pem, .. } => Some(pem.clone()),
            Self::Raw(data) if loader::looks_like_pem(data) => {
                String::from_utf8(data.clone()).ok()
            }
            Self::Raw(_) => self.key().ok().and_then(|key| public_pem(&key).ok()),
            Self::Unreadable(_) => None,
        }
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw(data) => write!(f, "Raw({} bytes)", data.len()),
            Self::Loaded { key, .. } => write!(f, "Loaded({:?})", key.data),
            Self::Unreadable(reason) => write!(f, "Unreadable({reason})"),
        }
    }
}

/// Certificate PEM for a key with certificates, `PUBLIC KEY` PEM otherwise.
pub(crate) fn public_pem(key: &Key) -> Result<String, Error> {
    match key.certificate() {
        Some(cert) => export::certificate_to_pem(cert),
        None => export::public_key_to_pem(key),
    }
}

/// Report any failure to load key material as a certificate error.
pub(crate) fn certificate_error(err: Error) -> Error {
    match err {
        Error::Certificate(_) => err,
        other => Error::Certificate(other.to_string()),
    }
}

fn path_candidate(input: &[u8]) -> Option<&Path> {
    if input.is_empty() || input.len() >= MAX_PATH_LEN {
        return None;
    }
    let path = Path::new(std::str::from_utf8(input).ok()?);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PUBKEY: &str = include_str!("../../../testdata/pubkey.pem");

    #[test]
    fn short_existing_path_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PUBKEY.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap();

        let material = Material::from_input(path.as_bytes());
        assert_eq!(material.bytes(), Some(PUBKEY.as_bytes()));
    }

    #[test]
    fn pem_text_is_kept_as_bytes() {
        let material = Material::from_input(PUBKEY.as_bytes());
        assert_eq!(material.bytes(), Some(PUBKEY.as_bytes()));
        assert_eq!(material.public_pem().as_deref(), Some(PUBKEY));
    }

    #[test]
    fn missing_file_is_not_a_path() {
        let material = Material::from_input(b"/no/such/dir/key.pem");
        assert!(matches!(material, Material::Raw(_)));
        assert!(matches!(material.key(), Err(Error::Certificate(_))));
    }

    #[test]
    fn unreadable_file_fails_on_use() {
        let dir = tempfile::tempdir().unwrap();
        let material = Material::from_path(&dir.path().join("absent.pem"));
        assert!(material.bytes().is_none());
        let err = material.key().unwrap_err();
        assert!(matches!(err, Error::Certificate(ref m) if m.contains("absent.pem")));
    }
}
