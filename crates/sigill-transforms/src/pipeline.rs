#![forbid(unsafe_code)]

//! Transform pipeline and trait definitions.

use crate::base64_transform::Base64DecodeTransform;
use crate::enveloped::EnvelopedSignatureTransform;
use sigill_c14n::C14nMode;
use sigill_core::{algorithm, Error};
use sigill_xml::{ElementRef, NodeSet};

/// Data flowing through the transform pipeline.
#[derive(Debug, Clone)]
pub enum TransformData {
    /// A node set over `xml_text`. `None` selects the whole document.
    Xml {
        xml_text: String,
        node_set: Option<NodeSet>,
    },
    /// Octets.
    Binary(Vec<u8>),
}

impl TransformData {
    /// Convert to octets, serializing XML with inclusive C14N 1.0 without comments.
    pub fn into_binary(self) -> Result<Vec<u8>, Error> {
        match self {
            TransformData::Binary(data) => Ok(data),
            TransformData::Xml { xml_text, node_set } => {
                sigill_c14n::canonicalize(&xml_text, C14nMode::Inclusive, node_set.as_ref(), &[])
            }
        }
    }
}

/// A single transform step.
pub trait Transform: Send {
    /// The algorithm URI for this transform.
    fn uri(&self) -> &str;

    fn execute(&self, input: TransformData) -> Result<TransformData, Error>;
}

/// Build the transform named by `uri`.
///
/// `signature` is the enclosing `<Signature>`, needed by the enveloped
/// transform. `inclusive_prefixes` is the exclusive C14N PrefixList.
pub fn from_uri(
    uri: &str,
    signature: Option<ElementRef>,
    inclusive_prefixes: Vec<String>,
) -> Result<Box<dyn Transform>, Error> {
    if uri == algorithm::ENVELOPED_SIGNATURE {
        let signature = signature.ok_or_else(|| {
            Error::Transform("enveloped-signature transform needs its Signature element".into())
        })?;
        return Ok(Box::new(EnvelopedSignatureTransform::new(signature)));
    }
    if uri == algorithm::BASE64 {
        return Ok(Box::new(Base64DecodeTransform));
    }
    if let Some(mode) = C14nMode::from_uri(uri) {
        return Ok(Box::new(C14nTransform::new(mode, inclusive_prefixes)));
    }
    Err(Error::UnsupportedAlgorithm(format!("transform: {uri}")))
}

/// A sequence of transforms run in order.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pipeline from transform URIs, in order.
    pub fn from_uris<S: AsRef<str>>(uris: &[S], signature: Option<ElementRef>) -> Result<Self, Error> {
        let mut pipeline = Self::new();
        for uri in uris {
            pipeline.push(from_uri(uri.as_ref(), signature, Vec::new())?);
        }
        Ok(pipeline)
    }

    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    pub fn execute(&self, input: TransformData) -> Result<TransformData, Error> {
        let mut data = input;
        for transform in &self.transforms {
            tracing::trace!(uri = transform.uri(), "applying transform");
            data = transform.execute(data)?;
        }
        Ok(data)
    }

    /// Run the pipeline and serialize the result to octets.
    pub fn execute_to_binary(&self, input: TransformData) -> Result<Vec<u8>, Error> {
        self.execute(input)?.into_binary()
    }

    pub fn uris(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.uri()).collect()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

// ── C14N Transform ───────────────────────────────────────────────────

/// A canonicalization transform.
pub struct C14nTransform {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl C14nTransform {
    pub fn new(mode: C14nMode, inclusive_prefixes: Vec<String>) -> Self {
        Self { mode, inclusive_prefixes }
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn execute(&self, input: TransformData) -> Result<TransformData, Error> {
        let bytes = match input {
            TransformData::Xml { xml_text, node_set } => sigill_c14n::canonicalize(
                &xml_text,
                self.mode,
                node_set.as_ref(),
                &self.inclusive_prefixes,
            )?,
            TransformData::Binary(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?;
                sigill_c14n::canonicalize(text, self.mode, None, &self.inclusive_prefixes)?
            }
        };
        Ok(TransformData::Binary(bytes))
    }
}
