#![forbid(unsafe_code)]

//! Transform pipeline for XML-DSig references.
//!
//! A reference is dereferenced into a node set, then each of its
//! transforms runs in order. XML left over at the end is serialized with
//! inclusive C14N 1.0 before digesting.

pub mod base64_transform;
pub mod enveloped;
pub mod pipeline;
pub mod uri;

pub use pipeline::{C14nTransform, Transform, TransformData, TransformPipeline};
pub use uri::dereference;
