#![forbid(unsafe_code)]

//! Reference digests, shared by signing and verification.

use sigill_core::Error;
use sigill_transforms::{dereference, TransformPipeline};
use sigill_xml::XmlDocument;

/// Dereference `uri`, run it through `pipeline` and digest the octets.
pub(crate) fn compute_digest(
    doc: &XmlDocument,
    uri: &str,
    pipeline: &TransformPipeline,
    digest_method: &str,
) -> Result<Vec<u8>, Error> {
    let input = dereference(doc, uri)?;
    let octets = pipeline.execute_to_binary(input)?;
    tracing::trace!(uri, len = octets.len(), "pre-digest data");
    sigill_crypto::digest::digest(digest_method, &octets)
}
