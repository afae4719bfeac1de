#![forbid(unsafe_code)]

//! XML document abstraction for sigill.
//!
//! `roxmltree` trees are read-only, so an [`XmlDocument`] owns the XML text
//! and edits it by splicing at the byte ranges roxmltree reports. Elements
//! are addressed with [`ElementRef`], a document-order index stamped with the
//! document's edit count. The document logs how each edit moved element
//! positions, so a handle taken before an edit keeps pointing at its element.

pub mod document;
pub mod nodeset;
pub mod uri;
pub mod writer;

pub use document::{ElementRef, XmlDocument};
pub use nodeset::NodeSet;
pub use uri::SameDocumentRef;
pub use writer::XmlWriter;

/// Return roxmltree parsing options that allow DTD.
///
/// roxmltree never resolves external entities, so accepting an internal
/// subset is safe.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

/// Parse XML text with [`parsing_options`].
pub fn parse(text: &str) -> Result<roxmltree::Document<'_>, sigill_core::Error> {
    roxmltree::Document::parse_with_options(text, parsing_options())
        .map_err(|e| sigill_core::Error::XmlParse(e.to_string()))
}
