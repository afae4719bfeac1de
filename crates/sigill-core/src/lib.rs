#![forbid(unsafe_code)]

//! Core types shared by every sigill crate: the error taxonomy, algorithm
//! identifiers and XML-DSig vocabulary.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result, MISSING_PRIVATE_KEY};
