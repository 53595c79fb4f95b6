//! Shared PDF handling utilities
//!
//! This crate provides the lopdf access layer used by the seal pipeline:
//! document loading and page geometry, coordinate transformation between
//! PDF user space and top-left page space, and text layout extraction.

pub mod coords;
pub mod error;
pub mod layout;
pub mod parser;

#[cfg(test)]
pub(crate) mod testing;

pub use coords::{pdf_to_top_left, top_left_to_pdf, MediaBox};
pub use error::PdfError;
pub use layout::{extract_layout, extract_layout_from_document, try_extract_layout};
pub use parser::PdfDocument;
