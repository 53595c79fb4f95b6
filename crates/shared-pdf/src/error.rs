use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Page {0} not found")]
    PageNotFound(usize),

    #[error("Invalid PDF structure: {0}")]
    Structure(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),
}
