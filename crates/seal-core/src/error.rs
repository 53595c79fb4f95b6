use thiserror::Error;

#[derive(Error, Debug)]
pub enum SealError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("No text could be extracted from {0}")]
    ExtractionFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<shared_pdf::PdfError> for SealError {
    fn from(err: shared_pdf::PdfError) -> Self {
        use shared_pdf::PdfError;
        match err {
            PdfError::Io(e) => SealError::Io(e),
            PdfError::ParseError(msg) => SealError::Parse(msg),
            other => SealError::Pdf(other.to_string()),
        }
    }
}

impl From<lopdf::Error> for SealError {
    fn from(err: lopdf::Error) -> Self {
        SealError::Pdf(err.to_string())
    }
}

impl From<image::ImageError> for SealError {
    fn from(err: image::ImageError) -> Self {
        SealError::Image(err.to_string())
    }
}
