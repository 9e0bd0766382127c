use crate::operations::ValidationError;
use crate::parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The password did not match the stored `U` value. The file itself is fine.
    #[error("Authentication failed: the password does not open this document")]
    AuthenticationFailure,

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),
}

impl PdfError {
    /// True when retrying with a different password could succeed.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, PdfError::AuthenticationFailure)
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_pdf_error_display() {
        let error = PdfError::InvalidStructure("Pages node without Kids".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid PDF structure: Pages node without Kids"
        );

        let error = PdfError::UnsupportedFeature("security handler revision 6".to_string());
        assert_eq!(
            error.to_string(),
            "Unsupported feature: security handler revision 6"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let pdf_error: PdfError = io_error.into();
        assert!(matches!(pdf_error, PdfError::Io(_)));
        assert!(pdf_error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_parse_error() {
        let pdf_error: PdfError = ParseError::MissingRoot.into();
        assert!(matches!(pdf_error, PdfError::Parse(ParseError::MissingRoot)));
    }

    #[test]
    fn test_from_validation_error() {
        let pdf_error: PdfError = ValidationError::OutOfRange {
            index: 7,
            page_count: 5,
        }
        .into();
        assert_eq!(
            pdf_error.to_string(),
            "Validation error: Page 7 is out of range (valid pages: 1..=5)"
        );
    }

    #[test]
    fn test_authentication_failure_is_distinct() {
        assert!(PdfError::AuthenticationFailure.is_authentication_failure());
        assert!(!PdfError::Parse(ParseError::MissingRoot).is_authentication_failure());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfError>();
    }
}
