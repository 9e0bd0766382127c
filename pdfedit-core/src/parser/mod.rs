//! PDF Parser Module
//!
//! Turns a byte buffer into tokens, objects and a cross-reference index.
//! Object bodies are materialised lazily by [`crate::document::Document`];
//! this module only provides the building blocks: the [`lexer`], the object
//! grammar in [`objects`], the cross-reference readers in [`xref`] and
//! [`xref_stream`], the [`trailer`] view, stream [`filters`] and
//! [`object_stream`] support for compressed objects.

pub mod filters;
pub mod header;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod trailer;
pub mod xref;
pub mod xref_stream;

use crate::objects::ObjectId;

pub use self::header::PdfVersion;
pub use self::lexer::{Lexer, Token};
pub use self::trailer::Trailer;
pub use self::xref::{XRefEntry, XRefTable};

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF Parser errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The buffer ended before a complete construct could be read.
    #[error("Truncated input: {context}")]
    Truncated { context: String },

    #[error("Malformed object at byte {offset}: {message}")]
    MalformedObject { offset: usize, message: String },

    /// No catalog could be located, even after a recovery scan.
    #[error("Document catalog (Root) could not be located")]
    MissingRoot,

    #[error("Invalid PDF header")]
    InvalidHeader,

    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Invalid object reference: {0} {1} R")]
    InvalidReference(u32, u16),

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Invalid xref table: {0}")]
    InvalidXRef(String),

    #[error("Circular reference detected at {0}")]
    CircularReference(ObjectId),

    #[error("Stream decode error: {0}")]
    StreamDecodeError(String),
}

impl ParseError {
    pub(crate) fn malformed(offset: usize, message: impl Into<String>) -> Self {
        ParseError::MalformedObject {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn truncated(context: impl Into<String>) -> Self {
        ParseError::Truncated {
            context: context.into(),
        }
    }
}

/// Parser tuning knobs.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Reject files a tolerant reader would accept (missing header, bad `/Length`).
    pub strict_mode: bool,
    /// Recover a wrong `/Length` by searching for `endstream`.
    pub lenient_streams: bool,
    /// How far past the declared length the `endstream` search may look.
    pub max_recovery_bytes: usize,
    /// Upper bound on the full-file `N G obj` scan used when the xref is unusable.
    pub max_scan_bytes: usize,
    /// Maximum array/dictionary nesting.
    pub max_nesting_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            lenient_streams: true,
            max_recovery_bytes: 1024 * 1024,
            max_scan_bytes: 256 * 1024 * 1024,
            max_nesting_depth: 256,
        }
    }
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self {
            strict_mode: true,
            lenient_streams: false,
            ..Self::default()
        }
    }

    pub fn tolerant() -> Self {
        Self {
            strict_mode: false,
            lenient_streams: true,
            max_recovery_bytes: 8 * 1024 * 1024,
            ..Self::default()
        }
    }
}
