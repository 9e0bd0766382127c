//! # pdfedit
//!
//! A pure Rust PDF engine for editing existing documents: page merging,
//! splitting, extraction and rotation, standard-handler encryption, and
//! JPEG recompression of embedded images.
//!
//! ## Quick Start
//!
//! The [`api`] module works on byte buffers:
//!
//! ```rust,no_run
//! # fn main() -> pdfedit::Result<()> {
//! let a = std::fs::read("a.pdf")?;
//! let b = std::fs::read("b.pdf")?;
//!
//! let merged = pdfedit::api::merge(&a, &b)?;
//! let rotated = pdfedit::api::rotate(&merged, 90)?;
//! let locked = pdfedit::api::encrypt(&rotated, "secret")?;
//! std::fs::write("out.pdf", locked)?;
//! # Ok(())
//! # }
//! ```
//!
//! For several operations on one document, parse once into a [`Document`]
//! and use the functions in [`operations`], [`encryption`] and [`images`]:
//!
//! ```rust,no_run
//! use pdfedit::{operations, Document, PageRange};
//!
//! # fn main() -> pdfedit::Result<()> {
//! let mut doc = Document::parse(&std::fs::read("input.pdf")?)?;
//! operations::rotate_pages(&mut doc, &PageRange::List(vec![1, 3]), 180)?;
//! operations::delete_pages(&mut doc, &PageRange::Single(2))?;
//! doc.save("output.pdf")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`objects`] - The PDF object model
//! - [`parser`] - Lexer, object grammar, cross-reference and stream filters
//! - [`recovery`] - Rebuilding the cross-reference index of damaged files
//! - [`document`] - Lazily resolved object arena and the page tree
//! - [`operations`] - Page-level merge, split, extract, rotate and delete
//! - [`encryption`] - Standard security handler (RC4 and AES-128)
//! - [`images`] - Image detection and JPEG recompression
//! - [`writer`] - Serialization with an xref table or xref stream
//! - [`api`] - One-call byte-level entry points

pub mod api;
pub mod compression;
pub mod document;
pub mod encryption;
pub mod error;
pub mod images;
pub mod objects;
pub mod operations;
pub mod parser;
pub mod recovery;
pub mod writer;

pub use document::{Document, PageInfo};
pub use encryption::{EncryptionAlgorithm, EncryptionOptions, Permissions};
pub use error::{PdfError, Result};
pub use images::{RecompressOptions, RecompressReport};
pub use objects::{Dictionary, Object, ObjectId, Stream};
pub use operations::{PageRange, ValidationError};
pub use parser::{ParseOptions, PdfVersion};
pub use writer::WriterConfig;

/// Current version of pdfedit
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
