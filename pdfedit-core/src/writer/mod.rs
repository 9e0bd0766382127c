//! PDF serialization
//!
//! [`PdfWriter`] emits the objects of a [`crate::Document`] reachable from its
//! trailer, followed by a classic cross-reference table or, with
//! [`WriterConfig::use_xref_streams`], a PDF 1.5 cross-reference stream.

mod pdf_writer;
mod xref_stream_writer;

pub use pdf_writer::{PdfWriter, WriterConfig};
pub use xref_stream_writer::XRefStreamWriter;
