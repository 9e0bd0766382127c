//! PDF operations module
//!
//! Page-level operations over the canonical page order of a [`Document`]:
//! merging, splitting, extracting, rotating and deleting pages. Page numbers
//! are 1-based everywhere in this module.
//!
//! Operations that build new documents (merge, split, extract) copy pages with
//! [`Document::import_pages`], so their inputs are never modified.

pub mod delete;
pub mod merge;
pub mod page_extraction;
pub mod rotate;
pub mod split;

pub use delete::delete_pages;
pub use merge::{merge, merge_documents};
pub use page_extraction::extract_pages;
pub use rotate::{rotate, rotate_pages};
pub use split::split_at;

use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::objects::ObjectId;

/// Result type for page selection
pub type OperationResult<T> = std::result::Result<T, ValidationError>;

/// Caller input errors. Each carries what the caller needs to re-prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Page {index} is out of range (valid pages: 1..={page_count})")]
    OutOfRange { index: usize, page_count: usize },

    #[error("No valid pages selected (valid pages: 1..={page_count})")]
    NoValidPages { page_count: usize },

    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),
}

/// Page range specification, 1-based
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRange {
    /// All pages
    All,
    /// Single page
    Single(usize),
    /// Range of pages (inclusive)
    Range(usize, usize),
    /// List of specific pages, in the order given
    List(Vec<usize>),
}

impl PageRange {
    /// Parse a page range from a string
    ///
    /// Examples:
    /// - "all" -> All pages
    /// - "3" -> Single page
    /// - "2-5" -> Range of pages
    /// - "1,3,5-7" -> List of pages 1, 3, 5, 6, 7
    pub fn parse(s: &str) -> OperationResult<Self> {
        let s = s.trim();

        if s.eq_ignore_ascii_case("all") {
            return Ok(PageRange::All);
        }

        if s.contains(',') {
            let mut pages = Vec::new();
            for part in s.split(',') {
                match Self::parse(part)? {
                    PageRange::Single(page) => pages.push(page),
                    PageRange::Range(start, end) => pages.extend(start..=end),
                    _ => {
                        return Err(ValidationError::InvalidPageRange(format!(
                            "Invalid list entry: {}",
                            part.trim()
                        )))
                    }
                }
            }
            return Ok(PageRange::List(pages));
        }

        if let Some((start, end)) = s.split_once('-') {
            let start = parse_page_number(start)?;
            let end = parse_page_number(end)?;
            if start > end {
                return Err(ValidationError::InvalidPageRange(format!(
                    "Start {start} is greater than end {end}"
                )));
            }
            return Ok(PageRange::Range(start, end));
        }

        parse_page_number(s).map(PageRange::Single)
    }

    /// The selected page numbers, checked against `page_count`
    pub fn get_pages(&self, page_count: usize) -> OperationResult<Vec<usize>> {
        let pages: Vec<usize> = match self {
            PageRange::All => return Ok((1..=page_count).collect()),
            PageRange::Single(page) => vec![*page],
            PageRange::Range(start, end) => (*start..=*end).collect(),
            PageRange::List(pages) => pages.clone(),
        };
        match pages.iter().find(|&&page| page == 0 || page > page_count) {
            Some(&index) => Err(ValidationError::OutOfRange { index, page_count }),
            None => Ok(pages),
        }
    }
}

fn parse_page_number(text: &str) -> OperationResult<usize> {
    let text = text.trim();
    match text.parse::<usize>() {
        Ok(0) => Err(ValidationError::InvalidPageRange(
            "Page numbers start at 1".to_string(),
        )),
        Ok(page) => Ok(page),
        Err(_) => Err(ValidationError::InvalidPageRange(format!(
            "Invalid page: {text}"
        ))),
    }
}

/// Page numbers from free-form input such as `"3, x, 1,3"`.
///
/// Entries are split on commas and trimmed; anything that is not all digits
/// is ignored. Order and duplicates are kept.
pub fn parse_page_list(text: &str) -> Vec<usize> {
    text.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && entry.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|entry| entry.parse().ok())
        .collect()
}

/// Copies of encrypted objects cannot be renumbered: their keys depend on the
/// object number.
pub(crate) fn ensure_decrypted(doc: &Document, operation: &str) -> Result<()> {
    if doc.is_encrypted() {
        return Err(PdfError::Encryption(format!(
            "cannot {operation} an encrypted document; decrypt it first"
        )));
    }
    Ok(())
}

/// A fresh document holding copies of `pages` of `source`, in order.
pub(crate) fn document_from_pages(source: &Document, pages: &[ObjectId]) -> Result<Document> {
    let mut doc = Document::new();
    doc.set_version(source.version());

    let imported = doc.import_pages(source, pages)?;
    doc.append_pages(&imported)?;

    if let Some(info) = source.trailer().info().filter(|&id| source.contains(id)) {
        let offset = doc.max_object_number();
        let copy = doc.clone_subgraph(source, info, offset)?;
        doc.trailer_mut().dict_mut().set("Info", copy);
    }

    Ok(doc)
}
