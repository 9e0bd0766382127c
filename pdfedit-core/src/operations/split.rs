//! PDF splitting functionality

use super::{document_from_pages, ensure_decrypted, ValidationError};
use crate::document::Document;
use crate::error::Result;

/// Split before page `at` (1-based).
///
/// The first part holds pages `1..at` and is empty when `at` is 1; the second
/// holds `at..=page_count`. Every page lands in exactly one part.
pub fn split_at(doc: &Document, at: usize) -> Result<(Document, Document)> {
    ensure_decrypted(doc, "split")?;
    let pages = doc.page_ids()?;
    if at == 0 || at > pages.len() {
        return Err(ValidationError::OutOfRange {
            index: at,
            page_count: pages.len(),
        }
        .into());
    }

    let (head, tail) = pages.split_at(at - 1);
    let first = document_from_pages(doc, head)?;
    let second = document_from_pages(doc, tail)?;
    tracing::debug!("Split {} pages into {} + {}", pages.len(), head.len(), tail.len());
    Ok((first, second))
}
