//! Page extraction functionality

use super::{document_from_pages, ensure_decrypted, ValidationError};
use crate::document::Document;
use crate::error::Result;

/// One standalone single-page document per requested page number.
///
/// Numbers outside `1..=page_count` are dropped. The rest are honoured in the
/// order given, duplicates included. Fails with
/// [`ValidationError::NoValidPages`] when nothing is left.
pub fn extract_pages(doc: &Document, page_numbers: &[usize]) -> Result<Vec<Document>> {
    ensure_decrypted(doc, "extract pages from")?;
    let pages = doc.page_ids()?;

    let selected: Vec<usize> = page_numbers
        .iter()
        .copied()
        .filter(|&number| (1..=pages.len()).contains(&number))
        .collect();
    if selected.is_empty() {
        return Err(ValidationError::NoValidPages {
            page_count: pages.len(),
        }
        .into());
    }
    if selected.len() < page_numbers.len() {
        tracing::debug!(
            "Ignoring {} page numbers outside 1..={}",
            page_numbers.len() - selected.len(),
            pages.len()
        );
    }

    selected
        .into_iter()
        .map(|number| document_from_pages(doc, &pages[number - 1..number]))
        .collect()
}
