//! PDF merging functionality

use super::ensure_decrypted;
use crate::document::Document;
use crate::error::Result;

/// Concatenate the pages of `first` and `second` into a new document.
///
/// Pages of `second` follow those of `first`; neither input is modified.
pub fn merge(first: &Document, second: &Document) -> Result<Document> {
    merge_documents(&[first, second])
}

/// Concatenate the pages of every input, in order, under one flat Pages node.
///
/// Each input is copied with [`Document::import_pages`] at an offset equal to
/// the highest object number allocated so far, so ids from different inputs
/// never collide.
pub fn merge_documents(inputs: &[&Document]) -> Result<Document> {
    let mut merged = Document::new();

    for (index, input) in inputs.iter().enumerate() {
        ensure_decrypted(input, "merge")?;
        let pages = input.page_ids()?;
        let imported = merged.import_pages(input, &pages)?;
        merged.append_pages(&imported)?;
        tracing::debug!("Merged input {}: {} pages", index + 1, imported.len());
    }

    if let Some(version) = inputs.iter().map(|input| input.version()).max() {
        merged.set_version(version);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::test_support::{numbered_document, page_labels};
    use crate::parser::PdfVersion;

    #[test]
    fn test_merge_concatenates_in_order() {
        let a = numbered_document(2);
        let b = numbered_document(3);
        let merged = merge(&a, &b).unwrap();

        assert_eq!(merged.page_count().unwrap(), 5);
        assert_eq!(
            page_labels(&merged),
            vec!["page 1", "page 2", "page 1", "page 2", "page 3"]
        );
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let a = numbered_document(1);
        let b = numbered_document(1);
        let before = a.to_bytes().unwrap();
        merge(&a, &b).unwrap();
        assert_eq!(a.to_bytes().unwrap(), before);
    }

    #[test]
    fn test_merged_ids_do_not_collide() {
        let a = numbered_document(2);
        let b = numbered_document(2);
        let merged = merge(&a, &b).unwrap();

        let pages = merged.page_ids().unwrap();
        let mut unique = pages.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 4);
        // Second input shifted past everything allocated for the first
        assert!(pages[2].number() > 2 + a.max_object_number());
    }

    #[test]
    fn test_merge_survives_serialization() {
        let merged = merge(&numbered_document(2), &numbered_document(1)).unwrap();
        let reparsed = Document::parse(&merged.to_bytes().unwrap()).unwrap();
        assert_eq!(page_labels(&reparsed), vec!["page 1", "page 2", "page 1"]);
    }

    #[test]
    fn test_merge_keeps_highest_version() {
        let mut a = numbered_document(1);
        a.set_version(PdfVersion::new(1, 4));
        let mut b = numbered_document(1);
        b.set_version(PdfVersion::new(1, 6));
        let merged = merge_documents(&[&a, &b]).unwrap();
        assert_eq!(merged.version(), PdfVersion::new(1, 6));
    }

    #[test]
    fn test_merge_with_empty_document() {
        let merged = merge(&Document::new(), &numbered_document(2)).unwrap();
        assert_eq!(merged.page_count().unwrap(), 2);
    }
}
