//! PDF page rotation functionality

use super::PageRange;
use crate::document::Document;
use crate::error::Result;

/// Add `angle` degrees to the rotation of every page.
///
/// Any angle is accepted; the stored value is normalised into 0..360.
/// Encrypted documents can be rotated, since only page dictionaries change.
pub fn rotate(doc: &mut Document, angle: i64) -> Result<()> {
    rotate_pages(doc, &PageRange::All, angle)
}

/// Add `angle` degrees to the rotation of the selected pages.
///
/// The effective rotation, including any value inherited from a Pages node,
/// is the starting point; the result is written onto the page itself.
pub fn rotate_pages(doc: &mut Document, range: &PageRange, angle: i64) -> Result<()> {
    let pages = doc.page_ids()?;
    let selected = range.get_pages(pages.len())?;

    for number in selected {
        let page = pages[number - 1];
        let current = doc.page_rotation(page)?;
        doc.set_page_rotation(page, current + angle)?;
    }

    tracing::debug!("Rotated pages by {} degrees", angle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::test_support::numbered_document;
    use proptest::prelude::*;

    fn rotations(doc: &Document) -> Vec<i64> {
        doc.pages().unwrap().iter().map(|page| page.rotation).collect()
    }

    #[test]
    fn test_rotate_all_pages() {
        let mut doc = numbered_document(3);
        rotate(&mut doc, 90).unwrap();
        assert_eq!(rotations(&doc), vec![90, 90, 90]);
    }

    #[test]
    fn test_rotation_is_additive() {
        let mut once = numbered_document(2);
        rotate(&mut once, 90).unwrap();

        let mut twice = numbered_document(2);
        rotate(&mut twice, 270).unwrap();
        rotate(&mut twice, 180).unwrap();

        assert_eq!(rotations(&once), rotations(&twice));
    }

    #[test]
    fn test_rotation_starts_from_inherited_value() {
        let mut doc = numbered_document(2);
        let root = doc.pages_root().unwrap();
        doc.get_dict_mut(root).unwrap().set("Rotate", 180);
        rotate(&mut doc, 270).unwrap();
        assert_eq!(rotations(&doc), vec![90, 90]);
    }

    #[test]
    fn test_rotate_selected_pages() {
        let mut doc = numbered_document(4);
        rotate_pages(&mut doc, &PageRange::parse("2,4").unwrap(), -90).unwrap();
        assert_eq!(rotations(&doc), vec![0, 270, 0, 270]);
    }

    #[test]
    fn test_rotate_out_of_range() {
        let mut doc = numbered_document(2);
        assert!(rotate_pages(&mut doc, &PageRange::Single(3), 90).is_err());
        assert_eq!(rotations(&doc), vec![0, 0]);
    }

    proptest! {
        #[test]
        fn prop_rotation_is_additive_mod_360(a in -1000i64..1000, b in -1000i64..1000) {
            let mut stepwise = numbered_document(1);
            rotate(&mut stepwise, a).unwrap();
            rotate(&mut stepwise, b).unwrap();

            let mut combined = numbered_document(1);
            rotate(&mut combined, a + b).unwrap();

            let rotation = rotations(&stepwise)[0];
            prop_assert_eq!(rotation, rotations(&combined)[0]);
            prop_assert!((0..360).contains(&rotation));
        }
    }
}
