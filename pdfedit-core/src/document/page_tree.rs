//! Page tree traversal and inherited page attributes (ISO 32000-1 Section 7.7.3)

use super::Document;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::operations::ValidationError;
use std::collections::HashSet;

/// Page attributes a leaf may inherit from its ancestors
pub const INHERITABLE_ATTRIBUTES: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Summary of one page in canonical order
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    /// 1-based position in the document
    pub number: usize,
    pub id: ObjectId,
    /// Effective rotation, normalised into 0..360
    pub rotation: i64,
    pub media_box: Option<[f64; 4]>,
}

impl Document {
    /// The root Pages node named by the catalog
    pub fn pages_root(&self) -> Result<ObjectId> {
        self.catalog()?
            .get_reference("Pages")
            .ok_or_else(|| PdfError::InvalidStructure("Catalog has no Pages reference".to_string()))
    }

    /// Page leaves in depth-first, left-to-right order.
    ///
    /// Nested Pages nodes are flattened. A node that is reached twice is
    /// skipped, so a cyclic tree still yields each page once.
    pub fn page_ids(&self) -> Result<Vec<ObjectId>> {
        let root = self.pages_root()?;
        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                tracing::warn!("Pages tree reaches {} twice; skipping the repeat", id);
                continue;
            }
            if !self.contains(id) {
                tracing::warn!("Pages tree references missing object {}", id);
                continue;
            }

            let node = match self.get(id)?.as_dict() {
                Some(dict) => dict,
                None => {
                    tracing::warn!("Pages tree node {} is not a dictionary", id);
                    continue;
                }
            };

            if is_pages_node(node) {
                let kids = match node.get("Kids") {
                    Some(kids) => self.resolve(kids)?.as_array().map(Vec::as_slice).unwrap_or(&[]),
                    None => &[],
                };
                for kid in kids.iter().rev() {
                    match kid.as_reference() {
                        Some(kid) => stack.push(kid),
                        None => tracing::warn!("Ignoring direct object in Kids of {}", id),
                    }
                }
            } else {
                pages.push(id);
            }
        }

        tracing::debug!("Found {} pages", pages.len());
        Ok(pages)
    }

    pub fn page_count(&self) -> Result<usize> {
        Ok(self.page_ids()?.len())
    }

    /// Id of the page at 1-based position `number`
    pub fn page_id(&self, number: usize) -> Result<ObjectId> {
        let pages = self.page_ids()?;
        number
            .checked_sub(1)
            .and_then(|index| pages.get(index).copied())
            .ok_or_else(|| {
                ValidationError::OutOfRange {
                    index: number,
                    page_count: pages.len(),
                }
                .into()
            })
    }

    /// Every page with its effective rotation and media box
    pub fn pages(&self) -> Result<Vec<PageInfo>> {
        self.page_ids()?
            .into_iter()
            .enumerate()
            .map(|(index, id)| {
                Ok(PageInfo {
                    number: index + 1,
                    id,
                    rotation: self.page_rotation(id)?,
                    media_box: self.page_media_box(id)?,
                })
            })
            .collect()
    }

    /// Look `key` up on the page, then on each ancestor via `Parent`.
    pub fn inherited_attribute(&self, page: ObjectId, key: &str) -> Result<Option<&Object>> {
        let mut current = page;
        let mut visited = HashSet::new();

        loop {
            if !visited.insert(current) || !self.contains(current) {
                return Ok(None);
            }
            let dict = match self.get(current)?.as_dict() {
                Some(dict) => dict,
                None => return Ok(None),
            };
            if let Some(value) = dict.get(key) {
                return Ok(Some(value));
            }
            match dict.get_reference("Parent") {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }

    /// Effective rotation of a page, normalised into {0, 90, 180, 270} for
    /// multiples of 90.
    pub fn page_rotation(&self, page: ObjectId) -> Result<i64> {
        let rotation = match self.inherited_attribute(page, "Rotate")? {
            Some(value) => match self.resolve(value)? {
                Object::Integer(n) => *n,
                Object::Real(r) => r.round() as i64,
                _ => 0,
            },
            None => 0,
        };
        Ok(rotation.rem_euclid(360))
    }

    pub fn set_page_rotation(&mut self, page: ObjectId, rotation: i64) -> Result<()> {
        self.get_dict_mut(page)?
            .set("Rotate", rotation.rem_euclid(360));
        Ok(())
    }

    pub fn page_media_box(&self, page: ObjectId) -> Result<Option<[f64; 4]>> {
        let value = match self.inherited_attribute(page, "MediaBox")? {
            Some(value) => self.resolve(value)?,
            None => return Ok(None),
        };
        let numbers: Vec<f64> = match value.as_array() {
            Some(items) => items
                .iter()
                .map(|item| self.resolve(item).map(Object::as_real))
                .collect::<Result<Option<Vec<f64>>>>()?
                .unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(numbers.try_into().ok())
    }

    /// Attach pages as direct children of the root Pages node.
    pub fn append_pages(&mut self, pages: &[ObjectId]) -> Result<()> {
        let root = self.pages_root()?;

        for &page in pages {
            self.get_dict_mut(page)?.set("Parent", root);
        }

        let existing_kids = match self.get(root)?.as_dict().and_then(|d| d.get("Kids")) {
            Some(Object::Array(_)) | None => None,
            // Indirect Kids array: take a copy we can extend
            Some(other) => Some(self.resolve(other)?.as_array().cloned().unwrap_or_default()),
        };

        let node = self.get_dict_mut(root)?;
        if let Some(kids) = existing_kids {
            node.set("Kids", kids);
        }
        match node.get_mut("Kids").and_then(Object::as_array_mut) {
            Some(kids) => kids.extend(pages.iter().map(|&page| Object::Reference(page))),
            None => node.set(
                "Kids",
                pages.iter().map(|&page| Object::Reference(page)).collect::<Vec<_>>(),
            ),
        }
        let count = node.get_integer("Count").unwrap_or(0);
        node.set("Count", count + pages.len() as i64);
        Ok(())
    }
}

/// A node with Kids, or typed as Pages, is an intermediate node
pub(crate) fn is_pages_node(dict: &Dictionary) -> bool {
    match dict.get_type() {
        Some("Pages") => true,
        Some("Page") => false,
        _ => dict.contains_key("Kids"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(doc: &mut Document, parent: ObjectId, extra: &[(&str, Object)]) -> ObjectId {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("Page"));
        dict.set("Parent", parent);
        for (key, value) in extra {
            dict.set(*key, value.clone());
        }
        doc.add_object(dict)
    }

    fn pages_node(kids: &[ObjectId], extra: &[(&str, Object)]) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("Pages"));
        dict.set(
            "Kids",
            kids.iter().map(|&k| Object::Reference(k)).collect::<Vec<_>>(),
        );
        dict.set("Count", kids.len());
        for (key, value) in extra {
            dict.set(*key, value.clone());
        }
        dict
    }

    /// Root -> [A, Mid -> [B, C], D]
    fn nested_document() -> (Document, Vec<ObjectId>) {
        let mut doc = Document::new();
        let root = doc.pages_root().unwrap();
        let mid = doc.allocate();

        let a = page(&mut doc, root, &[]);
        let b = page(&mut doc, mid, &[("Rotate", Object::Integer(90))]);
        let c = page(&mut doc, mid, &[]);
        let d = page(&mut doc, root, &[]);

        doc.insert(mid, pages_node(&[b, c], &[("Rotate", Object::Integer(-90))]));
        doc.insert(
            root,
            pages_node(
                &[a, mid, d],
                &[(
                    "MediaBox",
                    Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
                )],
            ),
        );
        (doc, vec![a, b, c, d])
    }

    #[test]
    fn test_nested_tree_is_flattened_in_order() {
        let (doc, expected) = nested_document();
        assert_eq!(doc.page_ids().unwrap(), expected);
        assert_eq!(doc.page_count().unwrap(), 4);
        assert_eq!(doc.page_id(2).unwrap(), expected[1]);
    }

    #[test]
    fn test_page_id_out_of_range() {
        let (doc, _) = nested_document();
        let err = doc.page_id(0).unwrap_err();
        assert!(matches!(
            err,
            PdfError::Validation(ValidationError::OutOfRange { index: 0, page_count: 4 })
        ));
        assert!(doc.page_id(5).is_err());
    }

    #[test]
    fn test_inherited_rotation_and_media_box() {
        let (doc, pages) = nested_document();
        assert_eq!(doc.page_rotation(pages[0]).unwrap(), 0);
        assert_eq!(doc.page_rotation(pages[1]).unwrap(), 90);
        // -90 inherited from the intermediate node
        assert_eq!(doc.page_rotation(pages[2]).unwrap(), 270);
        assert_eq!(
            doc.page_media_box(pages[3]).unwrap(),
            Some([0.0, 0.0, 612.0, 792.0])
        );
    }

    #[test]
    fn test_cycle_is_skipped() {
        let (mut doc, pages) = nested_document();
        let root = doc.pages_root().unwrap();
        // Make the intermediate node point back at the root
        let mid = doc.get(pages[1]).unwrap().as_dict().unwrap().get_reference("Parent").unwrap();
        doc.insert(mid, pages_node(&[pages[1], root, pages[2]], &[]));

        assert_eq!(doc.page_ids().unwrap(), pages);
    }

    #[test]
    fn test_append_pages_updates_count_and_parent() {
        let mut doc = Document::new();
        let root = doc.pages_root().unwrap();
        let p1 = page(&mut doc, root, &[]);
        let p2 = page(&mut doc, root, &[]);
        doc.append_pages(&[p1, p2]).unwrap();

        assert_eq!(doc.page_ids().unwrap(), vec![p1, p2]);
        let node = doc.get(root).unwrap().as_dict().unwrap();
        assert_eq!(node.get_integer("Count"), Some(2));
        assert_eq!(
            doc.get(p2).unwrap().as_dict().unwrap().get_reference("Parent"),
            Some(root)
        );
    }

    #[test]
    fn test_pages_summary() {
        let (doc, pages) = nested_document();
        let summary = doc.pages().unwrap();
        assert_eq!(summary.len(), 4);
        assert_eq!(summary[1].number, 2);
        assert_eq!(summary[1].id, pages[1]);
        assert_eq!(summary[1].rotation, 90);
    }
}
