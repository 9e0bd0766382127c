//! Deep copies of object subgraphs between documents.
//!
//! Copies are renumbered by a fixed offset so that the copied ids cannot
//! collide with anything already in the destination, and the source document
//! is only ever read.

use super::page_tree::INHERITABLE_ATTRIBUTES;
use super::Document;
use crate::error::Result;
use crate::objects::{Dictionary, Object, ObjectId};
use std::collections::HashSet;

impl Document {
    /// Copy the objects reachable from `root` in `source` into this document,
    /// adding `offset` to every object number. Returns the id of the copied root.
    ///
    /// Objects already present at their shifted id are not copied again, so
    /// repeated calls with the same offset share common resources. Page tree
    /// nodes other than `root` (and the source catalog) are not followed;
    /// references to them, and to objects missing from `source`, become null.
    pub fn clone_subgraph(&mut self, source: &Document, root: ObjectId, offset: u32) -> Result<ObjectId> {
        let mut collected = Vec::new();
        let mut skipped = HashSet::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if !source.contains(id) {
                skipped.insert(id);
                continue;
            }
            if self.contains(id.offset_by(offset)) {
                continue;
            }

            let object = source.get(id)?;
            if id != root && is_structural_node(object) {
                skipped.insert(id);
                continue;
            }
            object.for_each_reference(&mut |child| {
                if !seen.contains(&child) {
                    stack.push(child);
                }
            });
            collected.push(id);
        }

        for &id in &collected {
            let mut object = source.get(id)?.clone();
            object.rewrite_references(&mut |target| {
                if skipped.contains(&target) {
                    Object::Null
                } else {
                    Object::Reference(target.offset_by(offset))
                }
            });
            self.insert(id.offset_by(offset), object);
        }

        tracing::trace!(
            "Cloned {} objects from {} (offset {}, {} references dropped)",
            collected.len(),
            root,
            offset,
            skipped.len()
        );
        Ok(root.offset_by(offset))
    }

    /// Copy pages of `source` into this document as standalone page objects.
    ///
    /// All pages share one renumbering offset, the current highest object
    /// number, so resources used by several pages are copied once. Each copy
    /// has its `Parent` removed and its inherited attributes written onto it;
    /// attach the result with [`Document::append_pages`]. Importing the same
    /// page twice yields two page objects sharing content and resources.
    pub fn import_pages(&mut self, source: &Document, pages: &[ObjectId]) -> Result<Vec<ObjectId>> {
        let offset = self.max_object_number;
        // Keep allocations for duplicate pages clear of the shifted range
        self.max_object_number = offset.saturating_add(source.max_object_number());

        let mut imported = Vec::with_capacity(pages.len());
        for &page in pages {
            let target = page.offset_by(offset);
            if self.contains(target) {
                let copy = self.get(target)?.clone();
                imported.push(self.add_object(copy));
                continue;
            }

            let own = source.get(page)?.as_dict();
            let mut inherited = Vec::new();
            for key in INHERITABLE_ATTRIBUTES {
                if own.is_some_and(|dict| dict.contains_key(key)) {
                    continue;
                }
                if let Some(value) = source.inherited_attribute(page, key)? {
                    inherited.push((key, value.clone()));
                }
            }

            let id = self.clone_subgraph(source, page, offset)?;

            let mut materialised = Vec::with_capacity(inherited.len());
            for (key, mut value) in inherited {
                let mut references = Vec::new();
                value.for_each_reference(&mut |r| references.push(r));
                for reference in references {
                    if source.contains(reference) {
                        self.clone_subgraph(source, reference, offset)?;
                    }
                }
                value.rewrite_references(&mut |r| {
                    if source.contains(r) {
                        Object::Reference(r.offset_by(offset))
                    } else {
                        Object::Null
                    }
                });
                materialised.push((key, value));
            }

            let dict = self.get_dict_mut(id)?;
            dict.remove("Parent");
            for (key, value) in materialised {
                dict.set(key, value);
            }
            imported.push(id);
        }

        tracing::debug!("Imported {} pages at offset {}", imported.len(), offset);
        Ok(imported)
    }
}

fn is_structural_node(object: &Object) -> bool {
    matches!(
        object.as_dict().and_then(Dictionary::get_type),
        Some("Page" | "Pages" | "Catalog")
    )
}
