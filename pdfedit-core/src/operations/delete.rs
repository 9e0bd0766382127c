//! Page deletion

use super::PageRange;
use crate::document::{is_pages_node, Document};
use crate::error::Result;
use crate::objects::{Object, ObjectId};
use std::collections::HashSet;

/// Remove the selected pages from the page tree and the object arena.
///
/// `Count` is recomputed on every remaining Pages node, and intermediate nodes
/// left without pages are dropped. Deleting every page leaves an empty but
/// valid document. Returns the number of pages removed.
pub fn delete_pages(doc: &mut Document, range: &PageRange) -> Result<usize> {
    let pages = doc.page_ids()?;
    let doomed: HashSet<ObjectId> = range
        .get_pages(pages.len())?
        .into_iter()
        .map(|number| pages[number - 1])
        .collect();

    let root = doc.pages_root()?;
    let mut visited = HashSet::new();
    let remaining = prune(doc, root, &doomed, &mut visited)?;

    for &page in &doomed {
        doc.remove(page);
    }

    tracing::debug!("Deleted {} pages, {} remain", doomed.len(), remaining);
    Ok(doomed.len())
}

/// Rebuild `Kids` and `Count` below `node`; returns the number of leaves kept.
fn prune(
    doc: &mut Document,
    node: ObjectId,
    doomed: &HashSet<ObjectId>,
    visited: &mut HashSet<ObjectId>,
) -> Result<usize> {
    if !visited.insert(node) {
        return Ok(0);
    }

    let kids: Vec<ObjectId> = match doc.get(node)?.as_dict().and_then(|d| d.get("Kids")) {
        Some(kids) => doc
            .resolve(kids)?
            .as_array()
            .map(|items| items.iter().filter_map(Object::as_reference).collect())
            .unwrap_or_default(),
        None => Vec::new(),
    };

    let mut kept = Vec::with_capacity(kids.len());
    let mut count = 0;
    for kid in kids {
        if doomed.contains(&kid) || !doc.contains(kid) {
            continue;
        }
        let intermediate = doc.get(kid)?.as_dict().is_some_and(is_pages_node);
        if intermediate {
            let leaves = prune(doc, kid, doomed, visited)?;
            if leaves == 0 {
                continue;
            }
            count += leaves;
        } else {
            count += 1;
        }
        kept.push(Object::Reference(kid));
    }

    let dict = doc.get_dict_mut(node)?;
    dict.set("Kids", kept);
    dict.set("Count", count);
    Ok(count)
}
