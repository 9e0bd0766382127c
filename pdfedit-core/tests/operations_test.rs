//! Integration tests for page operations through the public API

mod common;

use common::{labelled_document, nested_tree_pdf, numbered_pdf, texts_of};
use pdfedit::operations::{self, parse_page_list};
use pdfedit::{api, Document, PageRange, PdfError, ValidationError};
use pretty_assertions::assert_eq;

#[test]
fn test_merge_then_split_restores_both_inputs() {
    let a = numbered_pdf(3);
    let b = api::rotate(&numbered_pdf(2), 90).unwrap();

    let merged = api::merge(&a, &b).unwrap();
    assert_eq!(
        texts_of(&merged),
        vec!["page 1", "page 2", "page 3", "page 1", "page 2"]
    );

    let (first, second) = api::split(&merged, 4).unwrap();
    assert_eq!(texts_of(&first), texts_of(&a));
    assert_eq!(texts_of(&second), texts_of(&b));

    let rotations: Vec<i64> = api::inspect(&second)
        .unwrap()
        .pages
        .iter()
        .map(|page| page.rotation)
        .collect();
    assert_eq!(rotations, vec![90, 90]);
}

#[test]
fn test_merge_materialises_inherited_attributes() {
    let merged = api::merge(&nested_tree_pdf(), &numbered_pdf(1)).unwrap();
    let summary = api::inspect(&merged).unwrap();

    let rotations: Vec<i64> = summary.pages.iter().map(|page| page.rotation).collect();
    assert_eq!(rotations, vec![90, 180, 0]);
    assert_eq!(summary.pages[0].media_box, Some([0.0, 0.0, 595.0, 842.0]));
    assert_eq!(summary.pages[2].media_box, Some([0.0, 0.0, 612.0, 792.0]));
    assert_eq!(texts_of(&merged), vec!["first", "second", "page 1"]);
}

#[test]
fn test_merge_many() {
    let inputs = [numbered_pdf(1), numbered_pdf(2), numbered_pdf(1)];
    let refs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
    let merged = api::merge_all(&refs).unwrap();
    assert_eq!(texts_of(&merged), vec!["page 1", "page 1", "page 2", "page 1"]);
}

#[test]
fn test_split_bounds() {
    let input = numbered_pdf(3);

    let (first, second) = api::split(&input, 1).unwrap();
    assert!(texts_of(&first).is_empty());
    assert_eq!(texts_of(&second).len(), 3);

    for at in [0, 4] {
        let err = api::split(&input, at).unwrap_err();
        assert!(matches!(
            err,
            PdfError::Validation(ValidationError::OutOfRange { page_count: 3, .. })
        ));
    }
}

#[test]
fn test_extract_from_free_form_list() {
    let input = numbered_pdf(4);
    let pages = parse_page_list("4, two, 2, 99, 4");
    assert_eq!(pages, vec![4, 2, 99, 4]);

    let parts = api::extract(&input, &pages).unwrap();
    let texts: Vec<Vec<String>> = parts.iter().map(|part| texts_of(part)).collect();
    assert_eq!(
        texts,
        vec![vec!["page 4"], vec!["page 2"], vec!["page 4"]]
    );
}

#[test]
fn test_extract_with_nothing_valid() {
    let err = api::extract(&numbered_pdf(2), &[0, 3]).unwrap_err();
    assert!(matches!(
        err,
        PdfError::Validation(ValidationError::NoValidPages { page_count: 2 })
    ));
}

#[test]
fn test_rotation_accumulates() {
    let once = api::rotate(&nested_tree_pdf(), 90).unwrap();
    let twice = api::rotate(&once, 270).unwrap();

    let rotations = |bytes: &[u8]| -> Vec<i64> {
        api::inspect(bytes)
            .unwrap()
            .pages
            .iter()
            .map(|page| page.rotation)
            .collect()
    };
    assert_eq!(rotations(&once), vec![180, 270]);
    assert_eq!(rotations(&twice), vec![90, 180]);

    let input = numbered_pdf(2);
    let composed = api::rotate(&api::rotate(&input, 270).unwrap(), 180).unwrap();
    let direct = api::rotate(&input, 90).unwrap();
    assert_eq!(rotations(&composed), rotations(&direct));
    assert_eq!(rotations(&api::rotate(&input, -450).unwrap()), vec![270, 270]);
}

#[test]
fn test_rotate_and_delete_selected_pages() {
    let mut doc = labelled_document(&["a", "b", "c", "d"]);
    operations::rotate_pages(&mut doc, &PageRange::parse("2-3").unwrap(), -90).unwrap();
    let deleted = operations::delete_pages(&mut doc, &PageRange::List(vec![1, 4])).unwrap();
    assert_eq!(deleted, 2);

    let reparsed = Document::parse(&doc.to_bytes().unwrap()).unwrap();
    assert_eq!(common::page_texts(&reparsed), vec!["b", "c"]);
    assert!(reparsed
        .pages()
        .unwrap()
        .iter()
        .all(|page| page.rotation == 270));
}

#[test]
fn test_operations_refuse_encrypted_input() {
    let locked = api::encrypt(&numbered_pdf(2), "pw").unwrap();

    for result in [
        api::merge(&locked, &numbered_pdf(1)).map(|_| ()),
        api::split(&locked, 1).map(|_| ()),
        api::extract(&locked, &[1]).map(|_| ()),
        api::compress(&locked, 50).map(|_| ()),
    ] {
        assert!(matches!(result, Err(PdfError::Encryption(_))));
    }
}

#[test]
fn test_rotate_works_on_encrypted_input() {
    let locked = api::encrypt(&numbered_pdf(2), "pw").unwrap();
    let rotated = api::rotate(&locked, 90).unwrap();
    assert!(api::is_encrypted(&rotated).unwrap());

    let plain = api::decrypt(&rotated, "pw").unwrap();
    assert_eq!(common::texts_of(&plain), vec!["page 1", "page 2"]);
    assert!(api::inspect(&plain)
        .unwrap()
        .pages
        .iter()
        .all(|page| page.rotation == 90));
}
