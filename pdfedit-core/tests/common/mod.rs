//! Fixture builders shared by the integration tests
#![allow(dead_code)]

use pdfedit::objects::{Dictionary, Object, Stream};
use pdfedit::Document;

/// A document whose page n draws the text given by `labels[n - 1]`.
pub fn labelled_document(labels: &[&str]) -> Document {
    let mut doc = Document::new();
    let mut pages = Vec::new();
    for label in labels {
        let content = format!("BT ({label}) Tj ET").into_bytes();
        let contents = doc.add_object(Stream::new(Dictionary::new(), content));
        let mut page = Dictionary::new();
        page.set("Type", Object::name("Page"));
        page.set("Contents", contents);
        page.set(
            "MediaBox",
            vec![Object::from(0), Object::from(0), Object::from(612), Object::from(792)],
        );
        pages.push(doc.add_object(page));
    }
    doc.append_pages(&pages).unwrap();
    doc
}

/// Serialized document with pages labelled "page 1" .. "page n"
pub fn numbered_pdf(count: usize) -> Vec<u8> {
    let labels: Vec<String> = (1..=count).map(|n| format!("page {n}")).collect();
    let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
    labelled_document(&labels).to_bytes().unwrap()
}

/// Text drawn by each page of a parsed document, in page order
pub fn page_texts(doc: &Document) -> Vec<String> {
    doc.page_ids()
        .unwrap()
        .into_iter()
        .map(|page| {
            let dict = doc.get(page).unwrap().as_dict().unwrap();
            let contents = dict.get_reference("Contents").unwrap();
            let stream = doc.get(contents).unwrap().as_stream().unwrap();
            let text = String::from_utf8(stream.decoded_data().unwrap()).unwrap();
            text.trim_start_matches("BT (")
                .trim_end_matches(") Tj ET")
                .to_string()
        })
        .collect()
}

pub fn texts_of(bytes: &[u8]) -> Vec<String> {
    page_texts(&Document::parse(bytes).unwrap())
}

/// Assemble a classic PDF from numbered object bodies, computing the xref
/// offsets. Object `n` is `bodies[n - 1]`.
pub fn build_pdf(version: &str, bodies: &[&str], trailer: &str) -> Vec<u8> {
    let mut out = format!("%PDF-{version}\n%\u{e2}\u{e3}\n").into_bytes();
    let mut offsets = Vec::new();
    for (index, body) in bodies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, body).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", bodies.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n",
            bodies.len() + 1,
            trailer,
            xref
        )
        .as_bytes(),
    );
    out
}

/// Two pages under a nested Pages node that carries the MediaBox and a
/// Rotate of 90 for its children.
pub fn nested_tree_pdf() -> Vec<u8> {
    build_pdf(
        "1.4",
        &[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 2 /MediaBox [0 0 595 842] >>",
            "<< /Type /Pages /Parent 2 0 R /Kids [4 0 R 5 0 R] /Count 2 /Rotate 90 >>",
            "<< /Type /Page /Parent 3 0 R /Contents 6 0 R >>",
            "<< /Type /Page /Parent 3 0 R /Contents 7 0 R /Rotate 180 >>",
            "<< /Length 16 >>\nstream\nBT (first) Tj ET\nendstream",
            "<< /Length 17 >>\nstream\nBT (second) Tj ET\nendstream",
        ],
        "/Root 1 0 R",
    )
}
