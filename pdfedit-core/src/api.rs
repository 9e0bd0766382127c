//! Byte-in, byte-out entry points
//!
//! Each function parses its input, runs one operation and serializes the
//! result. Inputs are never modified, and no bytes are returned unless the
//! whole output document was written.

use crate::document::{Document, PageInfo};
use crate::encryption::{self, EncryptionOptions};
use crate::error::Result;
use crate::images::{self, RecompressOptions, RecompressReport};
use crate::operations;
use crate::parser::PdfVersion;

/// Concatenate the pages of `first` and then `second`.
pub fn merge(first: &[u8], second: &[u8]) -> Result<Vec<u8>> {
    merge_all(&[first, second])
}

/// Concatenate the pages of every input, in order.
pub fn merge_all(inputs: &[&[u8]]) -> Result<Vec<u8>> {
    let docs = inputs
        .iter()
        .map(|bytes| Document::parse(bytes))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&Document> = docs.iter().collect();
    let merged = operations::merge_documents(&refs)?;
    let output = merged.to_bytes()?;
    tracing::info!(
        "Merged {} documents into {} pages ({} bytes)",
        docs.len(),
        merged.page_count()?,
        output.len()
    );
    Ok(output)
}

/// Pages before `at` and pages from `at` on (1-based).
pub fn split(bytes: &[u8], at: usize) -> Result<(Vec<u8>, Vec<u8>)> {
    let doc = Document::parse(bytes)?;
    let (first, second) = operations::split_at(&doc, at)?;
    let output = (first.to_bytes()?, second.to_bytes()?);
    tracing::info!(
        "Split at page {} into {} + {} pages",
        at,
        first.page_count()?,
        second.page_count()?
    );
    Ok(output)
}

/// One single-page document per valid requested page, in request order.
pub fn extract(bytes: &[u8], pages: &[usize]) -> Result<Vec<Vec<u8>>> {
    let doc = Document::parse(bytes)?;
    let output = operations::extract_pages(&doc, pages)?
        .iter()
        .map(Document::to_bytes)
        .collect::<Result<Vec<_>>>()?;
    tracing::info!("Extracted {} pages", output.len());
    Ok(output)
}

/// Encrypt with the default algorithm (128-bit RC4) and all permissions.
pub fn encrypt(bytes: &[u8], password: &str) -> Result<Vec<u8>> {
    encrypt_with(bytes, password, &EncryptionOptions::default())
}

pub fn encrypt_with(bytes: &[u8], password: &str, options: &EncryptionOptions) -> Result<Vec<u8>> {
    let mut doc = Document::parse(bytes)?;
    encryption::encrypt_document(&mut doc, password, options)?;
    let output = doc.to_bytes()?;
    tracing::info!("Encrypted document with {:?}", options.algorithm);
    Ok(output)
}

/// Remove encryption. A wrong password is
/// [`crate::PdfError::AuthenticationFailure`].
pub fn decrypt(bytes: &[u8], password: &str) -> Result<Vec<u8>> {
    let mut doc = Document::parse(bytes)?;
    encryption::decrypt_document(&mut doc, password)?;
    let output = doc.to_bytes()?;
    tracing::info!("Decrypted document ({} bytes)", output.len());
    Ok(output)
}

/// Recompress images as JPEG at `quality`. The input is returned unchanged
/// when no image was recompressed. An image that cannot be decoded fails
/// with [`crate::PdfError::UnsupportedFeature`] or [`crate::PdfError::Image`].
pub fn compress(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    compress_with(bytes, &RecompressOptions::with_quality(quality)).map(|(output, _)| output)
}

pub fn compress_with(bytes: &[u8], options: &RecompressOptions) -> Result<(Vec<u8>, RecompressReport)> {
    let mut doc = Document::parse(bytes)?;
    let report = images::recompress(&mut doc, options)?;
    let output = if report.is_noop() {
        bytes.to_vec()
    } else {
        doc.to_bytes()?
    };
    tracing::info!(
        "Recompressed {} of {} images ({} -> {} bytes)",
        report.images_recompressed,
        report.images_found,
        report.bytes_before,
        report.bytes_after
    );
    Ok((output, report))
}

/// Add `angle` degrees to the rotation of every page.
pub fn rotate(bytes: &[u8], angle: i64) -> Result<Vec<u8>> {
    let mut doc = Document::parse(bytes)?;
    operations::rotate(&mut doc, angle)?;
    let output = doc.to_bytes()?;
    tracing::info!("Rotated {} pages by {}", doc.page_count()?, angle);
    Ok(output)
}

pub fn is_encrypted(bytes: &[u8]) -> Result<bool> {
    Ok(Document::parse(bytes)?.is_encrypted())
}

/// What `pdfedit info` prints
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSummary {
    pub version: PdfVersion,
    pub encrypted: bool,
    /// The cross-reference data had to be rebuilt by scanning
    pub recovered: bool,
    /// First element of the trailer `ID`
    pub document_id: Option<Vec<u8>>,
    pub pages: Vec<PageInfo>,
}

pub fn inspect(bytes: &[u8]) -> Result<DocumentSummary> {
    let doc = Document::parse(bytes)?;
    let summary = DocumentSummary {
        version: doc.version(),
        encrypted: doc.is_encrypted(),
        recovered: doc.was_recovered(),
        document_id: doc.trailer().first_id().map(<[u8]>::to_vec),
        pages: doc.pages()?,
    };
    tracing::info!("Inspected document: {} pages", summary.pages.len());
    Ok(summary)
}
