//! Finding image XObjects and replacing them with JPEG re-encodings

use super::decode::{decode_image, transparency, DecodedImage};
use super::{ImageDetection, RecompressOptions, RecompressReport};
use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId, Stream};
use crate::operations::ensure_decrypted;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::collections::HashSet;

/// Image XObjects used by the pages, in page order, each listed once.
pub fn find_images(doc: &Document, detection: ImageDetection) -> Result<Vec<ObjectId>> {
    let mut images = Vec::new();
    let mut seen = HashSet::new();

    for page in doc.page_ids()? {
        let resources = match doc.inherited_attribute(page, "Resources")? {
            Some(resources) => resources,
            None => continue,
        };
        match detection {
            ImageDetection::AnySubtype => collect_images(doc, resources, &mut images, &mut seen)?,
            ImageDetection::NamedIm0 => {
                let candidate = xobject_dict(doc, resources)?.and_then(|x| x.get_reference("Im0"));
                if let Some(id) = candidate {
                    if is_image(doc, id)? && seen.insert(id) {
                        images.push(id);
                    }
                }
            }
        }
    }

    tracing::debug!("Found {} image XObjects", images.len());
    Ok(images)
}

/// Images in a resource dictionary and, through form XObjects, below it
fn collect_images<'a>(
    doc: &'a Document,
    resources: &'a Object,
    images: &mut Vec<ObjectId>,
    seen: &mut HashSet<ObjectId>,
) -> Result<()> {
    let mut pending = vec![resources];

    while let Some(resources) = pending.pop() {
        let xobjects = match xobject_dict(doc, resources)? {
            Some(xobjects) => xobjects,
            None => continue,
        };
        for value in xobjects.values() {
            let id = match value.as_reference() {
                Some(id) if doc.contains(id) => id,
                _ => continue,
            };
            if !seen.insert(id) {
                continue;
            }
            let dict = match doc.get(id)?.as_stream() {
                Some(stream) => stream.dictionary(),
                None => continue,
            };
            match dict.get_name("Subtype") {
                Some("Image") => images.push(id),
                Some("Form") => {
                    if let Some(nested) = dict.get("Resources") {
                        pending.push(nested);
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn xobject_dict<'a>(doc: &'a Document, resources: &'a Object) -> Result<Option<&'a Dictionary>> {
    let resources = match doc.resolve(resources)?.as_dict() {
        Some(resources) => resources,
        None => return Ok(None),
    };
    match resources.get("XObject") {
        Some(xobjects) => Ok(doc.resolve(xobjects)?.as_dict()),
        None => Ok(None),
    }
}

fn is_image(doc: &Document, id: ObjectId) -> Result<bool> {
    if !doc.contains(id) {
        return Ok(false);
    }
    Ok(doc
        .get(id)?
        .as_stream()
        .is_some_and(|stream| stream.dictionary().get_name("Subtype") == Some("Image")))
}

/// Re-encode the document's images as JPEG.
///
/// Images with transparency are left alone and counted as skipped, and so
/// are images whose JPEG would not be smaller when
/// [`RecompressOptions::only_if_smaller`] is set. Any other image that cannot
/// be decoded fails the whole operation, usually with
/// [`PdfError::UnsupportedFeature`], and the document is not modified.
pub fn recompress(doc: &mut Document, options: &RecompressOptions) -> Result<RecompressReport> {
    ensure_decrypted(doc, "recompress images in")?;

    let images = find_images(doc, options.detection)?;
    let quality = options.effective_quality();
    let mut report = RecompressReport {
        images_found: images.len(),
        ..RecompressReport::default()
    };

    // Encode everything first so a failure leaves the document untouched
    let mut replacements = Vec::new();
    for id in images {
        let stream = match doc.get(id)?.as_stream() {
            Some(stream) => stream,
            None => continue,
        };
        let original_len = stream.data().len();
        report.bytes_before += original_len;

        if let Some(what) = transparency(doc, stream.dictionary())? {
            tracing::warn!("Skipping image {}: cannot recompress {}", id, what);
            report.images_skipped += 1;
            report.bytes_after += original_len;
            continue;
        }

        let (decoded, jpeg) = reencode(doc, stream, quality).map_err(|e| {
            tracing::warn!("Cannot recompress image {}: {}", id, e);
            e
        })?;

        if options.only_if_smaller && jpeg.len() >= original_len {
            tracing::debug!(
                "Keeping image {}: JPEG is not smaller ({} >= {} bytes)",
                id,
                jpeg.len(),
                original_len
            );
            report.images_skipped += 1;
            report.bytes_after += original_len;
            continue;
        }

        report.images_recompressed += 1;
        report.bytes_after += jpeg.len();
        replacements.push((id, decoded, jpeg));
    }

    for (id, decoded, jpeg) in replacements {
        let stream = doc
            .get_mut(id)?
            .as_stream_mut()
            .ok_or_else(|| PdfError::InvalidStructure(format!("image {id} is not a stream")))?;
        replace_with_jpeg(stream, &decoded, jpeg);
    }

    tracing::debug!(
        "Recompressed {}/{} images: {} -> {} bytes",
        report.images_recompressed,
        report.images_found,
        report.bytes_before,
        report.bytes_after
    );
    Ok(report)
}

fn reencode(doc: &Document, stream: &Stream, quality: u8) -> Result<(DecodedImage, Vec<u8>)> {
    let decoded = decode_image(doc, stream)?;
    let jpeg = encode_jpeg(&decoded.image, quality)?;
    Ok((decoded, jpeg))
}

/// JPEG bytes of a gray or RGB image
pub(crate) fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut jpeg = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
        match image {
            DynamicImage::ImageLuma8(gray) => encoder.encode_image(gray),
            other => encoder.encode_image(&other.to_rgb8()),
        }
        .map_err(|e| PdfError::Image(format!("JPEG encode failed: {e}")))?;
    }
    Ok(jpeg)
}

fn replace_with_jpeg(stream: &mut Stream, decoded: &DecodedImage, jpeg: Vec<u8>) {
    let dict = stream.dictionary_mut();
    dict.remove("DecodeParms");
    dict.set("Filter", Object::name("DCTDecode"));
    dict.set("BitsPerComponent", 8);
    dict.set("Width", decoded.image.width());
    dict.set("Height", decoded.image.height());
    if !decoded.keeps_color_space || !dict.contains_key("ColorSpace") {
        let space = match decoded.image {
            DynamicImage::ImageLuma8(_) => "DeviceGray",
            _ => "DeviceRGB",
        };
        dict.set("ColorSpace", Object::name(space));
    }
    stream.set_data(jpeg);
}
