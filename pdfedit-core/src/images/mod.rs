//! Re-encoding of embedded raster images as JPEG
//!
//! [`recompress`] finds the image XObjects used by the document's pages,
//! decodes them (see [`decode`]) and replaces their stream bodies with JPEG
//! data at the requested quality.

pub mod decode;
mod recompress;

pub use decode::{decode_image, DecodedImage};
pub use recompress::{find_images, recompress};

/// Which XObjects count as images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageDetection {
    /// Every XObject with `/Subtype /Image`, including those inside form
    /// XObjects
    #[default]
    AnySubtype,
    /// Only a page-level XObject named `Im0`
    NamedIm0,
}

/// Options for [`recompress`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecompressOptions {
    /// JPEG quality, clamped into 1..=100
    pub quality: u8,
    pub detection: ImageDetection,
    /// Keep the original stream when the JPEG is not smaller
    pub only_if_smaller: bool,
}

impl RecompressOptions {
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }

    pub(crate) fn effective_quality(&self) -> u8 {
        self.quality.clamp(1, 100)
    }
}

impl Default for RecompressOptions {
    fn default() -> Self {
        Self {
            quality: 75,
            detection: ImageDetection::default(),
            only_if_smaller: true,
        }
    }
}

/// What [`recompress`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecompressReport {
    pub images_found: usize,
    pub images_recompressed: usize,
    /// Images left as they were: masked, or not smaller as JPEG
    pub images_skipped: usize,
    /// Encoded size of every found image before
    pub bytes_before: usize,
    /// and after
    pub bytes_after: usize,
}

impl RecompressReport {
    /// True when the document was not changed
    pub fn is_noop(&self) -> bool {
        self.images_recompressed == 0
    }
}
