//! Decoding image XObjects into pixel buffers
//!
//! Only what can be re-encoded as JPEG without losing information other
//! than through the JPEG quantisation itself is accepted. Anything else is
//! reported as [`PdfError::UnsupportedFeature`]. Images carrying
//! transparency are recognised up front by [`transparency`].

use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, Stream};
use image::{DynamicImage, GrayImage, RgbImage};

/// Filters that leave plain samples once removed
const SAMPLE_FILTERS: [&str; 8] = [
    "FlateDecode",
    "Fl",
    "ASCIIHexDecode",
    "AHx",
    "ASCII85Decode",
    "A85",
    "RunLengthDecode",
    "RL",
];

/// Pixels of a decoded image XObject
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// `ImageLuma8` or `ImageRgb8`
    pub image: DynamicImage,
    /// Whether the original `ColorSpace` entry still describes the pixels.
    /// Indexed and CMYK images are expanded to RGB and lose theirs.
    pub keeps_color_space: bool,
}

/// Colour spaces the sample decoder understands
#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Base space and `hival + 1` palette entries of base components
    Indexed(Box<ColorSpace>, Vec<u8>),
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
            ColorSpace::Indexed(..) => 1,
        }
    }
}

/// Decode the samples of an image XObject.
pub fn decode_image(doc: &Document, stream: &Stream) -> Result<DecodedImage> {
    let dict = stream.dictionary();

    if let Some(what) = transparency(doc, dict)? {
        return Err(unsupported(what));
    }
    if dict.contains_key("Decode") {
        return Err(unsupported("images with a Decode array"));
    }

    let filters = stream.filters();
    if filters.last().is_some_and(|f| matches!(*f, "DCTDecode" | "DCT")) {
        return decode_jpeg(stream);
    }
    if let Some(other) = filters.iter().find(|f| !SAMPLE_FILTERS.contains(*f)) {
        return Err(unsupported(&format!("image filter {other}")));
    }

    let width = dimension(doc, dict, "Width")?;
    let height = dimension(doc, dict, "Height")?;
    let bits = lookup(doc, dict, "BitsPerComponent")?
        .and_then(Object::as_integer)
        .unwrap_or(8);
    if bits != 8 {
        return Err(unsupported(&format!("{bits} bits per component")));
    }

    let color_space = match lookup(doc, dict, "ColorSpace")? {
        Some(value) => parse_color_space(doc, value)?,
        None => return Err(PdfError::Image("image has no ColorSpace".to_string())),
    };

    let needed = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(color_space.components()))
        .ok_or_else(|| PdfError::Image(format!("image of {width}x{height} pixels is too large")))?;
    // Raw samples cannot be smaller than the image; checked before inflating
    if stream.filters().is_empty() && stream.data().len() < needed {
        return Err(PdfError::Image(format!(
            "expected {needed} bytes of samples, found {}",
            stream.data().len()
        )));
    }

    let samples = stream.decoded_data()?;
    if samples.len() < needed {
        return Err(PdfError::Image(format!(
            "expected {needed} bytes of samples, found {}",
            samples.len()
        )));
    }
    let samples = &samples[..needed];

    let (image, keeps_color_space) = match &color_space {
        ColorSpace::Gray => (DynamicImage::ImageLuma8(gray_image(width, height, samples.to_vec())?), true),
        ColorSpace::Rgb => (DynamicImage::ImageRgb8(rgb_image(width, height, samples.to_vec())?), true),
        ColorSpace::Cmyk => (
            DynamicImage::ImageRgb8(rgb_image(width, height, cmyk_to_rgb(samples))?),
            false,
        ),
        ColorSpace::Indexed(base, palette) => {
            let rgb = expand_indexed(samples, base, palette);
            (DynamicImage::ImageRgb8(rgb_image(width, height, rgb)?), false)
        }
    };

    Ok(DecodedImage {
        image,
        keeps_color_space,
    })
}

/// Stencil masks and soft or explicit masks, which JPEG cannot carry
pub fn transparency(doc: &Document, dict: &Dictionary) -> Result<Option<&'static str>> {
    if lookup(doc, dict, "ImageMask")?.and_then(Object::as_bool) == Some(true) {
        return Ok(Some("stencil image masks"));
    }
    if dict.contains_key("SMask") {
        return Ok(Some("images with an SMask"));
    }
    if dict.contains_key("Mask") {
        return Ok(Some("images with a Mask"));
    }
    Ok(None)
}

fn decode_jpeg(stream: &Stream) -> Result<DecodedImage> {
    let data = stream.decoded_data()?;
    let decoded = image::load_from_memory_with_format(&data, image::ImageFormat::Jpeg)
        .map_err(|e| PdfError::Image(format!("JPEG decode failed: {e}")))?;

    // The decoder converts CMYK and YCCK to RGB
    let (image, keeps_color_space) = match decoded {
        DynamicImage::ImageLuma8(gray) => (DynamicImage::ImageLuma8(gray), true),
        DynamicImage::ImageRgb8(rgb) => (DynamicImage::ImageRgb8(rgb), true),
        other => (DynamicImage::ImageRgb8(other.to_rgb8()), false),
    };
    let keeps_color_space = keeps_color_space
        && !matches!(stream.dictionary().get_name("ColorSpace"), Some("DeviceCMYK"));

    Ok(DecodedImage {
        image,
        keeps_color_space,
    })
}

fn parse_color_space(doc: &Document, value: &Object) -> Result<ColorSpace> {
    let value = doc.resolve(value)?;
    if let Some(name) = value.as_name() {
        return match name {
            "DeviceGray" | "CalGray" | "G" => Ok(ColorSpace::Gray),
            "DeviceRGB" | "CalRGB" | "RGB" => Ok(ColorSpace::Rgb),
            "DeviceCMYK" | "CMYK" => Ok(ColorSpace::Cmyk),
            other => Err(unsupported(&format!("colour space {other}"))),
        };
    }

    let items = value
        .as_array()
        .ok_or_else(|| PdfError::Image(format!("colour space is a {}", value.type_name())))?;
    let family = items.first().and_then(Object::as_name).unwrap_or("");
    match family {
        "CalGray" => Ok(ColorSpace::Gray),
        "CalRGB" => Ok(ColorSpace::Rgb),
        "ICCBased" => {
            let profile = items
                .get(1)
                .map(|p| doc.resolve(p))
                .transpose()?
                .and_then(Object::as_dict)
                .ok_or_else(|| PdfError::Image("ICCBased colour space without a profile".to_string()))?;
            match profile.get("N").map(|n| doc.resolve(n)).transpose()?.and_then(Object::as_integer) {
                Some(1) => Ok(ColorSpace::Gray),
                Some(3) => Ok(ColorSpace::Rgb),
                Some(4) => Ok(ColorSpace::Cmyk),
                n => Err(unsupported(&format!("ICC profiles with N = {n:?}"))),
            }
        }
        "Indexed" | "I" => {
            let base = match items.get(1) {
                Some(base) => parse_color_space(doc, base)?,
                None => return Err(PdfError::Image("Indexed colour space without a base".to_string())),
            };
            if matches!(base, ColorSpace::Indexed(..)) {
                return Err(PdfError::Image("Indexed colour space over Indexed".to_string()));
            }
            let hival = items
                .get(2)
                .map(|h| doc.resolve(h))
                .transpose()?
                .and_then(Object::as_integer)
                .unwrap_or(255)
                .clamp(0, 255) as usize;
            let lookup_bytes = match items.get(3).map(|l| doc.resolve(l)).transpose()? {
                Some(Object::String(bytes)) => bytes.clone(),
                Some(Object::Stream(stream)) => stream.decoded_data()?,
                _ => return Err(PdfError::Image("Indexed colour space without a lookup table".to_string())),
            };
            let mut palette = lookup_bytes;
            palette.resize((hival + 1) * base.components(), 0);
            Ok(ColorSpace::Indexed(Box::new(base), palette))
        }
        other => Err(unsupported(&format!("colour space {other}"))),
    }
}

/// Naive CMYK to RGB, without a colour profile
fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u32::from(px[3]);
            let channel = |c: u8| ((255 - u32::from(c)) * k / 255) as u8;
            [channel(px[0]), channel(px[1]), channel(px[2])]
        })
        .collect()
}

/// Palette lookup; out-of-range indices take the last entry
fn expand_indexed(indices: &[u8], base: &ColorSpace, palette: &[u8]) -> Vec<u8> {
    let n = base.components();
    let entries = palette.len() / n;
    let mut base_samples = Vec::with_capacity(indices.len() * n);
    for &index in indices {
        let entry = (index as usize).min(entries.saturating_sub(1));
        base_samples.extend_from_slice(&palette[entry * n..entry * n + n]);
    }
    match base {
        ColorSpace::Gray => base_samples.iter().flat_map(|&g| [g, g, g]).collect(),
        ColorSpace::Cmyk => cmyk_to_rgb(&base_samples),
        _ => base_samples,
    }
}

fn gray_image(width: u32, height: u32, samples: Vec<u8>) -> Result<GrayImage> {
    GrayImage::from_raw(width, height, samples)
        .ok_or_else(|| PdfError::Image("sample buffer does not match dimensions".to_string()))
}

fn rgb_image(width: u32, height: u32, samples: Vec<u8>) -> Result<RgbImage> {
    RgbImage::from_raw(width, height, samples)
        .ok_or_else(|| PdfError::Image("sample buffer does not match dimensions".to_string()))
}

fn lookup<'a>(doc: &'a Document, dict: &'a Dictionary, key: &str) -> Result<Option<&'a Object>> {
    dict.get(key).map(|value| doc.resolve(value)).transpose()
}

fn dimension(doc: &Document, dict: &Dictionary, key: &str) -> Result<u32> {
    lookup(doc, dict, key)?
        .and_then(Object::as_integer)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|&n| n > 0)
        .ok_or_else(|| PdfError::Image(format!("image has no valid {key}")))
}

fn unsupported(what: &str) -> PdfError {
    PdfError::UnsupportedFeature(format!("cannot recompress {what}"))
}
