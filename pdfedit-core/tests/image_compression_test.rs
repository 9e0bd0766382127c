//! Image recompression through serialized documents

mod common;

use common::{labelled_document, numbered_pdf, texts_of};
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, RgbImage};
use pdfedit::images::ImageDetection;
use pdfedit::objects::{Dictionary, Object, ObjectId, Stream};
use pdfedit::{api, Document, PdfError, RecompressOptions};
use pretty_assertions::assert_eq;

fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect()
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::name("XObject"));
    dict.set("Subtype", Object::name("Image"));
    dict.set("Width", width);
    dict.set("Height", height);
    dict.set("BitsPerComponent", 8);
    dict.set("ColorSpace", Object::name(color_space));
    dict
}

/// Flate-compressed raw RGB noise
fn raw_rgb_stream(width: u32, height: u32) -> Stream {
    let samples = noise((width * height * 3) as usize, 7);
    let mut stream = Stream::new(image_dict(width, height, "DeviceRGB"), samples);
    stream.compress_flate().unwrap();
    stream
}

fn raw_gray_stream(width: u32, height: u32) -> Stream {
    let samples = noise((width * height) as usize, 11);
    Stream::new(image_dict(width, height, "DeviceGray"), samples)
}

fn jpeg_stream(width: u32, height: u32, quality: u8) -> Stream {
    let image = RgbImage::from_raw(width, height, noise((width * height * 3) as usize, 3)).unwrap();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&image)
        .unwrap();
    let mut stream = Stream::new(image_dict(width, height, "DeviceRGB"), jpeg);
    stream.set_filter("DCTDecode");
    stream
}

/// One page drawing each image under its resource name
fn document_with_images(images: Vec<(&str, Stream)>) -> (Document, Vec<ObjectId>) {
    let mut doc = labelled_document(&["pictures"]);
    let page = doc.page_id(1).unwrap();

    let mut xobjects = Dictionary::new();
    let mut ids = Vec::new();
    for (name, stream) in images {
        let id = doc.add_object(stream);
        xobjects.set(name, id);
        ids.push(id);
    }
    let mut resources = Dictionary::new();
    resources.set("XObject", xobjects);
    doc.get_dict_mut(page).unwrap().set("Resources", resources);
    (doc, ids)
}

fn image_stream(bytes: &[u8], id: ObjectId) -> Stream {
    let doc = Document::parse(bytes).unwrap();
    doc.get(id).unwrap().as_stream().unwrap().clone()
}

#[test]
fn test_high_quality_jpeg_is_shrunk() {
    let (doc, ids) = document_with_images(vec![("Im0", jpeg_stream(96, 96, 100))]);
    let input = doc.to_bytes().unwrap();

    let (output, report) = api::compress_with(&input, &RecompressOptions::with_quality(30)).unwrap();
    assert_eq!(report.images_found, 1);
    assert_eq!(report.images_recompressed, 1);
    assert!(report.bytes_after < report.bytes_before);
    assert!(output.len() < input.len());

    let stream = image_stream(&output, ids[0]);
    assert_eq!(stream.filters(), vec!["DCTDecode"]);
    let decoded = image::load_from_memory(stream.data()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (96, 96));
    assert_eq!(texts_of(&output), vec!["pictures"]);
}

#[test]
fn test_raw_images_become_jpeg() {
    let (doc, ids) = document_with_images(vec![
        ("Im0", raw_rgb_stream(32, 24)),
        ("Im1", raw_gray_stream(16, 16)),
    ]);
    let options = RecompressOptions {
        only_if_smaller: false,
        ..RecompressOptions::default()
    };

    let (output, report) = api::compress_with(&doc.to_bytes().unwrap(), &options).unwrap();
    assert_eq!(report.images_recompressed, 2);

    let rgb = image_stream(&output, ids[0]);
    assert_eq!(rgb.filters(), vec!["DCTDecode"]);
    assert_eq!(rgb.dictionary().get_name("ColorSpace"), Some("DeviceRGB"));
    assert_eq!(rgb.dictionary().get_integer("Width"), Some(32));
    assert_eq!(rgb.dictionary().get_integer("Height"), Some(24));

    let gray = image_stream(&output, ids[1]);
    assert_eq!(gray.dictionary().get_name("ColorSpace"), Some("DeviceGray"));
    let decoded = image::load_from_memory(gray.data()).unwrap();
    assert_eq!(decoded.color(), image::ColorType::L8);
}

#[test]
fn test_no_images_returns_input_untouched() {
    let input = numbered_pdf(2);
    let (output, report) = api::compress_with(&input, &RecompressOptions::default()).unwrap();
    assert_eq!(output, input);
    assert!(report.is_noop());
    assert_eq!(report.images_found, 0);
}

#[test]
fn test_detection_modes() {
    let (doc, _) = document_with_images(vec![("Photo", jpeg_stream(48, 48, 100))]);
    let input = doc.to_bytes().unwrap();

    let named = RecompressOptions {
        detection: ImageDetection::NamedIm0,
        ..RecompressOptions::with_quality(20)
    };
    let (output, report) = api::compress_with(&input, &named).unwrap();
    assert_eq!(report.images_found, 0);
    assert_eq!(output, input);

    let (_, report) = api::compress_with(&input, &RecompressOptions::with_quality(20)).unwrap();
    assert_eq!(report.images_found, 1);
    assert_eq!(report.images_recompressed, 1);
}

#[test]
fn test_masked_image_is_left_alone() {
    let mut masked = raw_rgb_stream(16, 16);
    let mask = GrayImage::new(16, 16).into_raw();
    let (mut doc, ids) = document_with_images(vec![("Im0", raw_gray_stream(4, 4))]);
    let mask = doc.add_object(Stream::new(image_dict(16, 16, "DeviceGray"), mask));
    masked.dictionary_mut().set("SMask", mask);
    doc.insert(ids[0], masked.clone());

    let options = RecompressOptions {
        only_if_smaller: false,
        ..RecompressOptions::default()
    };
    let input = doc.to_bytes().unwrap();
    let (output, report) = api::compress_with(&input, &options).unwrap();
    assert_eq!(report.images_recompressed, 0);
    assert_eq!(report.images_skipped, 1);
    assert_eq!(output, input);
    assert_eq!(image_stream(&output, ids[0]).data(), masked.data());
}

#[test]
fn test_quality_is_clamped() {
    let (doc, _) = document_with_images(vec![("Im0", raw_rgb_stream(16, 16))]);
    let options = RecompressOptions {
        quality: 0,
        only_if_smaller: false,
        ..RecompressOptions::default()
    };
    let (_, report) = api::compress_with(&doc.to_bytes().unwrap(), &options).unwrap();
    assert_eq!(report.images_recompressed, 1);
}

#[test]
fn test_unsupported_image_filter_is_an_error() {
    let mut jpx = Stream::new(image_dict(8, 8, "DeviceRGB"), noise(64, 5));
    jpx.set_filter("JPXDecode");
    let (doc, _) = document_with_images(vec![("Im0", jpx)]);

    let result = api::compress(&doc.to_bytes().unwrap(), 50);
    assert!(matches!(result, Err(PdfError::UnsupportedFeature(_))), "{result:?}");
}

#[test]
fn test_unsupported_bit_depth_is_an_error() {
    let mut bilevel = Stream::new(image_dict(16, 2, "DeviceGray"), vec![0b1010_1010; 4]);
    bilevel.dictionary_mut().set("BitsPerComponent", 1);
    let (doc, _) = document_with_images(vec![("Im0", raw_gray_stream(8, 8)), ("Im1", bilevel)]);

    let result = api::compress_with(&doc.to_bytes().unwrap(), &RecompressOptions::default());
    assert!(matches!(result, Err(PdfError::UnsupportedFeature(_))));
}
