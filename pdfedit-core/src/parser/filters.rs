//! PDF Stream Filters
//!
//! Handles decompression and decoding of PDF streams according to ISO 32000-1 Section 7.4

use super::{ParseError, ParseResult};
use crate::objects::{Dictionary, Object};

/// Supported PDF filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    ASCIIHexDecode,
    ASCII85Decode,
    LZWDecode,
    FlateDecode,
    RunLengthDecode,
    CCITTFaxDecode,
    JBIG2Decode,
    /// DCT decode (JPEG). Decoded bytes are the JPEG file itself.
    DCTDecode,
    JPXDecode,
    Crypt,
}

impl Filter {
    /// Parse filter from name, including the abbreviations allowed in inline images
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "LZWDecode" | "LZW" => Some(Filter::LZWDecode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            "CCITTFaxDecode" | "CCF" => Some(Filter::CCITTFaxDecode),
            "JBIG2Decode" => Some(Filter::JBIG2Decode),
            "DCTDecode" | "DCT" => Some(Filter::DCTDecode),
            "JPXDecode" => Some(Filter::JPXDecode),
            "Crypt" => Some(Filter::Crypt),
            _ => None,
        }
    }
}

/// Filter chain of a stream dictionary, paired with each filter's parameters.
pub fn filter_chain(dict: &Dictionary) -> ParseResult<Vec<(Filter, Option<&Dictionary>)>> {
    let names: Vec<&str> = match dict.get("Filter") {
        None | Some(Object::Null) => return Ok(Vec::new()),
        Some(Object::Name(name)) => vec![name.as_str()],
        Some(Object::Array(array)) => array
            .iter()
            .map(|obj| {
                obj.as_name()
                    .ok_or_else(|| ParseError::StreamDecodeError("Invalid filter in array".to_string()))
            })
            .collect::<ParseResult<_>>()?,
        Some(other) => {
            return Err(ParseError::StreamDecodeError(format!(
                "Invalid Filter type: {}",
                other.type_name()
            )))
        }
    };

    let params: Vec<Option<&Dictionary>> = match dict.get("DecodeParms") {
        Some(Object::Dictionary(d)) => vec![Some(d)],
        Some(Object::Array(array)) => array.iter().map(Object::as_dict).collect(),
        _ => Vec::new(),
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let filter = Filter::from_name(name).ok_or_else(|| {
                ParseError::StreamDecodeError(format!("Unknown filter: {name}"))
            })?;
            Ok((filter, params.get(i).copied().flatten()))
        })
        .collect()
}

/// Decode stream data according to specified filters.
///
/// A trailing DCTDecode is left in place, so JPEG images come back as JPEG bytes.
pub fn decode_stream(data: &[u8], dict: &Dictionary) -> ParseResult<Vec<u8>> {
    let chain = filter_chain(dict)?;
    let mut result = data.to_vec();

    for (filter, params) in chain {
        result = apply_filter(&result, filter, params)?;
    }

    Ok(result)
}

/// Apply a single filter to data
fn apply_filter(data: &[u8], filter: Filter, params: Option<&Dictionary>) -> ParseResult<Vec<u8>> {
    match filter {
        Filter::FlateDecode => {
            let inflated = decode_flate(data)?;
            match params {
                Some(params) => apply_predictor(inflated, params),
                None => Ok(inflated),
            }
        }
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
        Filter::RunLengthDecode => decode_run_length(data),
        Filter::DCTDecode => Ok(data.to_vec()),
        // Crypt filters are applied by the security handler
        Filter::Crypt => Ok(data.to_vec()),
        other => Err(ParseError::StreamDecodeError(format!(
            "Filter {other:?} is not supported"
        ))),
    }
}

fn decode_flate(data: &[u8]) -> ParseResult<Vec<u8>> {
    crate::compression::decompress_lenient(data)
        .map_err(|e| ParseError::StreamDecodeError(format!("Flate decode error: {e}")))
}

/// Decode ASCIIHexDecode data
fn decode_ascii_hex(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut digits = Vec::with_capacity(data.len());
    for &ch in data {
        match ch {
            b'>' => break,
            _ if ch.is_ascii_whitespace() || ch == 0 => continue,
            _ => digits.push(hex_digit_value(ch).ok_or_else(|| {
                ParseError::StreamDecodeError(format!("Invalid hex digit: {}", ch as char))
            })?),
        }
    }
    // Odd count: the last digit is followed by an implied 0
    if digits.len() % 2 != 0 {
        digits.push(0);
    }
    Ok(digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

/// Decode ASCII85Decode data
fn decode_ascii85(data: &[u8]) -> ParseResult<Vec<u8>> {
    let body = data.strip_prefix(b"<~").unwrap_or(data);
    let mut result = Vec::with_capacity(body.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut count = 0;

    for &ch in body {
        match ch {
            b'~' => break,
            b'z' if count == 0 => result.extend_from_slice(&[0; 4]),
            b'!'..=b'u' => {
                group[count] = ch - b'!';
                count += 1;
                if count == 5 {
                    result.extend_from_slice(&ascii85_group(&group)?);
                    count = 0;
                }
            }
            _ if ch.is_ascii_whitespace() || ch == 0 => {}
            _ => {
                return Err(ParseError::StreamDecodeError(format!(
                    "Invalid ASCII85 character: {}",
                    ch as char
                )))
            }
        }
    }

    match count {
        0 => {}
        1 => {
            return Err(ParseError::StreamDecodeError(
                "ASCII85 data ends with a single character".to_string(),
            ))
        }
        n => {
            // Pad with 'u' and keep n - 1 bytes
            for slot in group.iter_mut().skip(n) {
                *slot = b'u' - b'!';
            }
            result.extend_from_slice(&ascii85_group(&group)?[..n - 1]);
        }
    }

    Ok(result)
}

fn ascii85_group(group: &[u8; 5]) -> ParseResult<[u8; 4]> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + u64::from(digit));
    u32::try_from(value)
        .map(u32::to_be_bytes)
        .map_err(|_| ParseError::StreamDecodeError("ASCII85 group out of range".to_string()))
}

/// Decode RunLengthDecode data
fn decode_run_length(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let n = length as usize + 1;
                let literal = data.get(i..i + n).ok_or_else(|| {
                    ParseError::StreamDecodeError("RunLength literal run is truncated".to_string())
                })?;
                result.extend_from_slice(literal);
                i += n;
            }
            _ => {
                let byte = *data.get(i).ok_or_else(|| {
                    ParseError::StreamDecodeError("RunLength repeat run is truncated".to_string())
                })?;
                result.extend(std::iter::repeat(byte).take(257 - length as usize));
                i += 1;
            }
        }
    }

    Ok(result)
}

/// Undo the `Predictor` transform described by FlateDecode parameters.
fn apply_predictor(data: Vec<u8>, params: &Dictionary) -> ParseResult<Vec<u8>> {
    let predictor = params.get_integer("Predictor").unwrap_or(1);
    if predictor <= 1 {
        return Ok(data);
    }

    let colors = predictor_param(params, "Colors", 1)?;
    if colors > MAX_PREDICTOR_COLORS {
        return Err(ParseError::StreamDecodeError(format!(
            "Predictor Colors {colors} exceeds {MAX_PREDICTOR_COLORS}"
        )));
    }
    let bits = predictor_param(params, "BitsPerComponent", 8)?;
    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return Err(ParseError::StreamDecodeError(format!(
            "Invalid predictor BitsPerComponent {bits}"
        )));
    }
    let columns = predictor_param(params, "Columns", 1)?;

    let bits_per_pixel = colors * bits;
    let bytes_per_pixel = bits_per_pixel.div_ceil(8);
    let row_len = columns
        .checked_mul(bits_per_pixel)
        .and_then(|row_bits| row_bits.checked_add(7))
        .map(|row_bits| row_bits / 8)
        .ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Predictor row of {columns} columns is too long"))
        })?;

    if data.is_empty() {
        return Ok(data);
    }
    if row_len > data.len() {
        return Err(ParseError::StreamDecodeError(format!(
            "Predictor row of {row_len} bytes exceeds the {} bytes of data",
            data.len()
        )));
    }

    match predictor {
        2 => tiff_predictor(data, row_len, bytes_per_pixel, bits),
        10..=15 => png_predictor(&data, row_len, bytes_per_pixel),
        other => Err(ParseError::StreamDecodeError(format!(
            "Unsupported predictor {other}"
        ))),
    }
}

const MAX_PREDICTOR_COLORS: usize = 32;

/// A positive integer from `DecodeParms`
fn predictor_param(params: &Dictionary, key: &str, default: i64) -> ParseResult<usize> {
    let value = params.get_integer(key).unwrap_or(default);
    usize::try_from(value)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ParseError::StreamDecodeError(format!("Invalid predictor {key} {value}")))
}

fn tiff_predictor(
    mut data: Vec<u8>,
    row_len: usize,
    bytes_per_pixel: usize,
    bits: usize,
) -> ParseResult<Vec<u8>> {
    if bits != 8 {
        return Err(ParseError::StreamDecodeError(format!(
            "TIFF predictor with {bits} bits per component is not supported"
        )));
    }
    for row in data.chunks_mut(row_len) {
        for i in bytes_per_pixel..row.len() {
            row[i] = row[i].wrapping_add(row[i - bytes_per_pixel]);
        }
    }
    Ok(data)
}

fn png_predictor(data: &[u8], row_len: usize, bpp: usize) -> ParseResult<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let (&filter_type, encoded) = match chunk.split_first() {
            Some(split) => split,
            None => break,
        };
        let mut row = encoded.to_vec();

        for i in 0..row.len() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let upper_left = if i >= bpp { previous[i - bpp] } else { 0 };

            let predicted = match filter_type {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, upper_left),
                other => {
                    return Err(ParseError::StreamDecodeError(format!(
                        "Invalid PNG filter type {other}"
                    )))
                }
            };
            row[i] = row[i].wrapping_add(predicted);
        }

        previous[..row.len()].copy_from_slice(&row);
        result.extend_from_slice(&row);
    }

    Ok(result)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict_with_filter(filter: Object) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", filter);
        dict
    }

    #[test]
    fn test_no_filter_is_identity() {
        assert_eq!(decode_stream(b"plain", &Dictionary::new()).unwrap(), b"plain");
    }

    #[test]
    fn test_ascii_hex_decode() {
        assert_eq!(decode_ascii_hex(b"48 65 6C6C6F>").unwrap(), b"Hello");
        assert_eq!(decode_ascii_hex(b"7>").unwrap(), vec![0x70]);
        assert!(decode_ascii_hex(b"zz>").is_err());
    }

    #[test]
    fn test_ascii85_decode() {
        assert_eq!(decode_ascii85(b"<~87cURD]i,\"Ebo80~>").unwrap(), b"Hello World!");
        assert_eq!(decode_ascii85(b"z~>").unwrap(), vec![0, 0, 0, 0]);
        assert!(decode_ascii85(b"\x7f~>").is_err());
    }

    #[test]
    fn test_ascii85_rejects_overflowing_group() {
        assert!(decode_ascii85(b"uuuuu~>").is_err());
    }

    #[test]
    fn test_run_length_decode() {
        // literal "abc", then 'x' repeated 4 times, then EOD
        let data = [2, b'a', b'b', b'c', 253, b'x', 128];
        assert_eq!(decode_run_length(&data).unwrap(), b"abcxxxx");
        assert!(decode_run_length(&[5, b'a']).is_err());
    }

    #[test]
    fn test_filter_chain_hex_then_flate() {
        let compressed = crate::compression::compress(b"stream content").unwrap();
        let hex: Vec<u8> = compressed
            .iter()
            .flat_map(|b| format!("{b:02X}").into_bytes())
            .chain(*b">")
            .collect();

        let dict = dict_with_filter(Object::Array(vec![
            Object::name("ASCIIHexDecode"),
            Object::name("FlateDecode"),
        ]));
        assert_eq!(decode_stream(&hex, &dict).unwrap(), b"stream content");
    }

    #[test]
    fn test_png_up_predictor() {
        // two rows of 3 bytes, filter type 2 (Up) on the second row
        let raw = vec![0, 1, 2, 3, 2, 1, 1, 1];
        let compressed = crate::compression::compress(&raw).unwrap();

        let mut params = Dictionary::new();
        params.set("Predictor", 12);
        params.set("Columns", 3);
        let mut dict = dict_with_filter(Object::name("FlateDecode"));
        dict.set("DecodeParms", params);

        assert_eq!(decode_stream(&compressed, &dict).unwrap(), vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_png_sub_and_paeth_predictors() {
        let sub = png_predictor(&[1, 10, 5, 5], 3, 1).unwrap();
        assert_eq!(sub, vec![10, 15, 20]);

        let rows = [0, 10, 20, 4, 1, 1];
        let decoded = png_predictor(&rows, 2, 1).unwrap();
        // paeth(0, 10, 0) = 10, then paeth(11, 20, 10) = 20
        assert_eq!(decoded, vec![10, 20, 11, 21]);
    }

    #[test]
    fn test_tiff_predictor() {
        let decoded = tiff_predictor(vec![10, 1, 1, 5, 5, 5], 3, 1, 8).unwrap();
        assert_eq!(decoded, vec![10, 11, 12, 5, 10, 15]);
        assert!(tiff_predictor(vec![0; 4], 2, 1, 4).is_err());
    }

    #[test]
    fn test_hostile_predictor_parameters() {
        let compressed = crate::compression::compress(&[0, 1, 2, 3]).unwrap();
        let decode = |key: &str, value: i64| {
            let mut params = Dictionary::new();
            params.set("Predictor", 12);
            params.set(key, value);
            let mut dict = dict_with_filter(Object::name("FlateDecode"));
            dict.set("DecodeParms", params);
            decode_stream(&compressed, &dict)
        };

        for (key, value) in [
            ("Columns", 4_611_686_018_427_387_904),
            ("Columns", i64::MAX),
            ("Columns", 1_000),
            ("Columns", -3),
            ("Colors", 33),
            ("Colors", 0),
            ("BitsPerComponent", 3),
            ("BitsPerComponent", i64::MIN),
        ] {
            assert!(
                matches!(decode(key, value), Err(ParseError::StreamDecodeError(_))),
                "{key} {value}"
            );
        }
        assert_eq!(decode("Columns", 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_dct_is_passed_through() {
        let dict = dict_with_filter(Object::name("DCTDecode"));
        assert_eq!(decode_stream(b"\xFF\xD8jpeg", &dict).unwrap(), b"\xFF\xD8jpeg");
    }

    #[test]
    fn test_unsupported_and_unknown_filters() {
        let dict = dict_with_filter(Object::name("JBIG2Decode"));
        assert!(matches!(
            decode_stream(b"", &dict),
            Err(ParseError::StreamDecodeError(_))
        ));

        let dict = dict_with_filter(Object::name("NoSuchDecode"));
        assert!(decode_stream(b"", &dict).is_err());
    }
}
