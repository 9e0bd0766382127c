//! Cross-reference streams (ISO 32000-1 Section 7.5.8)
//!
//! PDF 1.5 files may store their xref as a binary stream with `W`-sized
//! big-endian fields instead of the classic text table.

use super::lexer::Lexer;
use super::objects::parse_indirect_object;
use super::xref::XRefEntry;
use super::{ParseError, ParseOptions, ParseResult};
use crate::objects::{Dictionary, Object, Stream};

/// Cross-reference stream parser
#[derive(Debug)]
pub struct XRefStream {
    /// Stream dictionary, which doubles as the trailer for this section
    pub dict: Dictionary,
    /// Decoded stream data
    pub data: Vec<u8>,
    /// Field widths from W array
    pub widths: [usize; 3],
    /// Index array (pairs of [first_object_number, count])
    pub index: Vec<(u32, u32)>,
}

impl XRefStream {
    /// Read the xref stream object that starts at `offset`.
    pub fn parse_at(data: &[u8], offset: usize, options: &ParseOptions) -> ParseResult<Self> {
        let mut lexer = Lexer::at(data, offset);
        // An xref stream's Length is always direct
        let (id, object) = parse_indirect_object(&mut lexer, options, &|_| None)?;
        match object {
            Object::Stream(stream) => Self::parse(stream),
            other => Err(ParseError::InvalidXRef(format!(
                "object {id} at offset {offset} is a {}, not an xref stream",
                other.type_name()
            ))),
        }
    }

    /// Interpret a decoded cross-reference stream
    pub fn parse(stream: Stream) -> ParseResult<Self> {
        let decoded = stream.decoded_data()?;
        let (dict, _) = stream.into_parts();

        if dict.get_type().is_some_and(|t| t != "XRef") {
            return Err(ParseError::InvalidXRef(
                "stream is not of /Type /XRef".to_string(),
            ));
        }

        let widths = dict
            .get("W")
            .and_then(Object::as_array)
            .ok_or_else(|| ParseError::MissingKey("W".to_string()))?
            .iter()
            .map(|obj| {
                obj.as_integer()
                    .and_then(|n| usize::try_from(n).ok())
                    .filter(|&n| n <= 8)
                    .ok_or_else(|| ParseError::InvalidXRef("Invalid width in W array".to_string()))
            })
            .collect::<ParseResult<Vec<_>>>()?;

        let widths: [usize; 3] = widths.try_into().map_err(|w: Vec<usize>| {
            ParseError::InvalidXRef(format!("W array must have 3 elements, found {}", w.len()))
        })?;

        let index = match dict.get("Index").and_then(Object::as_array) {
            Some(array) => array
                .chunks_exact(2)
                .map(|pair| {
                    let first = pair[0].as_integer().and_then(|n| u32::try_from(n).ok());
                    let count = pair[1].as_integer().and_then(|n| u32::try_from(n).ok());
                    first.zip(count).ok_or_else(|| {
                        ParseError::InvalidXRef("Invalid entry in Index array".to_string())
                    })
                })
                .collect::<ParseResult<Vec<_>>>()?,
            None => {
                let size = dict
                    .get_integer("Size")
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| ParseError::MissingKey("Size".to_string()))?;
                vec![(0, size)]
            }
        };

        Ok(XRefStream {
            dict,
            data: decoded,
            widths,
            index,
        })
    }

    /// Convert the cross-reference stream to table entries
    pub fn to_xref_entries(&self) -> ParseResult<Vec<(u32, XRefEntry)>> {
        let entry_size: usize = self.widths.iter().sum();
        if entry_size == 0 {
            return Err(ParseError::InvalidXRef(
                "Invalid entry size (0) in xref stream".to_string(),
            ));
        }

        let mut entries = Vec::new();
        let mut rows = self.data.chunks_exact(entry_size);

        for &(first, count) in &self.index {
            for i in 0..count {
                let row = rows.next().ok_or_else(|| {
                    ParseError::truncated(format!(
                        "xref stream holds fewer than the {count} entries its Index declares"
                    ))
                })?;

                let (type_field, rest) = row.split_at(self.widths[0]);
                let (field2, field3) = rest.split_at(self.widths[1]);
                // A zero-width type field means type 1
                let entry_type = if self.widths[0] == 0 {
                    1
                } else {
                    read_field(type_field)
                };
                let field2 = read_field(field2);
                let field3 = read_field(field3);

                let entry = match entry_type {
                    0 => XRefEntry::Free {
                        next_free: field2 as u32,
                        generation: field3 as u16,
                    },
                    1 => XRefEntry::InUse {
                        offset: field2 as usize,
                        generation: field3 as u16,
                    },
                    2 => XRefEntry::Compressed {
                        stream_number: field2 as u32,
                        index: field3 as u32,
                    },
                    // Unknown types are references to the null object
                    other => {
                        tracing::debug!("Ignoring xref stream entry of type {}", other);
                        continue;
                    }
                };

                entries.push((first.saturating_add(i), entry));
            }
        }

        Ok(entries)
    }
}

/// Read a big-endian field
pub(crate) fn read_field(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |value, &byte| (value << 8) | u64::from(byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xref_stream(rows: &[[u8; 4]], index: Option<Vec<Object>>) -> Stream {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("XRef"));
        dict.set("Size", rows.len());
        dict.set("W", vec![Object::from(1), Object::from(2), Object::from(1)]);
        if let Some(index) = index {
            dict.set("Index", index);
        }
        Stream::new(dict, rows.concat())
    }

    #[test]
    fn test_read_field() {
        assert_eq!(read_field(&[]), 0);
        assert_eq!(read_field(&[0x01]), 1);
        assert_eq!(read_field(&[0x01, 0x00]), 256);
        assert_eq!(read_field(&[0x00, 0x01, 0x02]), 258);
    }

    #[test]
    fn test_xref_entry_parsing() {
        let stream = xref_stream(
            &[[0, 0, 0, 255], [1, 0, 15, 0], [2, 0, 5, 3]],
            None,
        );
        let entries = XRefStream::parse(stream).unwrap().to_xref_entries().unwrap();

        assert_eq!(
            entries,
            vec![
                (0, XRefEntry::Free { next_free: 0, generation: 255 }),
                (1, XRefEntry::InUse { offset: 15, generation: 0 }),
                (2, XRefEntry::Compressed { stream_number: 5, index: 3 }),
            ]
        );
    }

    #[test]
    fn test_index_array_with_gaps() {
        let stream = xref_stream(
            &[[1, 0, 10, 0], [1, 0, 20, 0]],
            Some(vec![Object::from(3), Object::from(1), Object::from(9), Object::from(1)]),
        );
        let entries = XRefStream::parse(stream).unwrap().to_xref_entries().unwrap();
        assert_eq!(entries[0].0, 3);
        assert_eq!(entries[1].0, 9);
    }

    #[test]
    fn test_compressed_xref_stream() {
        let mut stream = xref_stream(&[[1, 0, 42, 0]], None);
        stream.compress_flate().unwrap();
        let entries = XRefStream::parse(stream).unwrap().to_xref_entries().unwrap();
        assert_eq!(entries, vec![(0, XRefEntry::InUse { offset: 42, generation: 0 })]);
    }

    #[test]
    fn test_truncated_xref_stream() {
        let stream = xref_stream(&[[1, 0, 42, 0]], Some(vec![Object::from(0), Object::from(3)]));
        assert!(XRefStream::parse(stream).unwrap().to_xref_entries().is_err());
    }

    #[test]
    fn test_bad_w_array() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("XRef"));
        dict.set("Size", 1);
        dict.set("W", vec![Object::from(1), Object::from(2)]);
        assert!(XRefStream::parse(Stream::new(dict, vec![0; 3])).is_err());
    }
}
