//! PDF Cross-Reference Table Parser
//!
//! Parses xref tables according to ISO 32000-1 Section 7.5.4, following the
//! `Prev` chain of incrementally updated files and the `XRefStm` of hybrid ones.

use super::lexer::{is_whitespace, Lexer};
use super::objects::{parse_object, parse_object_header};
use super::trailer::Trailer;
use super::xref_stream::XRefStream;
use super::{ParseError, ParseOptions, ParseResult};
use crate::objects::{Dictionary, Object};
use std::collections::{BTreeMap, HashSet};

/// How far from the end of the file `startxref` is searched for.
const STARTXREF_WINDOW: usize = 1024;

/// Where an object lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free slot, linked into the free list
    Free { next_free: u32, generation: u16 },
    /// Uncompressed object at a byte offset
    InUse { offset: usize, generation: u16 },
    /// Object stored at `index` inside object stream `stream_number`
    Compressed { stream_number: u32, index: u32 },
}

impl XRefEntry {
    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }

    pub fn generation(&self) -> u16 {
        match self {
            XRefEntry::Free { generation, .. } | XRefEntry::InUse { generation, .. } => *generation,
            XRefEntry::Compressed { .. } => 0,
        }
    }
}

/// Cross-reference table merged across all sections of a file
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Trailer,
}

impl XRefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from entries found some other way (recovery).
    pub fn from_parts(entries: BTreeMap<u32, XRefEntry>, trailer: Trailer) -> Self {
        Self { entries, trailer }
    }

    /// Parse the xref chain starting at the `startxref` offset.
    pub fn parse(data: &[u8], options: &ParseOptions) -> ParseResult<Self> {
        let start = Self::find_xref_offset(data)?;
        let mut table = XRefTable::new();
        let mut newest_trailer: Option<Trailer> = None;
        let mut visited = HashSet::new();
        let mut next = Some(start);

        while let Some(offset) = next {
            if !visited.insert(offset) {
                if options.strict_mode {
                    return Err(ParseError::InvalidXRef(format!(
                        "Prev chain loops back to offset {offset}"
                    )));
                }
                tracing::warn!("Xref Prev chain loops back to offset {}; stopping", offset);
                break;
            }

            let (mut section, dict) = Self::parse_section(data, offset, options)?;
            let trailer = Trailer::new(dict);

            // Hybrid file: the xref stream fills in what the table marks free
            if let Some(stm_offset) = trailer.xref_stm() {
                if visited.insert(stm_offset) {
                    match XRefStream::parse_at(data, stm_offset, options)
                        .and_then(|stream| stream.to_xref_entries())
                    {
                        Ok(stream_entries) => {
                            for (number, entry) in stream_entries {
                                let replace = section.get(&number).map_or(true, XRefEntry::is_free);
                                if replace {
                                    section.insert(number, entry);
                                }
                            }
                        }
                        Err(e) if options.strict_mode => return Err(e),
                        Err(e) => tracing::warn!("Ignoring unreadable XRefStm at {}: {}", stm_offset, e),
                    }
                }
            }

            tracing::debug!("Xref section at {}: {} entries", offset, section.len());

            // Sections are visited newest first, so existing entries win
            for (number, entry) in section {
                table.entries.entry(number).or_insert(entry);
            }

            next = trailer.prev();
            match newest_trailer.as_mut() {
                None => newest_trailer = Some(trailer),
                Some(newest) => newest.merge_older(trailer.dict()),
            }
        }

        table.trailer = newest_trailer.unwrap_or_default();
        Ok(table)
    }

    /// Read one section: a classic table plus trailer, or an xref stream.
    fn parse_section(
        data: &[u8],
        offset: usize,
        options: &ParseOptions,
    ) -> ParseResult<(BTreeMap<u32, XRefEntry>, Dictionary)> {
        if offset >= data.len() {
            return Err(ParseError::InvalidXRef(format!(
                "xref offset {offset} is past the end of the file ({} bytes)",
                data.len()
            )));
        }

        let mut pos = offset;
        skip_whitespace(data, &mut pos);
        if data[pos..].starts_with(b"xref") {
            Self::parse_traditional_xref(data, pos + 4, options)
        } else {
            let stream = XRefStream::parse_at(data, offset, options)?;
            let entries = stream.to_xref_entries()?.into_iter().collect();
            Ok((entries, stream.dict))
        }
    }

    /// Parse a classic table body, starting right after the `xref` keyword.
    fn parse_traditional_xref(
        data: &[u8],
        mut pos: usize,
        options: &ParseOptions,
    ) -> ParseResult<(BTreeMap<u32, XRefEntry>, Dictionary)> {
        let mut entries = BTreeMap::new();

        loop {
            skip_whitespace(data, &mut pos);
            if data[pos..].starts_with(b"trailer") {
                pos += "trailer".len();
                break;
            }

            let first = read_uint(data, &mut pos)
                .ok_or_else(|| ParseError::InvalidXRef(format!("expected subsection header at {pos}")))?;
            skip_whitespace(data, &mut pos);
            let count = read_uint(data, &mut pos)
                .ok_or_else(|| ParseError::InvalidXRef(format!("expected entry count at {pos}")))?;

            let mut first = u32::try_from(first)
                .map_err(|_| ParseError::InvalidXRef(format!("object number {first} too large")))?;

            for i in 0..count {
                let entry = parse_xref_entry(data, &mut pos)?;

                // Common writer bug: subsection "1 n" whose first entry is object 0
                if i == 0
                    && first == 1
                    && matches!(entry, XRefEntry::Free { generation: 65535, .. })
                {
                    tracing::debug!("Xref subsection starts at 1 but holds object 0; shifting");
                    first = 0;
                }

                let number = first.saturating_add(i as u32);
                entries.insert(number, entry);
            }
        }

        let mut lexer = Lexer::at(data, pos);
        let trailer = match parse_object(&mut lexer, options)? {
            Object::Dictionary(dict) => dict,
            other => {
                return Err(ParseError::InvalidXRef(format!(
                    "trailer is a {}, not a dictionary",
                    other.type_name()
                )))
            }
        };

        Ok((entries, trailer))
    }

    /// Find the offset named by the last `startxref`.
    pub fn find_xref_offset(data: &[u8]) -> ParseResult<usize> {
        let tail_start = data.len().saturating_sub(STARTXREF_WINDOW);
        let tail = &data[tail_start..];
        let keyword_at = tail
            .windows(b"startxref".len())
            .rposition(|w| w == b"startxref")
            .ok_or_else(|| ParseError::InvalidXRef("startxref not found".to_string()))?;

        let mut pos = tail_start + keyword_at + b"startxref".len();
        skip_whitespace(data, &mut pos);
        read_uint(data, &mut pos)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ParseError::InvalidXRef("startxref is not followed by an offset".to_string()))
    }

    /// Check that every in-use entry points at the header of the object it names.
    pub fn validate(&self, data: &[u8]) -> ParseResult<()> {
        for (&number, entry) in &self.entries {
            if let XRefEntry::InUse { offset, .. } = *entry {
                if number == 0 {
                    continue;
                }
                let mut lexer = Lexer::at(data, offset);
                match parse_object_header(&mut lexer) {
                    Ok(id) if id.number() == number && offset < data.len() => {}
                    _ => {
                        return Err(ParseError::InvalidXRef(format!(
                            "entry for object {number} points at offset {offset}, which holds no matching object"
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, number: u32) -> Option<&XRefEntry> {
        self.entries.get(&number)
    }

    pub fn insert(&mut self, number: u32, entry: XRefEntry) {
        self.entries.insert(number, entry);
    }

    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    pub fn into_parts(self) -> (BTreeMap<u32, XRefEntry>, Trailer) {
        (self.entries, self.trailer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &XRefEntry)> {
        self.entries.iter()
    }

    /// Highest object number with a non-free entry
    pub fn max_object_number(&self) -> u32 {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_free())
            .map(|(&number, _)| number)
            .max()
            .unwrap_or(0)
    }
}

fn skip_whitespace(data: &[u8], pos: &mut usize) {
    while data.get(*pos).is_some_and(|&b| is_whitespace(b)) {
        *pos += 1;
    }
}

fn read_uint(data: &[u8], pos: &mut usize) -> Option<u64> {
    let start = *pos;
    while data.get(*pos).is_some_and(u8::is_ascii_digit) {
        *pos += 1;
    }
    std::str::from_utf8(&data[start..*pos]).ok()?.parse().ok()
}

/// Parse one `oooooooooo ggggg n` entry. Whitespace between the fields is
/// not required to be exactly one space.
fn parse_xref_entry(data: &[u8], pos: &mut usize) -> ParseResult<XRefEntry> {
    let start = *pos;
    let invalid = || ParseError::InvalidXRef(format!("malformed xref entry at offset {start}"));

    skip_whitespace(data, pos);
    let offset = read_uint(data, pos).ok_or_else(invalid)?;
    skip_whitespace(data, pos);
    let generation = read_uint(data, pos).ok_or_else(invalid)?;
    skip_whitespace(data, pos);
    let kind = *data.get(*pos).ok_or_else(invalid)?;
    *pos += 1;

    let generation = u16::try_from(generation).map_err(|_| invalid())?;
    match kind {
        b'n' => Ok(XRefEntry::InUse {
            offset: usize::try_from(offset).map_err(|_| invalid())?,
            generation,
        }),
        b'f' => Ok(XRefEntry::Free {
            next_free: u32::try_from(offset).map_err(|_| invalid())?,
            generation,
        }),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ObjectId;

    /// Two objects and a classic table with correct offsets.
    fn simple_file() -> Vec<u8> {
        let mut data = b"%PDF-1.4\n".to_vec();
        let obj1 = data.len();
        data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let obj2 = data.len();
        data.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let xref = data.len();
        data.extend_from_slice(
            format!(
                "xref\n0 3\n0000000000 65535 f \n{obj1:010} 00000 n \n{obj2:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n"
            )
            .as_bytes(),
        );
        data
    }

    #[test]
    fn test_parse_xref_entry() {
        let mut pos = 0;
        assert_eq!(
            parse_xref_entry(b"0000000017 00000 n \n", &mut pos).unwrap(),
            XRefEntry::InUse { offset: 17, generation: 0 }
        );

        let mut pos = 0;
        assert_eq!(
            parse_xref_entry(b"0000000000 65535 f\r\n", &mut pos).unwrap(),
            XRefEntry::Free { next_free: 0, generation: 65535 }
        );

        let mut pos = 0;
        assert!(parse_xref_entry(b"0000000000 65535 x\n", &mut pos).is_err());
    }

    #[test]
    fn test_find_xref_offset() {
        let data = simple_file();
        let offset = XRefTable::find_xref_offset(&data).unwrap();
        assert!(data[offset..].starts_with(b"xref"));
        assert!(XRefTable::find_xref_offset(b"%PDF-1.4\nno trailer here").is_err());
    }

    #[test]
    fn test_parse_classic_table() {
        let data = simple_file();
        let table = XRefTable::parse(&data, &ParseOptions::default()).unwrap();

        assert_eq!(table.len(), 3);
        assert!(table.get(0).unwrap().is_free());
        assert_eq!(table.max_object_number(), 2);
        assert_eq!(table.trailer().root().unwrap(), ObjectId::new(1, 0));
        table.validate(&data).unwrap();
    }

    #[test]
    fn test_validate_detects_bad_offset() {
        let data = simple_file();
        let mut table = XRefTable::parse(&data, &ParseOptions::default()).unwrap();
        table.insert(2, XRefEntry::InUse { offset: 3, generation: 0 });
        assert!(table.validate(&data).is_err());
    }

    #[test]
    fn test_off_by_one_subsection_is_shifted() {
        let mut data = b"%PDF-1.4\n".to_vec();
        let obj1 = data.len();
        data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let xref = data.len();
        data.extend_from_slice(
            format!("xref\n1 2\n0000000000 65535 f \n{obj1:010} 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF")
                .as_bytes(),
        );
        let table = XRefTable::parse(&data, &ParseOptions::default()).unwrap();
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::InUse { offset: obj1, generation: 0 })
        );
    }

    #[test]
    fn test_incremental_update_newer_section_wins() {
        let mut data = simple_file();
        let first_xref = XRefTable::find_xref_offset(&data).unwrap();

        let new_obj2 = data.len();
        data.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 /Updated true >>\nendobj\n");
        let xref = data.len();
        data.extend_from_slice(
            format!("xref\n2 1\n{new_obj2:010} 00000 n \ntrailer\n<< /Size 3 /Prev {first_xref} >>\nstartxref\n{xref}\n%%EOF\n")
                .as_bytes(),
        );

        let table = XRefTable::parse(&data, &ParseOptions::default()).unwrap();
        assert_eq!(
            table.get(2),
            Some(&XRefEntry::InUse { offset: new_obj2, generation: 0 })
        );
        // Root only appears in the older trailer
        assert_eq!(table.trailer().root().unwrap(), ObjectId::new(1, 0));
        assert_eq!(table.trailer().prev(), Some(first_xref));
    }

    #[test]
    fn test_prev_loop_is_detected() {
        let mut data = b"%PDF-1.4\n".to_vec();
        let xref = data.len();
        data.extend_from_slice(
            format!("xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev {xref} >>\nstartxref\n{xref}\n%%EOF")
                .as_bytes(),
        );
        assert!(XRefTable::parse(&data, &ParseOptions::default()).is_ok());
        assert!(XRefTable::parse(&data, &ParseOptions::strict()).is_err());
    }

    #[test]
    fn test_startxref_past_end() {
        let data = b"%PDF-1.4\nstartxref\n999999\n%%EOF";
        assert!(matches!(
            XRefTable::parse(data, &ParseOptions::default()),
            Err(ParseError::InvalidXRef(_))
        ));
    }
}
