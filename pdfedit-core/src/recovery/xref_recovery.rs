//! XRef recovery for corrupted PDF files
//!
//! Rebuilds a cross-reference table by scanning the file for object headers,
//! then locates the catalog through the last usable trailer or, failing that,
//! through an object with `/Type /Catalog`.

use crate::objects::{Dictionary, Object, ObjectId};
use crate::parser::lexer::{is_delimiter, is_whitespace, Lexer};
use crate::parser::object_stream::ObjectStream;
use crate::parser::objects::{parse_indirect_object, parse_object};
use crate::parser::{ParseError, ParseOptions, ParseResult, Trailer, XRefEntry, XRefTable};
use std::collections::BTreeMap;

/// Recovery statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Number of object headers found
    pub objects_found: usize,
    /// Objects recovered from inside object streams
    pub compressed_objects_found: usize,
    /// Whether a trailer dictionary with a usable Root was found
    pub trailer_found: bool,
    /// Whether the catalog had to be located by its /Type
    pub catalog_from_scan: bool,
    /// Bytes examined
    pub bytes_scanned: usize,
    /// The scan stopped at `max_scan_bytes` before the end of the file
    pub scan_truncated: bool,
}

/// XRef recovery engine
pub struct XRefRecovery<'a> {
    data: &'a [u8],
    options: &'a ParseOptions,
    /// Object number -> (generation, offset). Later headers win.
    objects: BTreeMap<u32, (u16, usize)>,
    trailers: Vec<Dictionary>,
    stats: RecoveryStats,
}

/// Rebuild the cross-reference table of `data` from scratch.
pub fn recover_xref(data: &[u8], options: &ParseOptions) -> ParseResult<(XRefTable, RecoveryStats)> {
    let mut recovery = XRefRecovery::new(data, options);
    recovery.scan();
    let table = recovery.build_xref_table()?;
    Ok((table, recovery.stats))
}

impl<'a> XRefRecovery<'a> {
    pub fn new(data: &'a [u8], options: &'a ParseOptions) -> Self {
        Self {
            data,
            options,
            objects: BTreeMap::new(),
            trailers: Vec::new(),
            stats: RecoveryStats::default(),
        }
    }

    /// Scan for `N G obj` headers and `trailer` dictionaries.
    pub fn scan(&mut self) {
        let limit = self.data.len().min(self.options.max_scan_bytes);
        self.stats.bytes_scanned = limit;
        self.stats.scan_truncated = limit < self.data.len();
        if self.stats.scan_truncated {
            tracing::warn!(
                "Recovery scan capped at {} of {} bytes",
                limit,
                self.data.len()
            );
        }

        let window = &self.data[..limit];
        let mut pos = 0;
        while let Some(found) = find(&window[pos..], b"obj") {
            let keyword_at = pos + found;
            pos = keyword_at + 3;

            if let Some((number, generation, start)) = self.object_header_before(keyword_at) {
                self.objects.insert(number, (generation, start));
                self.stats.objects_found += 1;
            }
        }

        let mut pos = 0;
        while let Some(found) = find(&window[pos..], b"trailer") {
            let at = pos + found;
            pos = at + "trailer".len();
            let mut lexer = Lexer::at(self.data, pos);
            if let Ok(Object::Dictionary(dict)) = parse_object(&mut lexer, self.options) {
                self.trailers.push(dict);
            }
        }

        tracing::debug!(
            "Recovery scan found {} object headers and {} trailers",
            self.objects.len(),
            self.trailers.len()
        );
    }

    /// Given the offset of an `obj` keyword, read `N G` backwards from it.
    fn object_header_before(&self, keyword_at: usize) -> Option<(u32, u16, usize)> {
        let data = self.data;

        // "obj" must stand alone: "endobj" and "objx" are not headers
        let after = data.get(keyword_at + 3).copied();
        if after.is_some_and(|b| !is_whitespace(b) && !is_delimiter(b)) {
            return None;
        }

        let mut pos = keyword_at;
        let gen_end = skip_whitespace_back(data, pos);
        if gen_end == pos {
            return None;
        }
        let gen_start = skip_digits_back(data, gen_end);
        pos = skip_whitespace_back(data, gen_start);
        if pos == gen_start || gen_start == gen_end {
            return None;
        }
        let num_start = skip_digits_back(data, pos);
        if num_start == pos {
            return None;
        }
        if num_start > 0 {
            let before = data[num_start - 1];
            if !is_whitespace(before) && !is_delimiter(before) {
                return None;
            }
        }

        let number = std::str::from_utf8(&data[num_start..pos]).ok()?.parse().ok()?;
        let generation = std::str::from_utf8(&data[gen_start..gen_end])
            .ok()?
            .parse()
            .ok()?;
        Some((number, generation, num_start))
    }

    /// Build XRef table from found objects
    pub fn build_xref_table(&mut self) -> ParseResult<XRefTable> {
        let mut entries: BTreeMap<u32, XRefEntry> = self
            .objects
            .iter()
            .map(|(&number, &(generation, offset))| {
                (number, XRefEntry::InUse { offset, generation })
            })
            .collect();

        // Parse each object once to find catalogs, xref streams and object streams
        let mut catalog = None;
        let mut compressed = Vec::new();
        for (&number, &(_, offset)) in &self.objects {
            let mut lexer = Lexer::at(self.data, offset);
            let object = match parse_indirect_object(&mut lexer, self.options, &|_| None) {
                Ok((_, object)) => object,
                Err(e) => {
                    tracing::debug!("Skipping unreadable object {} at {}: {}", number, offset, e);
                    continue;
                }
            };

            match object.as_dict().and_then(Dictionary::get_type) {
                Some("Catalog") => catalog = Some(number),
                Some("XRef") => {
                    if let Some(dict) = object.as_dict() {
                        self.trailers.push(dict.clone());
                    }
                }
                Some("ObjStm") => {
                    if let Some(stream) = object.as_stream() {
                        match ObjectStream::parse(stream, self.options) {
                            Ok(objects) => {
                                for (index, inner) in objects.object_numbers().enumerate() {
                                    compressed.push((inner, number, index as u32));
                                    if catalog.is_none() && is_catalog(objects.get(index as u32, inner)) {
                                        catalog = Some(inner);
                                    }
                                }
                            }
                            Err(e) => tracing::debug!("Skipping object stream {}: {}", number, e),
                        }
                    }
                }
                _ => {}
            }
        }

        for (inner, stream_number, index) in compressed {
            // A direct object with the same number takes precedence
            entries.entry(inner).or_insert_with(|| {
                self.stats.compressed_objects_found += 1;
                XRefEntry::Compressed {
                    stream_number,
                    index,
                }
            });
        }

        let exists = |id: ObjectId| entries.contains_key(&id.number());
        let trailer_dict = self
            .trailers
            .iter()
            .rev()
            .find(|dict| dict.get_reference("Root").is_some_and(exists))
            .cloned();

        let mut trailer = match trailer_dict {
            Some(dict) => {
                self.stats.trailer_found = true;
                Trailer::new(Trailer::new(dict).document_entries())
            }
            None => {
                let number = catalog.ok_or(ParseError::MissingRoot)?;
                let generation = entries.get(&number).map_or(0, XRefEntry::generation);
                tracing::warn!("No usable trailer; using catalog object {} found by scan", number);
                self.stats.catalog_from_scan = true;
                let mut dict = Dictionary::new();
                dict.set("Root", ObjectId::new(number, generation));
                Trailer::new(dict)
            }
        };

        let size = entries.keys().next_back().map_or(1, |&max| max + 1);
        trailer.dict_mut().set("Size", size);
        entries.insert(
            0,
            XRefEntry::Free {
                next_free: 0,
                generation: 65535,
            },
        );

        Ok(XRefTable::from_parts(entries, trailer))
    }

    pub fn stats(&self) -> &RecoveryStats {
        &self.stats
    }
}

fn is_catalog(object: Option<&Object>) -> bool {
    object
        .and_then(Object::as_dict)
        .and_then(Dictionary::get_type)
        == Some("Catalog")
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Walk back over whitespace ending at `end`; returns the new end.
fn skip_whitespace_back(data: &[u8], end: usize) -> usize {
    let mut pos = end;
    while pos > 0 && is_whitespace(data[pos - 1]) {
        pos -= 1;
    }
    pos
}

fn skip_digits_back(data: &[u8], end: usize) -> usize {
    let mut pos = end;
    while pos > 0 && data[pos - 1].is_ascii_digit() {
        pos -= 1;
    }
    pos
}
