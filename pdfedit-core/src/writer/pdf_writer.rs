use super::XRefStreamWriter;
use crate::document::Document;
use crate::error::Result;
use crate::objects::{Dictionary, Object, ObjectId};
use crate::parser::lexer::is_delimiter;
use crate::parser::XRefEntry;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// Output settings for [`PdfWriter`]
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Version written in the `%PDF-` header
    pub pdf_version: String,
    /// Emit a cross-reference stream instead of a classic xref table
    pub use_xref_streams: bool,
    /// Flate-compress streams that carry no filter yet
    pub compress_streams: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            pdf_version: "1.7".to_string(),
            use_xref_streams: false,
            compress_streams: false,
        }
    }
}

pub struct PdfWriter<W: Write> {
    writer: W,
    config: WriterConfig,
    /// Object number -> (byte offset, generation)
    xref_positions: BTreeMap<u32, (usize, u16)>,
    current_position: usize,
    /// Objects being written; references to anything else are written as null
    live: Option<BTreeSet<ObjectId>>,
}

impl<W: Write> PdfWriter<W> {
    pub fn new_with_writer(writer: W) -> Self {
        Self::with_config(writer, WriterConfig::default())
    }

    pub fn with_config(writer: W, config: WriterConfig) -> Self {
        Self {
            writer,
            config,
            xref_positions: BTreeMap::new(),
            current_position: 0,
            live: None,
        }
    }

    /// Write every object reachable from the trailer, then the xref and trailer.
    ///
    /// Object numbers are kept as they are in the document; numbers left
    /// unused become free entries.
    pub fn write_document(&mut self, document: &Document) -> Result<()> {
        // Parse everything up front so no error can surface after the header
        let ids = document.load_reachable()?;
        // Compressing ciphertext would break decryption
        let compress = self.config.compress_streams && !document.is_encrypted();

        self.write_header()?;

        self.live = Some(ids.clone());

        for &id in &ids {
            let object = document.get(id)?;
            match object {
                Object::Stream(stream) if compress && stream.filters().is_empty() => {
                    let mut stream = stream.clone();
                    stream.compress_flate()?;
                    self.write_object(id, &Object::Stream(stream))?;
                }
                _ => self.write_object(id, object)?,
            }
        }

        let mut trailer = document.trailer().document_entries();
        if trailer.get_reference("Info").is_some_and(|info| !ids.contains(&info)) {
            trailer.remove("Info");
        }

        if self.config.use_xref_streams {
            self.write_xref_stream(&trailer)?;
        } else {
            let xref_position = self.current_position;
            self.write_xref()?;
            self.write_trailer(trailer, xref_position)?;
        }

        self.writer.flush()?;
        tracing::debug!(
            "Wrote {} objects, {} bytes",
            ids.len(),
            self.current_position
        );
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        let header = format!("%PDF-{}\n", self.config.pdf_version);
        self.write_bytes(header.as_bytes())?;
        // Binary comment to ensure file is treated as binary
        self.write_bytes(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'])?;
        Ok(())
    }

    fn write_object(&mut self, id: ObjectId, object: &Object) -> Result<()> {
        self.xref_positions
            .insert(id.number(), (self.current_position, id.generation()));

        let header = format!("{} {} obj\n", id.number(), id.generation());
        self.write_bytes(header.as_bytes())?;
        self.write_object_value(object)?;
        self.write_bytes(b"\nendobj\n")?;
        Ok(())
    }

    fn write_object_value(&mut self, object: &Object) -> Result<()> {
        match object {
            Object::Null => self.write_bytes(b"null")?,
            Object::Boolean(b) => self.write_bytes(if *b { b"true" } else { b"false" })?,
            Object::Integer(i) => self.write_bytes(i.to_string().as_bytes())?,
            Object::Real(f) => self.write_bytes(format_real(*f).as_bytes())?,
            Object::String(s) => self.write_bytes(&encode_string(s))?,
            Object::Name(n) => self.write_bytes(&encode_name(n))?,
            Object::Array(arr) => {
                self.write_bytes(b"[")?;
                for (i, obj) in arr.iter().enumerate() {
                    if i > 0 {
                        self.write_bytes(b" ")?;
                    }
                    self.write_object_value(obj)?;
                }
                self.write_bytes(b"]")?;
            }
            Object::Dictionary(dict) => self.write_dictionary(dict, None)?,
            Object::Stream(stream) => {
                // The body length is authoritative, whatever /Length said
                self.write_dictionary(stream.dictionary(), Some(stream.data().len()))?;
                self.write_bytes(b"\nstream\n")?;
                self.write_bytes(stream.data())?;
                self.write_bytes(b"\nendstream")?;
            }
            Object::Reference(id) if self.live.as_ref().is_some_and(|live| !live.contains(id)) => {
                self.write_bytes(b"null")?
            }
            Object::Reference(id) => {
                let ref_str = format!("{} {} R", id.number(), id.generation());
                self.write_bytes(ref_str.as_bytes())?;
            }
        }
        Ok(())
    }

    fn write_dictionary(&mut self, dict: &Dictionary, length: Option<usize>) -> Result<()> {
        self.write_bytes(b"<<")?;
        for (key, value) in dict.iter() {
            if length.is_some() && key == "Length" {
                continue;
            }
            self.write_bytes(b"\n")?;
            self.write_bytes(&encode_name(key))?;
            self.write_bytes(b" ")?;
            self.write_object_value(value)?;
        }
        if let Some(length) = length {
            self.write_bytes(format!("\n/Length {length}").as_bytes())?;
        }
        self.write_bytes(b"\n>>")?;
        Ok(())
    }

    /// One entry per object number below `size`, gaps linked into the free list.
    fn xref_entries(&self, size: u32) -> Vec<XRefEntry> {
        let free: Vec<u32> = (1..size)
            .filter(|n| !self.xref_positions.contains_key(n))
            .collect();
        let next_free = |after: u32| {
            free.get(free.partition_point(|&n| n <= after))
                .copied()
                .unwrap_or(0)
        };

        (0..size)
            .map(|number| match self.xref_positions.get(&number) {
                Some(&(offset, generation)) => XRefEntry::InUse { offset, generation },
                None => XRefEntry::Free {
                    next_free: next_free(number),
                    generation: if number == 0 { 65535 } else { 0 },
                },
            })
            .collect()
    }

    fn size(&self) -> u32 {
        self.xref_positions
            .keys()
            .next_back()
            .map_or(1, |&max| max + 1)
    }

    fn write_xref(&mut self) -> Result<()> {
        let size = self.size();
        let mut table = format!("xref\n0 {size}\n");
        for entry in self.xref_entries(size) {
            let line = match entry {
                XRefEntry::InUse { offset, generation } => {
                    format!("{offset:010} {generation:05} n \n")
                }
                XRefEntry::Free {
                    next_free,
                    generation,
                } => format!("{next_free:010} {generation:05} f \n"),
                // Never produced for a classic table
                XRefEntry::Compressed { .. } => continue,
            };
            table.push_str(&line);
        }
        self.write_bytes(table.as_bytes())
    }

    fn write_trailer(&mut self, mut trailer: Dictionary, xref_position: usize) -> Result<()> {
        trailer.set("Size", self.size());

        self.write_bytes(b"trailer\n")?;
        self.write_dictionary(&trailer, None)?;
        self.write_bytes(b"\nstartxref\n")?;
        self.write_bytes(xref_position.to_string().as_bytes())?;
        self.write_bytes(b"\n%%EOF\n")?;
        Ok(())
    }

    fn write_xref_stream(&mut self, trailer: &Dictionary) -> Result<()> {
        let stream_id = ObjectId::new(self.size(), 0);
        let position = self.current_position;
        self.xref_positions
            .insert(stream_id.number(), (position, stream_id.generation()));

        let mut xref = XRefStreamWriter::new(stream_id);
        for entry in self.xref_entries(stream_id.number() + 1) {
            xref.add_entry(entry);
        }
        let stream = xref.to_stream(trailer)?;
        self.write_object(xref.stream_id(), &Object::Stream(stream))?;

        self.write_bytes(format!("startxref\n{position}\n%%EOF\n").as_bytes())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.current_position += data.len();
        Ok(())
    }
}

/// Shortest decimal form, at most six fractional digits.
fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let formatted = format!("{value:.6}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Literal string when every byte is printable, hex string otherwise.
fn encode_string(bytes: &[u8]) -> Vec<u8> {
    let printable = bytes
        .iter()
        .all(|&b| (0x20..=0x7E).contains(&b) || matches!(b, b'\n' | b'\r' | b'\t' | 0x08 | 0x0C));

    if !printable {
        let mut out = Vec::with_capacity(bytes.len() * 2 + 2);
        out.push(b'<');
        for byte in bytes {
            out.extend_from_slice(format!("{byte:02X}").as_bytes());
        }
        out.push(b'>');
        return out;
    }

    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(b'(');
    for &byte in bytes {
        match byte {
            b'(' | b')' | b'\\' => out.extend_from_slice(&[b'\\', byte]),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0C => out.extend_from_slice(b"\\f"),
            _ => out.push(byte),
        }
    }
    out.push(b')');
    out
}

/// `/Name` with every non-regular byte written as `#xx`.
///
/// Characters up to U+00FF stand for the single byte the lexer read them from.
fn encode_name(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 1);
    out.push(b'/');
    for ch in name.chars() {
        let bytes = match u8::try_from(u32::from(ch)) {
            Ok(byte) => vec![byte],
            Err(_) => ch.to_string().into_bytes(),
        };
        for byte in bytes {
            if (0x21..=0x7E).contains(&byte) && !is_delimiter(byte) && byte != b'#' {
                out.push(byte);
            } else {
                out.extend_from_slice(format!("#{byte:02X}").as_bytes());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Stream;
    use std::io::{self, ErrorKind};

    fn serialize(object: &Object) -> String {
        let mut buffer = Vec::new();
        PdfWriter::new_with_writer(&mut buffer)
            .write_object_value(object)
            .unwrap();
        String::from_utf8_lossy(&buffer).into_owned()
    }

    fn sample_document() -> Document {
        let mut doc = Document::new();
        let contents = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m 10 10 l S".to_vec()));
        let mut page = Dictionary::new();
        page.set("Type", Object::name("Page"));
        page.set("Contents", contents);
        page.set("MediaBox", vec![Object::from(0), Object::from(0), Object::from(200), Object::from(300)]);
        let page = doc.add_object(page);
        doc.append_pages(&[page]).unwrap();
        doc
    }

    #[test]
    fn test_write_header() {
        let mut buffer = Vec::new();
        let mut writer = PdfWriter::new_with_writer(&mut buffer);
        writer.write_header().unwrap();

        assert!(buffer.starts_with(b"%PDF-1.7\n"));
        assert_eq!(buffer.len(), 15);
        assert_eq!(&buffer[9..], &[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n']);
    }

    #[test]
    fn test_write_bytes_tracks_position() {
        let mut buffer = Vec::new();
        {
            let mut writer = PdfWriter::new_with_writer(&mut buffer);
            writer.write_bytes(b"Hello").unwrap();
            assert_eq!(writer.current_position, 5);
            writer.write_bytes(b" World").unwrap();
            assert_eq!(writer.current_position, 11);
        }
        assert_eq!(buffer, b"Hello World");
    }

    #[test]
    fn test_scalars() {
        assert_eq!(serialize(&Object::Null), "null");
        assert_eq!(serialize(&Object::Boolean(false)), "false");
        assert_eq!(serialize(&Object::Integer(-42)), "-42");
        assert_eq!(serialize(&Object::Real(0.5)), "0.5");
        assert_eq!(serialize(&Object::Real(3.0)), "3");
        assert_eq!(serialize(&Object::Real(-0.0000001)), "0");
        assert_eq!(serialize(&Object::Real(f64::NAN)), "0");
        assert_eq!(serialize(&Object::Reference(ObjectId::new(12, 3))), "12 3 R");
    }

    #[test]
    fn test_strings_literal_or_hex() {
        assert_eq!(serialize(&Object::string(b"a(b)\\c".to_vec())), "(a\\(b\\)\\\\c)");
        assert_eq!(serialize(&Object::string(b"line\n".to_vec())), "(line\\n)");
        assert_eq!(serialize(&Object::string(vec![0x00, 0xFF, 0x10])), "<00FF10>");
        assert_eq!(serialize(&Object::string(Vec::new())), "()");
    }

    #[test]
    fn test_names_are_escaped() {
        assert_eq!(serialize(&Object::name("Type")), "/Type");
        assert_eq!(serialize(&Object::name("A B")), "/A#20B");
        assert_eq!(serialize(&Object::name("x#y")), "/x#23y");
        assert_eq!(serialize(&Object::name("a/b")), "/a#2Fb");
        assert_eq!(serialize(&Object::name("\u{e9}")), "/#E9");
    }

    #[test]
    fn test_stream_length_is_recomputed() {
        let mut dict = Dictionary::new();
        dict.set("Length", ObjectId::new(9, 0));
        let stream = Stream::from_parts(dict, b"abc".to_vec());
        let text = serialize(&Object::Stream(stream));
        assert!(text.contains("/Length 3"));
        assert!(!text.contains("9 0 R"));
        assert!(text.ends_with("stream\nabc\nendstream"));
    }

    #[test]
    fn test_xref_free_list_links_gaps() {
        let mut writer = PdfWriter::new_with_writer(Vec::new());
        writer.xref_positions.insert(1, (15, 0));
        writer.xref_positions.insert(4, (94, 0));

        let entries = writer.xref_entries(writer.size());
        assert_eq!(
            entries,
            vec![
                XRefEntry::Free { next_free: 2, generation: 65535 },
                XRefEntry::InUse { offset: 15, generation: 0 },
                XRefEntry::Free { next_free: 3, generation: 0 },
                XRefEntry::Free { next_free: 0, generation: 0 },
                XRefEntry::InUse { offset: 94, generation: 0 },
            ]
        );
    }

    #[test]
    fn test_write_xref_table() {
        let mut buffer = Vec::new();
        {
            let mut writer = PdfWriter::new_with_writer(&mut buffer);
            writer.xref_positions.insert(1, (15, 0));
            writer.xref_positions.insert(2, (94, 0));
            writer.write_xref().unwrap();
        }
        let content = String::from_utf8_lossy(&buffer);
        assert!(content.starts_with("xref\n0 3\n"));
        assert!(content.contains("0000000000 65535 f \n"));
        assert!(content.contains("0000000015 00000 n \n"));
        assert!(content.contains("0000000094 00000 n \n"));
    }

    #[test]
    fn test_document_round_trip() {
        let doc = sample_document();
        let bytes = doc.to_bytes().unwrap();
        assert!(bytes.ends_with(b"%%EOF\n"));

        let reparsed = Document::parse(&bytes).unwrap();
        assert!(!reparsed.was_recovered());
        assert_eq!(reparsed.page_count().unwrap(), 1);
        let page = reparsed.page_id(1).unwrap();
        assert_eq!(reparsed.page_media_box(page).unwrap(), Some([0.0, 0.0, 200.0, 300.0]));
    }

    #[test]
    fn test_orphans_are_dropped() {
        let mut doc = sample_document();
        let orphan = doc.add_object(Object::string(b"orphan marker".to_vec()));
        let bytes = doc.to_bytes().unwrap();

        let text = String::from_utf8_lossy(&bytes);
        assert!(!text.contains("orphan marker"));
        let reparsed = Document::parse(&bytes).unwrap();
        assert!(!reparsed.contains(orphan));
    }

    #[test]
    fn test_dangling_reference_written_as_null() {
        let mut doc = sample_document();
        let page = doc.page_id(1).unwrap();
        doc.get_dict_mut(page).unwrap().set("Thumb", ObjectId::new(50, 0));
        let bytes = doc.to_bytes().unwrap();

        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Thumb null"));
        assert!(!text.contains("50 0 R"));
    }

    #[test]
    fn test_dangling_info_is_dropped() {
        let mut doc = sample_document();
        doc.trailer_mut().dict_mut().set("Info", ObjectId::new(77, 0));
        let bytes = doc.to_bytes().unwrap();
        let reparsed = Document::parse(&bytes).unwrap();
        assert!(reparsed.trailer().info().is_none());
    }

    #[test]
    fn test_xref_stream_output_round_trips() {
        let doc = sample_document();
        let config = WriterConfig {
            use_xref_streams: true,
            ..WriterConfig::default()
        };
        let bytes = doc.to_bytes_with(config).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Type /XRef"));
        assert!(!text.contains("\nxref\n"));

        let reparsed = Document::parse(&bytes).unwrap();
        assert!(!reparsed.was_recovered());
        assert_eq!(reparsed.page_count().unwrap(), 1);
    }

    #[test]
    fn test_compress_streams() {
        let doc = sample_document();
        let config = WriterConfig {
            compress_streams: true,
            ..WriterConfig::default()
        };
        let bytes = doc.to_bytes_with(config).unwrap();
        let reparsed = Document::parse(&bytes).unwrap();

        let page = reparsed.page_id(1).unwrap();
        let contents = reparsed
            .get(page)
            .unwrap()
            .as_dict()
            .unwrap()
            .get_reference("Contents")
            .unwrap();
        let stream = reparsed.get(contents).unwrap().as_stream().unwrap();
        assert_eq!(stream.filters(), vec!["FlateDecode"]);
        assert_eq!(stream.decoded_data().unwrap(), b"0 0 m 10 10 l S");
    }

    struct FailingWriter {
        fail_after: usize,
        written: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written >= self.fail_after {
                return Err(io::Error::new(ErrorKind::PermissionDenied, "Simulated write error"));
            }
            self.written += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_reported() {
        let doc = sample_document();
        for fail_after in [0, 5, 100] {
            let mut writer = PdfWriter::new_with_writer(FailingWriter {
                fail_after,
                written: 0,
            });
            assert!(writer.write_document(&doc).is_err());
        }
    }
}
