//! XRef Stream Writer for PDF 1.5+
//!
//! This module implements writing cross-reference streams according to
//! ISO 32000-1:2008 Section 7.5.8.

use crate::compression;
use crate::error::Result;
use crate::objects::{Dictionary, Object, ObjectId, Stream};
use crate::parser::XRefEntry;

/// Writer for XRef streams
pub struct XRefStreamWriter {
    /// Entries to be written, one per object number starting at 0
    entries: Vec<XRefEntry>,
    /// Field widths [type, field2, field3]
    widths: [usize; 3],
    /// Object ID for this XRef stream
    stream_id: ObjectId,
}

impl XRefStreamWriter {
    pub fn new(stream_id: ObjectId) -> Self {
        Self {
            entries: Vec::new(),
            // 1 byte for type, 3 bytes for offsets, 2 bytes for generation
            widths: [1, 3, 2],
            stream_id,
        }
    }

    /// Append the entry for the next object number, widening fields as needed.
    pub fn add_entry(&mut self, entry: XRefEntry) {
        let (field2, field3) = match entry {
            XRefEntry::Free {
                next_free,
                generation,
            } => (u64::from(next_free), u64::from(generation)),
            XRefEntry::InUse { offset, generation } => (offset as u64, u64::from(generation)),
            XRefEntry::Compressed {
                stream_number,
                index,
            } => (u64::from(stream_number), u64::from(index)),
        };
        self.widths[1] = self.widths[1].max(Self::bytes_needed(field2));
        self.widths[2] = self.widths[2].max(Self::bytes_needed(field3));
        self.entries.push(entry);
    }

    /// Calculate minimum bytes needed to represent a value
    fn bytes_needed(value: u64) -> usize {
        if value == 0 {
            1
        } else {
            ((value.ilog2() / 8) + 1) as usize
        }
    }

    /// Encode entries into binary data
    pub fn encode_entries(&self) -> Vec<u8> {
        let row = self.widths.iter().sum::<usize>();
        let mut data = Vec::with_capacity(row * self.entries.len());

        for entry in &self.entries {
            let (kind, field2, field3) = match *entry {
                XRefEntry::Free {
                    next_free,
                    generation,
                } => (0, u64::from(next_free), u64::from(generation)),
                XRefEntry::InUse { offset, generation } => (1, offset as u64, u64::from(generation)),
                XRefEntry::Compressed {
                    stream_number,
                    index,
                } => (2, u64::from(stream_number), u64::from(index)),
            };
            Self::write_field(&mut data, kind, self.widths[0]);
            Self::write_field(&mut data, field2, self.widths[1]);
            Self::write_field(&mut data, field3, self.widths[2]);
        }

        data
    }

    /// Write a big-endian field with the specified width
    fn write_field(data: &mut Vec<u8>, value: u64, width: usize) {
        for i in (0..width).rev() {
            data.push(((value >> (i * 8)) & 0xFF) as u8);
        }
    }

    /// Stream dictionary: the document trailer entries plus the xref keys.
    pub fn create_dictionary(&self, trailer: &Dictionary) -> Dictionary {
        let mut dict = trailer.clone();
        dict.set("Type", Object::name("XRef"));
        dict.set("Size", self.entries.len());
        dict.set(
            "W",
            self.widths.iter().map(|&w| Object::from(w)).collect::<Vec<_>>(),
        );
        dict.set("Index", vec![Object::from(0), Object::from(self.entries.len())]);
        dict.set("Filter", Object::name("FlateDecode"));
        dict
    }

    /// The complete, Flate-compressed XRef stream object
    pub fn to_stream(&self, trailer: &Dictionary) -> Result<Stream> {
        let data = compression::compress(&self.encode_entries())?;
        Ok(Stream::new(self.create_dictionary(trailer), data))
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn stream_id(&self) -> ObjectId {
        self.stream_id
    }
}
