//! In-memory PDF document: an arena of indirect objects keyed by object id.
//!
//! A [`Document`] is created by parsing a byte buffer or with
//! [`Document::new`], mutated in place by the page, security and image
//! operations, and serialized with [`Document::to_bytes`].
//!
//! # Lazy resolution
//!
//! Parsing only reads the header, the cross-reference data and the trailer.
//! Each object body is parsed the first time it is asked for and the result is
//! kept in a per-object [`OnceLock`] slot, so repeated lookups of the same id
//! return the same value without re-reading the buffer. The cache lives inside
//! the document; there is no global state.
//!
//! # Page tree
//!
//! Pages are addressed through the object arena rather than through parent
//! pointers. See [`Document::page_ids`] for the canonical page order used by
//! every operation that takes a 1-based page number.
//!
//! # Example
//!
//! ```rust,no_run
//! use pdfedit::Document;
//!
//! # fn main() -> pdfedit::Result<()> {
//! let bytes = std::fs::read("input.pdf")?;
//! let doc = Document::parse(&bytes)?;
//! println!("PDF {} with {} pages", doc.version(), doc.page_count()?);
//!
//! for page in doc.pages()? {
//!     println!("page {} rotated {}", page.number, page.rotation);
//! }
//! # Ok(())
//! # }
//! ```

mod clone;
mod page_tree;

pub(crate) use page_tree::is_pages_node;
pub use page_tree::{PageInfo, INHERITABLE_ATTRIBUTES};

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::parser::lexer::Lexer;
use crate::parser::object_stream::ObjectStream;
use crate::parser::objects::parse_indirect_object;
use crate::parser::{ParseError, ParseOptions, PdfVersion, Trailer, XRefEntry, XRefTable};
use crate::recovery::recover_xref;
use crate::writer::{PdfWriter, WriterConfig};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

/// Value returned when a reference points at an object that does not exist.
/// PDF treats such references as null.
static NULL: Object = Object::Null;

/// Maximum chain of reference-to-reference hops followed by [`Document::resolve`].
const MAX_REFERENCE_HOPS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Offset(usize),
    Compressed { stream_number: u32, index: u32 },
    Memory,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u16,
    location: Location,
    value: OnceLock<Object>,
}

/// A PDF document held as an arena of indirect objects
#[derive(Debug, Clone)]
pub struct Document {
    version: PdfVersion,
    trailer: Trailer,
    slots: BTreeMap<u32, Slot>,
    object_streams: BTreeMap<u32, OnceLock<ObjectStream>>,
    source: Vec<u8>,
    options: ParseOptions,
    max_object_number: u32,
    recovered: bool,
}

impl Document {
    /// Create an empty document holding a Catalog and an empty Pages root.
    pub fn new() -> Self {
        let mut doc = Document {
            version: PdfVersion::default(),
            trailer: Trailer::default(),
            slots: BTreeMap::new(),
            object_streams: BTreeMap::new(),
            source: Vec::new(),
            options: ParseOptions::default(),
            max_object_number: 0,
            recovered: false,
        };

        let catalog_id = doc.allocate();
        let pages_id = doc.allocate();

        let mut pages = Dictionary::new();
        pages.set("Type", Object::name("Pages"));
        pages.set("Kids", Vec::<Object>::new());
        pages.set("Count", 0);

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name("Catalog"));
        catalog.set("Pages", pages_id);

        doc.insert(catalog_id, catalog);
        doc.insert(pages_id, pages);
        doc.trailer.dict_mut().set("Root", catalog_id);
        doc
    }

    /// Parse a PDF with the default, tolerant options
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_with_options(bytes, ParseOptions::default())
    }

    /// Parse a PDF.
    ///
    /// The xref chain is read from `startxref`. When it is missing, broken, or
    /// its offsets do not point at the objects they name, the table is rebuilt
    /// by scanning the file (see [`crate::recovery`]).
    pub fn parse_with_options(bytes: &[u8], options: ParseOptions) -> Result<Self> {
        let version = match PdfVersion::parse_header(bytes, options.strict_mode) {
            Ok((version, _)) => version,
            Err(e) if options.strict_mode => return Err(e.into()),
            Err(_) => {
                tracing::warn!("No %PDF- header in the first 1024 bytes; assuming {}", PdfVersion::default());
                PdfVersion::default()
            }
        };

        let primary = XRefTable::parse(bytes, &options).and_then(|table| {
            table.validate(bytes)?;
            table.trailer().root()?;
            Ok(table)
        });

        if let Ok(table) = primary.as_ref() {
            tracing::debug!("Read {} xref entries", table.len());
        }

        let attempt = primary
            .map_err(PdfError::from)
            .and_then(|table| Self::from_table(bytes, version, table, &options, false));

        let doc = match attempt {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("Cross-reference data unusable ({}); rebuilding by scan", e);
                let (table, stats) = recover_xref(bytes, &options)?;
                tracing::debug!(
                    "Recovered {} objects ({} compressed)",
                    stats.objects_found,
                    stats.compressed_objects_found
                );
                Self::from_table(bytes, version, table, &options, true)?
            }
        };

        tracing::debug!(
            "Parsed PDF {}: {} objects{}",
            doc.version,
            doc.slots.len(),
            if doc.recovered { " (xref rebuilt)" } else { "" }
        );
        Ok(doc)
    }

    fn from_table(
        bytes: &[u8],
        version: PdfVersion,
        table: XRefTable,
        options: &ParseOptions,
        recovered: bool,
    ) -> Result<Self> {
        let (entries, trailer) = table.into_parts();
        let mut slots = BTreeMap::new();
        let mut object_streams = BTreeMap::new();

        for (number, entry) in entries {
            if number == 0 {
                continue;
            }
            let (generation, location) = match entry {
                XRefEntry::Free { .. } => continue,
                XRefEntry::InUse { offset, generation } => (generation, Location::Offset(offset)),
                XRefEntry::Compressed {
                    stream_number,
                    index,
                } => {
                    object_streams.entry(stream_number).or_insert_with(OnceLock::new);
                    (0, Location::Compressed { stream_number, index })
                }
            };
            slots.insert(
                number,
                Slot {
                    generation,
                    location,
                    value: OnceLock::new(),
                },
            );
        }

        let max_object_number = slots.keys().next_back().copied().unwrap_or(0);
        let doc = Document {
            version,
            trailer,
            slots,
            object_streams,
            source: bytes.to_vec(),
            options: options.clone(),
            max_object_number,
            recovered,
        };

        // The catalog must resolve to a dictionary for the document to be usable
        let root = doc.trailer.root()?;
        // Object streams of an encrypted file are unreadable until decryption
        if doc.is_encrypted() && doc.is_compressed(root) {
            return Ok(doc);
        }
        match doc.get(root) {
            Ok(object) if object.as_dict().is_some() => Ok(doc),
            Ok(_) => Err(ParseError::MissingRoot.into()),
            Err(PdfError::Parse(ParseError::InvalidReference(..))) => Err(ParseError::MissingRoot.into()),
            Err(e) => Err(e),
        }
    }

    /// Look up an object by id, parsing it on first access.
    pub fn get(&self, id: ObjectId) -> Result<&Object> {
        let slot = self
            .slots
            .get(&id.number())
            .filter(|slot| slot.generation == id.generation())
            .ok_or(ParseError::InvalidReference(id.number(), id.generation()))?;

        if let Some(object) = slot.value.get() {
            return Ok(object);
        }

        let object = self.load(id.number(), slot.location)?;
        Ok(slot.value.get_or_init(|| object))
    }

    /// Follow indirect references until a direct value is reached.
    ///
    /// A reference to a missing object resolves to null.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> Result<&'a Object> {
        let mut current = object;
        for _ in 0..MAX_REFERENCE_HOPS {
            match current {
                Object::Reference(id) if !self.contains(*id) => return Ok(&NULL),
                Object::Reference(id) => current = self.get(*id)?,
                direct => return Ok(direct),
            }
        }
        match current {
            Object::Reference(id) => Err(ParseError::CircularReference(*id).into()),
            direct => Ok(direct),
        }
    }

    /// Mutable access to an object, materialising it first.
    pub fn get_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.get(id)?;
        self.slots
            .get_mut(&id.number())
            .and_then(|slot| slot.value.get_mut())
            .ok_or_else(|| ParseError::InvalidReference(id.number(), id.generation()).into())
    }

    /// Mutable access to a dictionary object (or a stream's dictionary).
    pub fn get_dict_mut(&mut self, id: ObjectId) -> Result<&mut Dictionary> {
        self.get_mut(id)?
            .as_dict_mut()
            .ok_or_else(|| PdfError::InvalidStructure(format!("object {id} is not a dictionary")))
    }

    fn load(&self, number: u32, location: Location) -> Result<Object> {
        match location {
            Location::Offset(offset) => {
                let mut lexer = Lexer::at(&self.source, offset);
                let resolve_length = |id: ObjectId| self.length_value(id);
                let (id, object) = parse_indirect_object(&mut lexer, &self.options, &resolve_length)?;
                if id.number() != number {
                    return Err(ParseError::malformed(
                        offset,
                        format!("expected object {number}, found {id}"),
                    )
                    .into());
                }
                Ok(object)
            }
            Location::Compressed {
                stream_number,
                index,
            } => self
                .object_stream(stream_number)?
                .get(index, number)
                .cloned()
                .ok_or_else(|| ParseError::InvalidReference(number, 0).into()),
            // In-memory slots are always initialised
            Location::Memory => Ok(Object::Null),
        }
    }

    /// Integer value of an indirect `/Length`, without recursing into further lengths.
    fn length_value(&self, id: ObjectId) -> Option<i64> {
        let slot = self.slots.get(&id.number())?;
        if let Some(object) = slot.value.get() {
            return object.as_integer();
        }
        match slot.location {
            Location::Offset(offset) => {
                let mut lexer = Lexer::at(&self.source, offset);
                parse_indirect_object(&mut lexer, &self.options, &|_| None)
                    .ok()
                    .and_then(|(_, object)| object.as_integer())
            }
            // Only an already parsed object stream is consulted here
            Location::Compressed {
                stream_number,
                index,
            } => self
                .object_streams
                .get(&stream_number)?
                .get()?
                .get(index, id.number())?
                .as_integer(),
            Location::Memory => None,
        }
    }

    fn object_stream(&self, stream_number: u32) -> Result<&ObjectStream> {
        let cell = self
            .object_streams
            .get(&stream_number)
            .ok_or(ParseError::InvalidReference(stream_number, 0))?;
        if let Some(parsed) = cell.get() {
            return Ok(parsed);
        }

        // Object streams cannot themselves be compressed
        let slot = self
            .slots
            .get(&stream_number)
            .filter(|slot| !matches!(slot.location, Location::Compressed { .. }))
            .ok_or_else(|| {
                ParseError::InvalidXRef(format!("object stream {stream_number} is not a plain object"))
            })?;

        let object = self.get(ObjectId::new(stream_number, slot.generation))?;
        let stream = object.as_stream().ok_or_else(|| {
            ParseError::InvalidXRef(format!("object {stream_number} is not an object stream"))
        })?;
        let parsed = ObjectStream::parse(stream, &self.options)?;
        tracing::debug!("Parsed object stream {} ({} objects)", stream_number, parsed.len());
        Ok(cell.get_or_init(|| parsed))
    }

    /// Add or replace an object.
    pub fn insert(&mut self, id: ObjectId, object: impl Into<Object>) {
        self.max_object_number = self.max_object_number.max(id.number());
        self.slots.insert(
            id.number(),
            Slot {
                generation: id.generation(),
                location: Location::Memory,
                value: OnceLock::from(object.into()),
            },
        );
    }

    /// Reserve a fresh object number.
    pub fn allocate(&mut self) -> ObjectId {
        self.max_object_number += 1;
        ObjectId::new(self.max_object_number, 0)
    }

    /// Allocate an id and store `object` under it.
    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        let id = self.allocate();
        self.insert(id, object);
        id
    }

    /// Remove an object, returning its value if it could be read.
    pub fn remove(&mut self, id: ObjectId) -> Option<Object> {
        if !self.contains(id) {
            return None;
        }
        let _ = self.get(id);
        self.slots
            .remove(&id.number())
            .and_then(|slot| slot.value.into_inner())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.slots
            .get(&id.number())
            .is_some_and(|slot| slot.generation == id.generation())
    }

    /// Ids of every object in the arena, in object-number order
    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.slots
            .iter()
            .map(|(&number, slot)| ObjectId::new(number, slot.generation))
    }

    /// Ids of objects stored inside object streams
    pub fn is_compressed(&self, id: ObjectId) -> bool {
        self.slots
            .get(&id.number())
            .is_some_and(|slot| matches!(slot.location, Location::Compressed { .. }))
    }

    /// Ids of the object streams this document was read from
    pub fn object_stream_ids(&self) -> Vec<ObjectId> {
        self.object_streams
            .keys()
            .filter_map(|&number| {
                self.slots
                    .get(&number)
                    .map(|slot| ObjectId::new(number, slot.generation))
            })
            .collect()
    }

    /// Forget parsed object streams so they are re-read from their
    /// (since rewritten) stream objects on next access.
    pub(crate) fn reset_object_streams(&mut self) {
        for cell in self.object_streams.values_mut() {
            *cell = OnceLock::new();
        }
    }

    /// Size of the bytes this document was parsed from
    pub(crate) fn source_len(&self) -> usize {
        self.source.len()
    }

    /// Highest object number in use or reserved
    pub fn max_object_number(&self) -> u32 {
        self.max_object_number
    }

    /// Set of ids reachable from `roots` through indirect references.
    ///
    /// References to missing objects are skipped.
    pub fn reachable_from(&self, roots: impl IntoIterator<Item = ObjectId>) -> Result<BTreeSet<ObjectId>> {
        let mut reachable = BTreeSet::new();
        let mut stack: Vec<ObjectId> = roots.into_iter().collect();

        while let Some(id) = stack.pop() {
            if !self.contains(id) || !reachable.insert(id) {
                continue;
            }
            self.get(id)?.for_each_reference(&mut |child| {
                if !reachable.contains(&child) {
                    stack.push(child);
                }
            });
        }

        Ok(reachable)
    }

    /// Objects that the trailer keeps alive: Root, Info and Encrypt.
    pub fn trailer_roots(&self) -> Vec<ObjectId> {
        ["Root", "Info", "Encrypt"]
            .iter()
            .filter_map(|key| self.trailer.dict().get_reference(key))
            .collect()
    }

    /// Parse every reachable object now, so later failures cannot happen mid-write.
    pub fn load_reachable(&self) -> Result<BTreeSet<ObjectId>> {
        self.reachable_from(self.trailer_roots())
    }

    pub fn catalog_id(&self) -> Result<ObjectId> {
        Ok(self.trailer.root()?)
    }

    /// The document catalog
    pub fn catalog(&self) -> Result<&Dictionary> {
        let id = self.catalog_id()?;
        self.get(id)?
            .as_dict()
            .ok_or_else(|| ParseError::MissingRoot.into())
    }

    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut Trailer {
        &mut self.trailer
    }

    pub fn version(&self) -> PdfVersion {
        self.version
    }

    pub fn set_version(&mut self, version: PdfVersion) {
        self.version = version;
    }

    pub fn is_encrypted(&self) -> bool {
        self.trailer.is_encrypted()
    }

    /// Whether the cross-reference table had to be rebuilt by scanning
    pub fn was_recovered(&self) -> bool {
        self.recovered
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Serialize with the default writer settings and this document's version.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(WriterConfig {
            pdf_version: self.version.to_string(),
            ..WriterConfig::default()
        })
    }

    pub fn to_bytes_with(&self, config: WriterConfig) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        PdfWriter::with_config(&mut buffer, config).write_document(self)?;
        Ok(buffer)
    }

    /// Serialize to a file. Nothing is written if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal single-page file with a correct xref table.
    pub(crate) fn one_page_pdf() -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
            "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>",
            "<< /Length 5 0 R >>\nstream\nBT ET\nendstream",
            "5",
        ];
        let mut data = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(data.len());
            data.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = data.len();
        data.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            data.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        data.extend_from_slice(
            format!("trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n", objects.len() + 1)
                .as_bytes(),
        );
        data
    }

    #[test]
    fn test_new_document_is_empty() {
        let doc = Document::new();
        assert_eq!(doc.page_count().unwrap(), 0);
        assert_eq!(doc.catalog().unwrap().get_type(), Some("Catalog"));
        assert_eq!(doc.max_object_number(), 2);
    }

    #[test]
    fn test_parse_resolves_lazily_and_caches() {
        let doc = Document::parse(&one_page_pdf()).unwrap();
        assert_eq!(doc.version(), PdfVersion::new(1, 4));
        assert!(!doc.was_recovered());

        let id = ObjectId::new(4, 0);
        let first = doc.get(id).unwrap() as *const Object;
        let second = doc.get(id).unwrap() as *const Object;
        assert_eq!(first, second);
        assert_eq!(doc.get(id).unwrap().as_stream().unwrap().data(), b"BT ET");
    }

    #[test]
    fn test_missing_reference_resolves_to_null() {
        let doc = Document::parse(&one_page_pdf()).unwrap();
        let dangling = Object::Reference(ObjectId::new(99, 0));
        assert!(doc.resolve(&dangling).unwrap().is_null());
        assert!(doc.get(ObjectId::new(99, 0)).is_err());
    }

    #[test]
    fn test_insert_allocate_remove() {
        let mut doc = Document::new();
        let id = doc.add_object(Object::Integer(7));
        assert_eq!(id, ObjectId::new(3, 0));
        assert_eq!(doc.get(id).unwrap(), &Object::Integer(7));

        *doc.get_mut(id).unwrap() = Object::Integer(8);
        assert_eq!(doc.remove(id), Some(Object::Integer(8)));
        assert!(!doc.contains(id));
        assert_eq!(doc.allocate(), ObjectId::new(4, 0));
    }

    #[test]
    fn test_reachable_from_skips_orphans() {
        let mut doc = Document::parse(&one_page_pdf()).unwrap();
        let orphan = doc.add_object(Object::string(b"unused".to_vec()));
        let reachable = doc.load_reachable().unwrap();
        assert!(reachable.contains(&ObjectId::new(5, 0)));
        assert!(!reachable.contains(&orphan));
    }

    #[test]
    fn test_broken_xref_is_rebuilt() {
        let mut data = one_page_pdf();
        // Point startxref somewhere useless
        let at = data.windows(9).rposition(|w| w == b"startxref").unwrap();
        data.truncate(at);
        data.extend_from_slice(b"startxref\n3\n%%EOF\n");

        let doc = Document::parse(&data).unwrap();
        assert!(doc.was_recovered());
        assert_eq!(doc.page_count().unwrap(), 1);
    }

    #[test]
    fn test_garbage_is_missing_root() {
        let err = Document::parse(b"%PDF-1.4\nnothing to see").unwrap_err();
        assert!(matches!(err, PdfError::Parse(ParseError::MissingRoot)));
    }

    #[test]
    fn test_strict_mode_requires_header() {
        let mut data = b"junk".to_vec();
        data.extend_from_slice(&one_page_pdf());
        assert!(Document::parse_with_options(&data, ParseOptions::strict()).is_err());
    }

    #[test]
    fn test_document_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Document>();
    }
}
