//! PDF Trailer
//!
//! Typed view over the trailer dictionary (ISO 32000-1 Section 7.5.5). For
//! cross-reference streams the stream dictionary plays the same role.

use super::{ParseError, ParseResult};
use crate::objects::{Dictionary, Object, ObjectId};

/// Keys that describe one xref section and never carry over between sections.
const SECTION_KEYS: &[&str] = &[
    "Prev", "XRefStm", "Type", "W", "Index", "Length", "Filter", "DecodeParms",
];

/// PDF Trailer information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trailer {
    dict: Dictionary,
}

impl Trailer {
    pub fn new(dict: Dictionary) -> Self {
        Self { dict }
    }

    /// Number of entries in the xref table (`Size`)
    pub fn size(&self) -> Option<u32> {
        self.dict
            .get_integer("Size")
            .and_then(|n| u32::try_from(n).ok())
    }

    /// Document catalog reference
    pub fn root(&self) -> ParseResult<ObjectId> {
        self.dict.get_reference("Root").ok_or(ParseError::MissingRoot)
    }

    pub fn info(&self) -> Option<ObjectId> {
        self.dict.get_reference("Info")
    }

    pub fn encrypt(&self) -> Option<ObjectId> {
        self.dict.get_reference("Encrypt")
    }

    pub fn is_encrypted(&self) -> bool {
        self.dict.contains_key("Encrypt")
    }

    /// First element of the `ID` array, used as the encryption salt
    pub fn first_id(&self) -> Option<&[u8]> {
        self.dict
            .get("ID")
            .and_then(Object::as_array)
            .and_then(|ids| ids.first())
            .and_then(Object::as_string)
    }

    /// Offset of the previous xref section
    pub fn prev(&self) -> Option<usize> {
        self.offset_entry("Prev")
    }

    /// Offset of the xref stream in a hybrid-reference file
    pub fn xref_stm(&self) -> Option<usize> {
        self.offset_entry("XRefStm")
    }

    fn offset_entry(&self, key: &str) -> Option<usize> {
        match self.dict.get(key)? {
            Object::Integer(n) => usize::try_from(*n).ok(),
            // Some writers emit offsets as reals
            Object::Real(r) if *r >= 0.0 => Some(*r as usize),
            _ => None,
        }
    }

    /// Fill in entries that only an older section carries.
    pub fn merge_older(&mut self, older: &Dictionary) {
        for (key, value) in older.iter() {
            if !SECTION_KEYS.contains(&key.as_str()) && !self.dict.contains_key(key) {
                self.dict.set(key.clone(), value.clone());
            }
        }
    }

    /// The dictionary without per-section keys, ready to be written out.
    pub fn document_entries(&self) -> Dictionary {
        self.dict
            .iter()
            .filter(|(key, _)| !SECTION_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    pub fn dict_mut(&mut self) -> &mut Dictionary {
        &mut self.dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trailer_dict() -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Size", 12);
        dict.set("Root", ObjectId::new(1, 0));
        dict.set("Info", ObjectId::new(2, 0));
        dict.set("Prev", 1234);
        dict.set(
            "ID",
            vec![Object::string(b"abc".to_vec()), Object::string(b"def".to_vec())],
        );
        dict
    }

    #[test]
    fn test_trailer_accessors() {
        let trailer = Trailer::new(trailer_dict());
        assert_eq!(trailer.size(), Some(12));
        assert_eq!(trailer.root().unwrap(), ObjectId::new(1, 0));
        assert_eq!(trailer.info(), Some(ObjectId::new(2, 0)));
        assert_eq!(trailer.prev(), Some(1234));
        assert_eq!(trailer.first_id(), Some(&b"abc"[..]));
        assert!(!trailer.is_encrypted());
        assert_eq!(trailer.encrypt(), None);
    }

    #[test]
    fn test_missing_root() {
        let trailer = Trailer::new(Dictionary::new());
        assert!(matches!(trailer.root(), Err(ParseError::MissingRoot)));
    }

    #[test]
    fn test_prev_as_real() {
        let mut dict = Dictionary::new();
        dict.set("Prev", 4096.0);
        assert_eq!(Trailer::new(dict).prev(), Some(4096));
    }

    #[test]
    fn test_merge_older_keeps_newer_values() {
        let mut newer = Dictionary::new();
        newer.set("Size", 20);
        newer.set("Prev", 10);
        let mut trailer = Trailer::new(newer);

        trailer.merge_older(&trailer_dict());
        assert_eq!(trailer.size(), Some(20));
        assert_eq!(trailer.root().unwrap(), ObjectId::new(1, 0));
        assert_eq!(trailer.prev(), Some(10));
    }

    #[test]
    fn test_document_entries_drop_section_keys() {
        let mut dict = trailer_dict();
        dict.set("XRefStm", 99);
        dict.set("W", vec![Object::from(1), Object::from(2), Object::from(1)]);
        let entries = Trailer::new(dict).document_entries();
        assert!(entries.contains_key("Root"));
        assert!(entries.contains_key("ID"));
        assert!(!entries.contains_key("Prev"));
        assert!(!entries.contains_key("XRefStm"));
        assert!(!entries.contains_key("W"));
    }
}
