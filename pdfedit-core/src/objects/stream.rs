use crate::compression;
use crate::error::Result;
use crate::objects::{Dictionary, Object};
use crate::parser::filters;
use crate::parser::ParseResult;

/// Stream object: a dictionary plus the raw, still-filtered body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    dictionary: Dictionary,
    data: Vec<u8>,
}

impl Stream {
    /// Builds a stream and sets `/Length` to the body size.
    pub fn new(dictionary: Dictionary, data: Vec<u8>) -> Self {
        let mut dictionary = dictionary;
        dictionary.set("Length", data.len());
        Self { dictionary, data }
    }

    /// Builds a stream exactly as parsed, leaving `/Length` untouched.
    pub(crate) fn from_parts(dictionary: Dictionary, data: Vec<u8>) -> Self {
        Self { dictionary, data }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn dictionary_mut(&mut self) -> &mut Dictionary {
        &mut self.dictionary
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replaces the body and keeps `/Length` in step.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.dictionary.set("Length", data.len());
        self.data = data;
    }

    pub fn into_parts(self) -> (Dictionary, Vec<u8>) {
        (self.dictionary, self.data)
    }

    pub fn set_filter(&mut self, filter: &str) {
        self.dictionary.set("Filter", Object::name(filter));
    }

    /// Filter names in application order.
    pub fn filters(&self) -> Vec<&str> {
        match self.dictionary.get("Filter") {
            Some(Object::Name(name)) => vec![name.as_str()],
            Some(Object::Array(items)) => items.iter().filter_map(|f| f.as_name()).collect(),
            _ => Vec::new(),
        }
    }

    /// Body with every filter removed.
    pub fn decoded_data(&self) -> ParseResult<Vec<u8>> {
        filters::decode_stream(&self.data, &self.dictionary)
    }

    /// Flate-compresses an unfiltered body in place.
    pub fn compress_flate(&mut self) -> Result<()> {
        let compressed = compression::compress(&self.data)?;
        self.set_data(compressed);
        self.set_filter("FlateDecode");
        self.dictionary.remove("DecodeParms");
        Ok(())
    }
}
