//! PDF Object Stream Parser
//!
//! Handles compressed objects stored in object streams (PDF 1.5+)

use super::lexer::{Lexer, Token};
use super::objects::parse_object;
use super::{ParseError, ParseOptions, ParseResult};
use crate::objects::{Object, Stream};

/// Represents a PDF object stream containing compressed objects
#[derive(Debug, Clone)]
pub struct ObjectStream {
    /// Parsed objects in stream order, paired with their object numbers
    objects: Vec<(u32, Object)>,
}

impl ObjectStream {
    /// Parse an object stream and all the objects it holds
    pub fn parse(stream: &Stream, options: &ParseOptions) -> ParseResult<Self> {
        let dict = stream.dictionary();

        let n = dict
            .get_integer("N")
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ParseError::MissingKey("N".to_string()))?;

        let first = dict
            .get_integer("First")
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ParseError::MissingKey("First".to_string()))?;

        let data = stream.decoded_data()?;
        let mut lexer = Lexer::new(&data);

        // Read object number/offset pairs
        let mut offsets = Vec::with_capacity(n.min(data.len()));
        for _ in 0..n {
            let number = match lexer.next_token()? {
                Token::Integer(n) => u32::try_from(n).ok(),
                _ => None,
            };
            let offset = match lexer.next_token()? {
                Token::Integer(n) => usize::try_from(n).ok(),
                _ => None,
            };
            match number.zip(offset) {
                Some(pair) => offsets.push(pair),
                None => {
                    return Err(ParseError::malformed(
                        lexer.position(),
                        "Expected object number and offset in object stream header",
                    ))
                }
            }
        }

        let mut objects = Vec::with_capacity(offsets.len());
        for (number, offset) in offsets {
            let mut object_lexer = Lexer::at(&data, first.saturating_add(offset));
            let object = parse_object(&mut object_lexer, options)?;
            objects.push((number, object));
        }

        Ok(ObjectStream { objects })
    }

    /// Get the object at `index`, checking it carries the expected number
    pub fn get(&self, index: u32, number: u32) -> Option<&Object> {
        match self.objects.get(index as usize) {
            Some((n, object)) if *n == number => Some(object),
            // Index disagrees with the header; fall back to a search
            _ => self.get_object(number),
        }
    }

    /// Get an object by its object number
    pub fn get_object(&self, number: u32) -> Option<&Object> {
        self.objects
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, object)| object)
    }

    /// Object numbers stored in this stream, in order
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.objects.iter().map(|(n, _)| *n)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
