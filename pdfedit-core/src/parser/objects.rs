//! PDF Object Parser
//!
//! Parses PDF objects from tokens according to ISO 32000-1 Section 7.3

use super::lexer::{is_whitespace, Lexer, Token};
use super::{ParseError, ParseOptions, ParseResult};
use crate::objects::{Dictionary, Object, ObjectId, Stream};

/// Resolves an indirect `/Length` to its integer value.
pub type LengthResolver<'r> = &'r dyn Fn(ObjectId) -> Option<i64>;

/// Parse a single direct object
pub fn parse_object(lexer: &mut Lexer<'_>, options: &ParseOptions) -> ParseResult<Object> {
    let token = lexer.next_token()?;
    parse_from_token(lexer, token, options, 0)
}

/// Parse `N G obj ... endobj` at the lexer's position.
///
/// Streams are only recognised here, since a stream is always an indirect
/// object. `resolve_length` is consulted when `/Length` is a reference.
pub fn parse_indirect_object(
    lexer: &mut Lexer<'_>,
    options: &ParseOptions,
    resolve_length: LengthResolver<'_>,
) -> ParseResult<(ObjectId, Object)> {
    let start = lexer.position();
    let id = parse_object_header(lexer)?;

    let object = parse_object(lexer, options)?;

    let object = match object {
        Object::Dictionary(dict) => match lexer.next_token()? {
            Token::Stream => {
                let data = parse_stream_body(lexer, &dict, options, resolve_length)?;
                Object::Stream(Stream::from_parts(dict, data))
            }
            other => {
                lexer.push_token(other);
                Object::Dictionary(dict)
            }
        },
        other => other,
    };

    match lexer.next_token()? {
        Token::EndObj => {}
        other if options.strict_mode => {
            return Err(ParseError::UnexpectedToken {
                expected: "endobj".to_string(),
                found: format!("{other:?}"),
            })
        }
        _ => tracing::debug!("Object {} at byte {} is missing endobj", id, start),
    }

    Ok((id, object))
}

/// Parse the `N G obj` prefix.
pub fn parse_object_header(lexer: &mut Lexer<'_>) -> ParseResult<ObjectId> {
    let start = lexer.position();
    let number = match lexer.next_token()? {
        Token::Integer(n) => u32::try_from(n)
            .map_err(|_| ParseError::malformed(start, format!("Invalid object number {n}")))?,
        Token::Eof => return Err(ParseError::truncated("expected object header")),
        other => {
            return Err(ParseError::malformed(
                start,
                format!("Expected object number, found {other:?}"),
            ))
        }
    };
    let generation = match lexer.next_token()? {
        Token::Integer(g) => u16::try_from(g)
            .map_err(|_| ParseError::malformed(start, format!("Invalid generation {g}")))?,
        other => {
            return Err(ParseError::malformed(
                start,
                format!("Expected generation number, found {other:?}"),
            ))
        }
    };
    match lexer.next_token()? {
        Token::Obj => Ok(ObjectId::new(number, generation)),
        other => Err(ParseError::malformed(
            start,
            format!("Expected 'obj', found {other:?}"),
        )),
    }
}

fn parse_from_token(
    lexer: &mut Lexer<'_>,
    token: Token,
    options: &ParseOptions,
    depth: usize,
) -> ParseResult<Object> {
    match token {
        Token::Null => Ok(Object::Null),
        Token::Boolean(b) => Ok(Object::Boolean(b)),
        Token::Integer(i) => Ok(Object::Integer(i)),
        Token::Real(r) => Ok(Object::Real(r)),
        Token::String(s) => Ok(Object::String(s)),
        Token::Name(n) => Ok(Object::Name(n)),
        Token::Reference(number, generation) => {
            Ok(Object::Reference(ObjectId::new(number, generation)))
        }
        Token::ArrayStart => parse_array(lexer, options, depth + 1),
        Token::DictStart => parse_dictionary(lexer, options, depth + 1).map(Object::Dictionary),
        Token::Comment(_) => {
            let next = lexer.next_token()?;
            parse_from_token(lexer, next, options, depth)
        }
        Token::Eof => Err(ParseError::truncated("expected object")),
        other => Err(ParseError::UnexpectedToken {
            expected: "PDF object".to_string(),
            found: format!("{other:?}"),
        }),
    }
}

fn check_depth(lexer: &Lexer<'_>, options: &ParseOptions, depth: usize) -> ParseResult<()> {
    if depth > options.max_nesting_depth {
        Err(ParseError::malformed(
            lexer.position(),
            format!("Nesting deeper than {} levels", options.max_nesting_depth),
        ))
    } else {
        Ok(())
    }
}

fn parse_array(lexer: &mut Lexer<'_>, options: &ParseOptions, depth: usize) -> ParseResult<Object> {
    check_depth(lexer, options, depth)?;
    let mut elements = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::ArrayEnd => break,
            Token::Comment(_) => continue,
            Token::Eof => return Err(ParseError::truncated("unterminated array")),
            token => elements.push(parse_from_token(lexer, token, options, depth)?),
        }
    }

    Ok(Object::Array(elements))
}

fn parse_dictionary(
    lexer: &mut Lexer<'_>,
    options: &ParseOptions,
    depth: usize,
) -> ParseResult<Dictionary> {
    check_depth(lexer, options, depth)?;
    let mut dict = Dictionary::new();

    loop {
        match lexer.next_token()? {
            Token::DictEnd => break,
            Token::Comment(_) => continue,
            Token::Eof => return Err(ParseError::truncated("unterminated dictionary")),
            Token::Name(key) => {
                let value_token = lexer.next_token()?;
                // "/Key >>" shows up in damaged files; read it as null
                if value_token == Token::DictEnd && !options.strict_mode {
                    dict.set(key, Object::Null);
                    break;
                }
                let value = parse_from_token(lexer, value_token, options, depth)?;
                dict.set(key, value);
            }
            token => {
                return Err(ParseError::UnexpectedToken {
                    expected: "dictionary key (name) or >>".to_string(),
                    found: format!("{token:?}"),
                })
            }
        }
    }

    Ok(dict)
}

/// Read stream bytes following the `stream` keyword and consume `endstream`.
fn parse_stream_body(
    lexer: &mut Lexer<'_>,
    dict: &Dictionary,
    options: &ParseOptions,
    resolve_length: LengthResolver<'_>,
) -> ParseResult<Vec<u8>> {
    if let Err(e) = lexer.read_newline() {
        if options.strict_mode {
            return Err(e);
        }
        // "stream  \r\n" or data directly after the keyword
        while matches!(lexer.data().get(lexer.position()), Some(b' ' | b'\t')) {
            lexer.set_position(lexer.position() + 1);
        }
        let _ = lexer.read_newline();
    }

    let start = lexer.position();
    let data = lexer.data();

    let declared = match dict.get("Length") {
        Some(Object::Integer(n)) => usize::try_from(*n).ok(),
        Some(Object::Reference(id)) => resolve_length(*id).and_then(|n| usize::try_from(n).ok()),
        _ => None,
    };

    if let Some(length) = declared {
        if let Some(end) = start.checked_add(length).filter(|&end| end <= data.len()) {
            let mut after = Lexer::at(data, end);
            if after.next_token().ok() == Some(Token::EndStream) {
                lexer.set_position(after.position());
                return Ok(data[start..end].to_vec());
            }
        }
    }

    if !options.lenient_streams {
        return match declared {
            None => Err(ParseError::MissingKey("Length".to_string())),
            Some(length) if start.saturating_add(length) > data.len() => Err(
                ParseError::truncated(format!("stream of {length} bytes at offset {start}")),
            ),
            Some(length) => Err(ParseError::malformed(
                start,
                format!("Stream /Length {length} is not followed by endstream"),
            )),
        };
    }

    let window = declared
        .unwrap_or(0)
        .saturating_add(options.max_recovery_bytes);
    let distance = lexer
        .find_keyword_ahead("endstream", window)
        .ok_or_else(|| ParseError::truncated(format!("stream at offset {start} has no endstream")))?;

    let keyword_at = start + distance;
    let mut end = keyword_at;
    // The EOL before endstream is not part of the data
    if end > start && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > start && data[end - 1] == b'\r' {
        end -= 1;
    }

    tracing::warn!(
        "Stream at offset {}: /Length {:?} is wrong, recovered {} bytes by searching for endstream",
        start,
        declared,
        end - start
    );

    lexer.set_position(keyword_at + "endstream".len());
    Ok(data[start..end].to_vec())
}

/// True when `data[offset..]` starts with `N G obj`.
pub fn looks_like_object_header(data: &[u8], offset: usize) -> bool {
    let mut lexer = Lexer::at(data, offset);
    if offset > data.len() || data.get(offset).is_some_and(|&b| is_whitespace(b)) {
        return false;
    }
    parse_object_header(&mut lexer).is_ok()
}
