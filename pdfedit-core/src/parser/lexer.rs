//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2. The lexer works
//! directly on the in-memory document buffer so that the parser can jump to any
//! xref offset without re-reading the file.

use super::{ParseError, ParseResult};

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Boolean: true or false
    Boolean(bool),

    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// String (literal or hexadecimal), already unescaped
    String(Vec<u8>),

    /// Name object without the leading slash (e.g., Type)
    Name(String),

    /// Left square bracket [
    ArrayStart,

    /// Right square bracket ]
    ArrayEnd,

    /// Dictionary start <<
    DictStart,

    /// Dictionary end >>
    DictEnd,

    /// Stream keyword
    Stream,

    /// Endstream keyword
    EndStream,

    /// Obj keyword
    Obj,

    /// Endobj keyword
    EndObj,

    /// StartXRef keyword
    StartXRef,

    /// Xref keyword
    XRef,

    /// Trailer keyword
    Trailer,

    /// Reference (e.g., 1 0 R)
    Reference(u32, u16),

    /// Null object
    Null,

    /// Comment (usually ignored)
    Comment(String),

    /// End of input
    Eof,
}

/// PDF whitespace characters (Table 1)
pub fn is_whitespace(ch: u8) -> bool {
    matches!(ch, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

/// PDF delimiter characters (Table 2)
pub fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(ch: u8) -> bool {
    !is_whitespace(ch) && !is_delimiter(ch)
}

/// PDF Lexer for tokenizing a byte buffer
pub struct Lexer<'a> {
    data: &'a [u8],
    position: usize,
    token_buffer: Vec<Token>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Create a lexer positioned at `position`
    pub fn at(data: &'a [u8], position: usize) -> Self {
        Self {
            data,
            position: position.min(data.len()),
            token_buffer: Vec::new(),
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> ParseResult<Token> {
        if let Some(token) = self.token_buffer.pop() {
            return Ok(token);
        }

        self.skip_whitespace();

        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        match ch {
            b'%' => Ok(self.read_comment()),
            b'/' => self.read_name(),
            b'(' => self.read_literal_string(),
            b'<' => self.read_angle_bracket(),
            b'>' => {
                self.consume_char();
                if self.peek_char() == Some(b'>') {
                    self.consume_char();
                    Ok(Token::DictEnd)
                } else {
                    Err(ParseError::malformed(self.position, "Expected '>' after '>'"))
                }
            }
            b'[' => {
                self.consume_char();
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.consume_char();
                Ok(Token::ArrayEnd)
            }
            b'+' | b'-' | b'0'..=b'9' | b'.' => self.read_number(),
            _ if ch.is_ascii_alphabetic() => self.read_keyword(),
            _ => Err(ParseError::malformed(
                self.position,
                format!("Unexpected character: {:?}", ch as char),
            )),
        }
    }

    /// Peek at the next character without consuming it
    fn peek_char(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    /// Consume the next character
    fn consume_char(&mut self) -> Option<u8> {
        let ch = self.peek_char();
        if ch.is_some() {
            self.position += 1;
        }
        ch
    }

    /// Skip whitespace and return the number of bytes skipped
    pub fn skip_whitespace(&mut self) -> usize {
        let start = self.position;
        while matches!(self.peek_char(), Some(ch) if is_whitespace(ch)) {
            self.position += 1;
        }
        self.position - start
    }

    /// Read a comment (from % to end of line)
    fn read_comment(&mut self) -> Token {
        self.consume_char();
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if ch == b'\n' || ch == b'\r' {
                break;
            }
            self.position += 1;
        }
        Token::Comment(String::from_utf8_lossy(&self.data[start..self.position]).into_owned())
    }

    /// Read a name object (e.g., /Type). Bytes map one-to-one onto chars.
    fn read_name(&mut self) -> ParseResult<Token> {
        self.consume_char();
        let mut name = String::new();

        while let Some(ch) = self.peek_char() {
            if !is_regular(ch) {
                break;
            }
            self.consume_char();

            // /A#20B means "A B"
            if ch == b'#' {
                let hex = self.data.get(self.position..self.position + 2);
                let value = hex
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match value {
                    Some(value) => {
                        self.position += 2;
                        name.push(value as char);
                    }
                    // A lone '#' is kept literally, as most readers do
                    None => name.push('#'),
                }
            } else {
                name.push(ch as char);
            }
        }

        Ok(Token::Name(name))
    }

    /// Read a literal string (parentheses)
    fn read_literal_string(&mut self) -> ParseResult<Token> {
        self.consume_char();
        let mut string = Vec::new();
        let mut paren_depth = 1;

        while paren_depth > 0 {
            let ch = self
                .consume_char()
                .ok_or_else(|| ParseError::truncated("unterminated literal string"))?;

            match ch {
                b'\\' => {
                    let escaped = self
                        .consume_char()
                        .ok_or_else(|| ParseError::truncated("unterminated literal string"))?;
                    match escaped {
                        b'n' => string.push(b'\n'),
                        b'r' => string.push(b'\r'),
                        b't' => string.push(b'\t'),
                        b'b' => string.push(0x08),
                        b'f' => string.push(0x0C),
                        b'0'..=b'7' => {
                            let mut value = (escaped - b'0') as u32;
                            for _ in 0..2 {
                                match self.peek_char() {
                                    Some(next @ b'0'..=b'7') => {
                                        self.consume_char();
                                        value = value * 8 + (next - b'0') as u32;
                                    }
                                    _ => break,
                                }
                            }
                            string.push(value as u8);
                        }
                        // Line continuation
                        b'\r' => {
                            if self.peek_char() == Some(b'\n') {
                                self.consume_char();
                            }
                        }
                        b'\n' => {}
                        other => string.push(other),
                    }
                }
                b'(' => {
                    paren_depth += 1;
                    string.push(ch);
                }
                b')' => {
                    paren_depth -= 1;
                    if paren_depth > 0 {
                        string.push(ch);
                    }
                }
                _ => string.push(ch),
            }
        }

        Ok(Token::String(string))
    }

    /// Read angle bracket tokens (hex strings or dict markers)
    fn read_angle_bracket(&mut self) -> ParseResult<Token> {
        self.consume_char();

        if self.peek_char() == Some(b'<') {
            self.consume_char();
            return Ok(Token::DictStart);
        }

        let mut digits = Vec::new();
        loop {
            let ch = self
                .consume_char()
                .ok_or_else(|| ParseError::truncated("unterminated hex string"))?;
            match ch {
                b'>' => break,
                _ if ch.is_ascii_hexdigit() => digits.push(ch),
                _ if is_whitespace(ch) => {}
                _ => {
                    return Err(ParseError::malformed(
                        self.position - 1,
                        "Invalid character in hex string",
                    ))
                }
            }
        }

        // Odd number of digits: the final digit is followed by an implied 0
        if digits.len() % 2 != 0 {
            digits.push(b'0');
        }

        let bytes = digits
            .chunks(2)
            .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
            .collect();

        Ok(Token::String(bytes))
    }

    /// Read a number (integer or real). An unsigned integer followed by
    /// `<gen> R` is returned as a reference.
    fn read_number(&mut self) -> ParseResult<Token> {
        let start = self.position;
        let mut has_dot = false;
        let mut has_sign = false;

        if let Some(b'+' | b'-') = self.peek_char() {
            self.consume_char();
            has_sign = true;
            // Some producers write "--5"; keep the last sign
            while matches!(self.peek_char(), Some(b'+' | b'-')) {
                self.consume_char();
            }
            match self.peek_char() {
                Some(next) if next.is_ascii_digit() || next == b'.' => {}
                _ => {
                    return Err(ParseError::malformed(
                        self.position,
                        "Expected digit after sign",
                    ))
                }
            }
        }

        while let Some(ch) = self.peek_char() {
            match ch {
                b'0'..=b'9' => {
                    self.consume_char();
                }
                b'.' if !has_dot => {
                    self.consume_char();
                    has_dot = true;
                }
                _ => break,
            }
        }

        // Scientific notation is not PDF syntax but some producers emit it
        if let Some(b'e' | b'E') = self.peek_char() {
            let exponent_start = self.position;
            self.consume_char();
            if let Some(b'+' | b'-') = self.peek_char() {
                self.consume_char();
            }
            let digits_start = self.position;
            while matches!(self.peek_char(), Some(b'0'..=b'9')) {
                self.consume_char();
            }
            if self.position == digits_start {
                self.position = exponent_start;
            } else {
                has_dot = true;
            }
        }

        let text = &self.data[start..self.position];
        let text = number_text(text);

        if !has_dot {
            if let Ok(value) = text.parse::<i64>() {
                if !has_sign {
                    if let Some(reference) = self.try_reference(value) {
                        return Ok(reference);
                    }
                }
                return Ok(Token::Integer(value));
            }
        }

        // Lone "." or "-." is read as zero
        if text.trim_start_matches(['+', '-']) == "." {
            return Ok(Token::Real(0.0));
        }

        text.parse::<f64>()
            .map(Token::Real)
            .map_err(|_| ParseError::malformed(start, format!("Invalid number: '{text}'")))
    }

    /// Looks ahead for `<gen> R` after an object number.
    fn try_reference(&mut self, number: i64) -> Option<Token> {
        let number = u32::try_from(number).ok()?;
        let saved = self.position;

        if self.skip_whitespace() == 0 {
            return None;
        }
        let gen_start = self.position;
        while matches!(self.peek_char(), Some(b'0'..=b'9')) {
            self.position += 1;
        }
        let generation = std::str::from_utf8(&self.data[gen_start..self.position])
            .ok()
            .and_then(|g| g.parse::<u16>().ok());

        let matched = match generation {
            Some(generation) if self.skip_whitespace() > 0 => {
                if self.peek_char() == Some(b'R')
                    && self
                        .data
                        .get(self.position + 1)
                        .map_or(true, |&next| !is_regular(next))
                {
                    self.position += 1;
                    Some(Token::Reference(number, generation))
                } else {
                    None
                }
            }
            _ => None,
        };

        if matched.is_none() {
            self.position = saved;
        }
        matched
    }

    /// Read a keyword
    fn read_keyword(&mut self) -> ParseResult<Token> {
        let start = self.position;
        let word = self.read_word();
        match word {
            b"true" => Ok(Token::Boolean(true)),
            b"false" => Ok(Token::Boolean(false)),
            b"null" => Ok(Token::Null),
            b"stream" => Ok(Token::Stream),
            b"endstream" => Ok(Token::EndStream),
            b"obj" => Ok(Token::Obj),
            b"endobj" => Ok(Token::EndObj),
            b"startxref" => Ok(Token::StartXRef),
            b"xref" => Ok(Token::XRef),
            b"trailer" => Ok(Token::Trailer),
            _ => Err(ParseError::malformed(
                start,
                format!("Unknown keyword: {}", String::from_utf8_lossy(word)),
            )),
        }
    }

    /// Read a word (sequence of regular characters)
    fn read_word(&mut self) -> &'a [u8] {
        let start = self.position;
        while matches!(self.peek_char(), Some(ch) if is_regular(ch)) {
            self.position += 1;
        }
        &self.data[start..self.position]
    }

    /// Read the end-of-line marker that follows the `stream` keyword.
    /// CRLF and LF are standard; a lone CR is accepted.
    pub fn read_newline(&mut self) -> ParseResult<()> {
        match self.peek_char() {
            Some(b'\r') => {
                self.consume_char();
                if self.peek_char() == Some(b'\n') {
                    self.consume_char();
                }
                Ok(())
            }
            Some(b'\n') => {
                self.consume_char();
                Ok(())
            }
            Some(_) => Err(ParseError::malformed(self.position, "Expected newline")),
            None => Err(ParseError::truncated("expected newline")),
        }
    }

    /// Read exactly n bytes
    pub fn read_bytes(&mut self, n: usize) -> ParseResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                ParseError::truncated(format!(
                    "needed {n} bytes at offset {}, only {} available",
                    self.position,
                    self.data.len() - self.position
                ))
            })?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Find a keyword ahead without consuming bytes.
    /// Returns the distance from the current position to the keyword.
    pub fn find_keyword_ahead(&self, keyword: &str, max_bytes: usize) -> Option<usize> {
        let end = self.position.saturating_add(max_bytes).min(self.data.len());
        let window = &self.data[self.position..end];
        let keyword = keyword.as_bytes();
        window
            .windows(keyword.len())
            .position(|candidate| candidate == keyword)
    }

    /// Get current position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move to an absolute position and drop any pushed-back tokens
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.data.len());
        self.token_buffer.clear();
    }

    /// Underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Push back a token to be returned by the next call to next_token
    pub fn push_token(&mut self, token: Token) {
        self.token_buffer.push(token);
    }

    /// Peek the next token without consuming it
    pub fn peek_token(&mut self) -> ParseResult<Token> {
        let token = self.next_token()?;
        self.push_token(token.clone());
        Ok(token)
    }

    /// Expect a specific keyword token
    pub fn expect_keyword(&mut self, expected: Token) -> ParseResult<()> {
        let token = self.next_token()?;
        if token == expected {
            Ok(())
        } else if token == Token::Eof {
            Err(ParseError::truncated(format!("expected {expected:?}")))
        } else {
            Err(ParseError::UnexpectedToken {
                expected: format!("{expected:?}"),
                found: format!("{token:?}"),
            })
        }
    }
}

fn hex_value(ch: u8) -> u8 {
    match ch {
        b'0'..=b'9' => ch - b'0',
        b'a'..=b'f' => ch - b'a' + 10,
        b'A'..=b'F' => ch - b'A' + 10,
        _ => 0,
    }
}

/// Normalizes a numeric lexeme for `str::parse`: collapses repeated signs.
fn number_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let unsigned = text.trim_start_matches(['+', '-']);
    match text.len() - unsigned.len() {
        0 => unsigned.to_string(),
        n => {
            // The last sign wins
            let sign = &text[n - 1..n];
            let sign = if sign == "-" { "-" } else { "" };
            format!("{sign}{unsigned}")
        }
    }
}
