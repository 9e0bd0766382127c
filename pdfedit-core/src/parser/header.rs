//! PDF Header Parser
//!
//! Parses PDF header and version according to ISO 32000-1 Section 7.5.2

use super::{ParseError, ParseResult};

/// How far into the file the `%PDF-` marker may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// PDF Version information
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl PdfVersion {
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Locate and parse the `%PDF-M.m` header.
    ///
    /// Returns the version and the byte offset of the marker. Junk before the
    /// marker is accepted unless `strict` is set.
    pub fn parse_header(data: &[u8], strict: bool) -> ParseResult<(Self, usize)> {
        let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
        let offset = window
            .windows(5)
            .position(|w| w == b"%PDF-")
            .ok_or(ParseError::InvalidHeader)?;

        if strict && offset != 0 {
            return Err(ParseError::InvalidHeader);
        }

        let rest = &data[offset + 5..];
        let end = rest
            .iter()
            .position(|&b| !(b.is_ascii_digit() || b == b'.'))
            .unwrap_or(rest.len());
        let text = std::str::from_utf8(&rest[..end]).map_err(|_| ParseError::InvalidHeader)?;

        let (major, minor) = text.split_once('.').ok_or(ParseError::InvalidHeader)?;
        let major = major.parse::<u8>().map_err(|_| ParseError::InvalidHeader)?;
        let minor = minor.parse::<u8>().map_err(|_| ParseError::InvalidHeader)?;

        Ok((Self::new(major, minor), offset))
    }

    /// Check if this version is one the parser knows about
    pub fn is_supported(&self) -> bool {
        matches!((self.major, self.minor), (1, 0..=7) | (2, 0))
    }
}

impl Default for PdfVersion {
    fn default() -> Self {
        Self::new(1, 7)
    }
}

impl std::fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl std::str::FromStr for PdfVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.trim().split_once('.').ok_or(ParseError::InvalidHeader)?;
        Ok(Self::new(
            major.parse().map_err(|_| ParseError::InvalidHeader)?,
            minor.parse().map_err(|_| ParseError::InvalidHeader)?,
        ))
    }
}
