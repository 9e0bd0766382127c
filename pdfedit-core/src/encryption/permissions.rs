//! User access permissions (ISO 32000-1 Table 22)

use bitflags::bitflags;

bitflags! {
    /// Operations a reader may allow when the document is opened with the
    /// user password. Bit positions follow the `P` entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u32 {
        /// Print the document (bit 3)
        const PRINT = 1 << 2;
        /// Modify contents (bit 4)
        const MODIFY = 1 << 3;
        /// Copy text and graphics (bit 5)
        const COPY = 1 << 4;
        /// Add or modify annotations (bit 6)
        const ANNOTATE = 1 << 5;
        /// Fill in form fields (bit 9)
        const FILL_FORMS = 1 << 8;
        /// Extract for accessibility (bit 10)
        const ACCESSIBILITY = 1 << 9;
        /// Insert, rotate and delete pages (bit 11)
        const ASSEMBLE = 1 << 10;
        /// Print at full resolution (bit 12)
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

/// Bits 7-8 and 13-32 must be set in `P`
const RESERVED_BITS: u32 = 0xFFFF_F0C0;

impl Permissions {
    /// Value of the `P` entry
    pub fn to_p_value(self) -> i32 {
        (self.bits() | RESERVED_BITS) as i32
    }

    /// Permissions from a `P` entry; reserved and unknown bits are dropped.
    pub fn from_p_value(p: i64) -> Self {
        Self::from_bits_truncate(p as u32)
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::all()
    }
}
