//! Recovery for files whose cross-reference data is missing or wrong
//!
//! When the xref chain cannot be read, or its offsets do not point at the
//! objects they name, the document is re-indexed by scanning the raw bytes for
//! `N G obj` headers. The scan is bounded by
//! [`ParseOptions::max_scan_bytes`](crate::parser::ParseOptions) so hostile
//! input cannot force unbounded work.
//!
//! ```rust,no_run
//! use pdfedit::parser::ParseOptions;
//! use pdfedit::recovery::recover_xref;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("damaged.pdf")?;
//! let (table, stats) = recover_xref(&bytes, &ParseOptions::tolerant())?;
//! println!("{} objects found, root {}", stats.objects_found, table.trailer().root()?);
//! # Ok(())
//! # }
//! ```

pub mod xref_recovery;

pub use xref_recovery::{recover_xref, RecoveryStats, XRefRecovery};
