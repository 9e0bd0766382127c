//! In-memory PDF object model shared by the parser, the document arena and the writer.

mod dictionary;
mod primitive;
mod stream;

pub use dictionary::Dictionary;
pub use primitive::{Object, ObjectId};
pub use stream::Stream;
