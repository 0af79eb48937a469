//! Writing nestcfg documents.
//!
//! [`Writer`] takes keys, values, sections, lists and comments in document
//! order and decides for every value how to write it so that it reads back
//! unchanged (see [`scalar`]).

mod options;
pub mod scalar;
mod writer;

pub use options::{MultilineMode, Newline, QuoteMode, WriterOptions};
pub use scalar::Encoding;
pub use writer::{CloseToken, Construct, Misuse, WriteError, Writer};
