//! Tokenizers for the nestcfg configuration format.
//!
//! Three ways in, one grammar:
//!
//! - [`BufferTokenizer`] works on a window of text the caller owns and hands
//!   back a [`ReaderState`] whenever the window runs out, so input can arrive
//!   in pieces of any size.
//! - [`StreamTokenizer`] pulls characters from a [`CharSource`].
//! - [`BufferedTokenizer`] reads bytes from an [`std::io::Read`] into a
//!   reusable buffer and drives a [`BufferTokenizer`] over it.
//!
//! ```text
//! # comment
//! Server{
//!     Host:example.org
//!     Ports:{
//!         80
//!         '443'
//!     }
//!     Motd:
//!         first line
//!         second line
//! }
//! ```

pub mod syntax;
pub use syntax::{Key, KeyError, Quote};

mod token;
pub use token::{ParseError, ParseErrorKind, Text, Token};

mod state;
pub use state::{Mode, ReaderState};

mod buffer;
pub use buffer::BufferTokenizer;

mod stream;
pub use stream::{CharSource, StrSource, StreamTokenizer, Utf8Reader};

mod buffered;
pub use buffered::{BufferOptions, BufferedTokenizer};
