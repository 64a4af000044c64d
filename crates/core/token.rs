//! `Token`: the atomic unit of the pipeline.

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

use bstr::ByteSlice;

/// An owned byte sequence, with an optional sub-range ("field") used as
/// the key for comparison and hashing when a field pattern is configured.
#[derive(Clone)]
pub struct Token {
    buffer: Vec<u8>,
    field: Option<Range<usize>>,
}

/// Prints the token's bytes the way `bstr` renders a byte string (lossily
/// escaped UTF-8) rather than as a numeric `Vec<u8>` debug dump, since a
/// token is logically text even though it's physically arbitrary bytes.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("buffer", &self.buffer.as_bstr())
            .field("field", &self.field)
            .finish()
    }
}

impl Token {
    /// Build a token from an owned buffer with no field sub-range.
    pub fn new(buffer: Vec<u8>) -> Token {
        Token {
            buffer,
            field: None,
        }
    }

    /// Build a token from a borrowed or owned buffer, copying only if it
    /// was borrowed.
    pub fn from_cow(buffer: Cow<'_, [u8]>) -> Token {
        Token::new(buffer.into_owned())
    }

    /// The token's full byte buffer.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// The sub-range used as the comparison/hash key, or the whole buffer
    /// if no field was set. A field sub-range, when present, always lies
    /// within the buffer.
    pub fn key(&self) -> &[u8] {
        match &self.field {
            Some(range) => &self.buffer[range.clone()],
            None => &self.buffer,
        }
    }

    /// Set the field sub-range. Panics if it doesn't lie within the
    /// buffer, matching the invariant this type otherwise guarantees
    /// automatically.
    pub fn set_field(&mut self, range: Range<usize>) {
        assert!(range.end <= self.buffer.len());
        self.field = Some(range);
    }
}
