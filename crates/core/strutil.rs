//! UTF-8 boundary helpers and miscellaneous string/byte utilities.

use std::io::{self, Read, Write};

/// UTF-8 boundary arithmetic used by the match engine to keep every slice
/// it hands the regex engine ending on a completed codepoint.
pub mod utf8 {
    /// A byte sequence could not be interpreted as UTF-8 starting where it
    /// was asked to.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct Utf8BoundaryError;

    /// The number of bytes a UTF-8 codepoint starting with `lead` occupies,
    /// based on its high bits. Returns `Err` if `lead` can't start a
    /// codepoint (a stray continuation byte, or an invalid 5/6-byte lead).
    pub fn length(lead: u8) -> Result<usize, Utf8BoundaryError> {
        if lead & 0x80 == 0x00 {
            Ok(1)
        } else if lead & 0xE0 == 0xC0 {
            Ok(2)
        } else if lead & 0xF0 == 0xE0 {
            Ok(3)
        } else if lead & 0xF8 == 0xF0 {
            Ok(4)
        } else {
            Err(Utf8BoundaryError)
        }
    }

    /// Returns true if and only if `b` is a UTF-8 continuation byte
    /// (`0b10xxxxxx`).
    pub fn is_continuation(b: u8) -> bool {
        b & 0xC0 == 0x80
    }

    /// Scan backwards from `end` (exclusive) over continuation bytes, at
    /// most 4 bytes, and return the position of the lead byte that starts
    /// the trailing codepoint. Returns `Err` if no lead byte is found
    /// within 4 bytes of `end` (not valid UTF-8, or `begin` cuts the scan
    /// short).
    pub fn last_character_start(
        buf: &[u8],
        begin: usize,
        end: usize,
    ) -> Result<usize, Utf8BoundaryError> {
        if end <= begin {
            return Err(Utf8BoundaryError);
        }
        let floor = begin.max(end.saturating_sub(4));
        let mut i = end - 1;
        loop {
            if !is_continuation(buf[i]) {
                return Ok(i);
            }
            if i == floor {
                return Err(Utf8BoundaryError);
            }
            i -= 1;
        }
    }

    /// Returns `end` if the codepoint trailing `buf[begin..end]` is
    /// complete, the start of that codepoint if it was cut short by
    /// `end`, or `Err` if the trailing bytes don't form a valid lead at
    /// all.
    pub fn last_completed_character_end(
        buf: &[u8],
        begin: usize,
        end: usize,
    ) -> Result<usize, Utf8BoundaryError> {
        if begin == end {
            return Ok(end);
        }
        let start = last_character_start(buf, begin, end)?;
        let char_len = length(buf[start])?;
        if start + char_len <= end {
            Ok(end)
        } else {
            Ok(start)
        }
    }

    /// Walk `pos` backwards (a no-op if `pos == end`) until it lands on a
    /// lead byte, never passing `begin`.
    pub fn decrement_until_character_start(
        buf: &[u8],
        pos: usize,
        begin: usize,
        end: usize,
    ) -> usize {
        if pos == end {
            return pos;
        }
        let mut p = pos;
        while p > begin && is_continuation(buf[p]) {
            p -= 1;
        }
        p
    }
}

/// The printable mnemonic for a C0 control character or DEL, for display by
/// the (external) TUI. Every other byte has no escape form.
///
/// Not used by the match engine or pipeline proper — kept because the
/// external TUI consumes exactly this table to render unprintable bytes
/// in its selection list, and dropping it would silently break that
/// contract.
pub fn get_escape_sequence(byte: u8) -> Option<&'static str> {
    Some(match byte {
        0 => "\\0",
        1 => "SOH",
        2 => "STX",
        3 => "ETX",
        4 => "EOT",
        5 => "ENQ",
        6 => "ACK",
        7 => "\\a",
        8 => "\\b",
        9 => "\\t",
        10 => "\\n",
        11 => "\\v",
        12 => "\\f",
        13 => "\\r",
        14 => "SO",
        15 => "SI",
        16 => "DLE",
        17 => "DC1",
        18 => "DC2",
        19 => "DC3",
        20 => "DC4",
        21 => "NAK",
        22 => "SYN",
        23 => "ETB",
        24 => "CAN",
        25 => "EM",
        26 => "SUB",
        27 => "\\e",
        28 => "FS",
        29 => "GS",
        30 => "RS",
        31 => "US",
        127 => "DEL",
        _ => return None,
    })
}

/// Read as many bytes as will fit in `buf`, using the buffered semantics a
/// `BufReader`-style reader gives: a short read means EOF, never "try
/// again".
pub fn read_buffered<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    reader.read(buf)
}

/// Read bytes with raw, possibly-short-read, `read(2)`-style semantics,
/// used in flush mode: a short read does not necessarily mean EOF,
/// only that this call returned less than asked. Only a `0`-byte read
/// means the stream is exhausted. Since `std::io::Read` already exposes
/// exactly this contract, the distinction from [`read_buffered`] is in how
/// the match engine interprets the result, not in how the byte are
/// fetched — both call through to the same trait method.
pub fn read_unbuffered<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    reader.read(buf)
}

/// Defers every write until [`QueuedOutput::flush`] is called.
///
/// Used when `Config.tui` is set, so batch output doesn't race with the
/// TUI's own rendering on the same terminal: the TUI owns the screen until
/// it tears down, at which point the queued bytes are flushed verbatim.
#[derive(Debug, Default)]
pub struct QueuedOutput {
    queue: Vec<u8>,
}

impl QueuedOutput {
    /// Create an empty queue.
    pub fn new() -> QueuedOutput {
        QueuedOutput { queue: Vec::new() }
    }

    /// Append bytes to the queue without writing them anywhere yet.
    pub fn write_queued(&mut self, bytes: &[u8]) {
        self.queue.extend_from_slice(bytes);
    }

    /// Write every queued byte to `writer`, in order, and clear the queue.
    pub fn flush<W: Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.queue)?;
        self.queue.clear();
        Ok(())
    }
}

/// Word-wrap `text` into lines no wider than `width` columns, preferring to
/// break at whitespace; runs of whitespace that straddle a wrap point are
/// collapsed into the line break itself.
///
/// Used by the (external) TUI to lay out its prompt; not exercised by the
/// match engine or pipeline. Column width is measured in bytes here, which
/// is exact for ASCII prompts and an approximation for multibyte ones —
/// the TUI is responsible for a locale-aware `wcwidth` if it needs one.
pub fn create_prompt_lines(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        if current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_length_ascii() {
        assert_eq!(utf8::length(b'a'), Ok(1));
    }

    #[test]
    fn utf8_length_continuation_is_invalid_lead() {
        assert!(utf8::length(0b1000_0000).is_err());
    }

    #[test]
    fn utf8_length_multibyte_leads() {
        assert_eq!(utf8::length(0b1100_0000), Ok(2));
        assert_eq!(utf8::length(0b1110_0000), Ok(3));
        assert_eq!(utf8::length(0b1111_0000), Ok(4));
    }

    #[test]
    fn last_completed_character_end_complete() {
        let buf = "hi\u{1F600}".as_bytes(); // 'h', 'i', then a 4-byte emoji
        let end = buf.len();
        assert_eq!(utf8::last_completed_character_end(buf, 0, end), Ok(end));
    }

    #[test]
    fn last_completed_character_end_truncated() {
        let full = "hi\u{1F600}".as_bytes();
        let truncated = &full[..full.len() - 1];
        let lead_pos = full.len() - 4;
        assert_eq!(
            utf8::last_completed_character_end(truncated, 0, truncated.len()),
            Ok(lead_pos)
        );
    }

    #[test]
    fn decrement_until_character_start_noop_at_end() {
        let buf = b"abc";
        assert_eq!(utf8::decrement_until_character_start(buf, 3, 0, 3), 3);
    }

    #[test]
    fn get_escape_sequence_known_and_unknown() {
        assert_eq!(get_escape_sequence(0), Some("\\0"));
        assert_eq!(get_escape_sequence(27), Some("\\e"));
        assert_eq!(get_escape_sequence(b'a'), None);
    }

    #[test]
    fn queued_output_defers_until_flush() {
        let mut q = QueuedOutput::new();
        q.write_queued(b"hello");
        let mut out = Vec::new();
        q.flush(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn prompt_wrap_breaks_on_whitespace() {
        let lines = create_prompt_lines("one two three four", 7);
        assert_eq!(lines, vec!["one two", "three", "four"]);
    }
}
