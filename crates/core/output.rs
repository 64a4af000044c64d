//! The output stream: writes tokens separated by
//! `out_delimiter`, an optional `out_start`-driven discard window, and a
//! trailing `bout_delimiter` governed by `delimit_not_at_end` /
//! `delimit_on_empty`.
//!
//! Tracks the same counters a `FILE*`-based implementation would
//! (`out_count`, `has_written`, a deferred "delimiter required" flag)
//! through the same three write entry points, generalized to any
//! [`Write`].

use std::io::{self, Write};

use crate::config::Config;
use crate::strutil::QueuedOutput;

/// Writes tokens to `W`, handling inter-token delimiters, the `out_start`
/// discard window, and the batch-trailing delimiter.
///
/// When `Config.tui` is set, every write goes through a [`QueuedOutput`]
/// instead of straight to `writer`: an external TUI owns the terminal until
/// it tears down, and only then is it safe to flush batch output without
/// the two racing for the same screen. Call
/// [`OutputStream::flush_queued`] once that has happened.
pub struct OutputStream<'c, W> {
    config: &'c Config,
    writer: W,
    out_count: u64,
    has_written: bool,
    delimit_required: bool,
    queue: Option<QueuedOutput>,
}

impl<'c, W: Write> OutputStream<'c, W> {
    /// Wrap `writer`, reading delimiter and windowing behavior from
    /// `config`.
    pub fn new(config: &'c Config, writer: W) -> OutputStream<'c, W> {
        OutputStream {
            config,
            writer,
            out_count: 0,
            has_written: false,
            delimit_required: false,
            queue: if config.tui { Some(QueuedOutput::new()) } else { None },
        }
    }

    /// Write bytes either into the queue (TUI mode) or straight to
    /// `writer`.
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        match &mut self.queue {
            Some(queue) => {
                queue.write_queued(bytes);
                Ok(())
            }
            None => self.writer.write_all(bytes),
        }
    }

    /// Flush every byte queued so far to `writer`. A no-op when
    /// `Config.tui` is unset. Call once, after the external TUI would have
    /// torn down and released the terminal.
    pub fn flush_queued(&mut self) -> io::Result<()> {
        match &mut self.queue {
            Some(queue) => queue.flush(&mut self.writer),
            None => Ok(()),
        }
    }

    /// Number of tokens handed to [`OutputStream::write_output`] (or
    /// [`OutputStream::write_output_no_truncate`]) so far, including ones
    /// discarded by the `out_start` window.
    pub fn out_count(&self) -> u64 {
        self.out_count
    }

    /// True while `out_count` is still inside the `out_start` discard
    /// window.
    fn begin_discard(&self) -> bool {
        match self.config.out_start {
            Some(start) => self.out_count < start as u64,
            None => false,
        }
    }

    /// Write one piece of a token that will be followed by more pieces of
    /// the *same* token (a fragment-spill write, the `!has_ops &&
    /// tokens_not_stored` shortcut). The final piece of that
    /// token must go through [`OutputStream::write_output`] instead, so the
    /// delimiter and count bookkeeping land on it.
    pub fn write_output_fragment(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.begin_discard() {
            if self.delimit_required && !self.config.sed {
                let delim = self.config.out_delimiter.clone();
                self.write_bytes(&delim)?;
            }
            self.delimit_required = false;
            self.has_written = true;
        }
        self.write_bytes(bytes)
    }

    /// Write a whole token (or the last piece of one), ignoring the
    /// `out_start` discard window. Used for tokens that survived final
    /// truncation already.
    pub fn write_output_no_truncate(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.delimit_required && !self.config.sed {
            let delim = self.config.out_delimiter.clone();
            self.write_bytes(&delim)?;
        }
        self.delimit_required = true;
        self.has_written = true;
        self.write_bytes(bytes)?;
        self.out_count += 1;
        if self.config.flush {
            self.flush_now()?;
        }
        Ok(())
    }

    /// Write a whole token (or the last piece of one), honoring the
    /// `out_start` discard window: a discarded token still increments
    /// `out_count` but produces no bytes.
    pub fn write_output(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.begin_discard() {
            self.write_output_no_truncate(bytes)
        } else {
            self.out_count += 1;
            Ok(())
        }
    }

    /// Flush the underlying writer immediately. Called automatically by
    /// [`OutputStream::write_output_no_truncate`] after every token when
    /// `Config.flush` is set, so output stays flushed after each token;
    /// exposed separately for sed mode's verbatim writes, which go
    /// through [`OutputStream::write_raw`] instead.
    pub fn flush_now(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Call once, after every token has been written: emits the trailing
    /// `bout_delimiter` unless suppressed by `delimit_not_at_end`, and
    /// resets the running counters (so a fuzzing harness or test driver can
    /// reuse one stream across independent batches).
    pub fn finish_output(&mut self) -> io::Result<()> {
        if !self.config.delimit_not_at_end
            && (self.has_written || self.config.delimit_on_empty)
            && !self.config.sed
        {
            let delim = self.config.bout_delimiter.clone();
            self.write_bytes(&delim)?;
        }
        self.delimit_required = false;
        self.has_written = false;
        self.out_count = 0;
        Ok(())
    }

    /// Write bytes verbatim, bypassing every token/delimiter accounting
    /// above entirely. Used by sed mode to pass through the text around
    /// each match untouched.
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, PrimaryPattern};
    use crate::numeric::Comparator;

    fn base_config() -> Config {
        Config {
            primary: PrimaryPattern::SingleByteDelimiter(b'\n'),
            ops: Vec::new(),
            buf_size: 1024,
            bytes_to_read: 1024,
            buf_size_frag: 8192,
            max_lookbehind: 0,
            match_mode: false,
            sed: false,
            flush: false,
            use_input_delimiter: false,
            tui: false,
            sort: false,
            unique: false,
            reverse: false,
            tail: false,
            tenacious: false,
            selection_order: false,
            end: false,
            multiple_selections: false,
            delimit_not_at_end: false,
            delimit_on_empty: false,
            invalid_utf_tolerant: false,
            ignore_boundary_warning: false,
            fuzzing_deterministic: false,
            sort_comparator: Comparator::Lexicographic,
            unique_comparator: Comparator::Lexicographic,
            out_start: None,
            out_end: None,
            out_delimiter: b"\n".to_vec(),
            bout_delimiter: Vec::new(),
            field_pattern: None,
        }
    }

    #[test]
    fn writes_delimiter_between_tokens_not_after_last() {
        let config = base_config();
        let mut buf = Vec::new();
        {
            let mut out = OutputStream::new(&config, &mut buf);
            out.write_output(b"a").unwrap();
            out.write_output(b"b").unwrap();
            out.finish_output().unwrap();
        }
        assert_eq!(buf, b"a\nb");
    }

    #[test]
    fn out_start_discards_leading_tokens() {
        let mut config = base_config();
        config.out_start = Some(1);
        let mut buf = Vec::new();
        {
            let mut out = OutputStream::new(&config, &mut buf);
            out.write_output(b"a").unwrap();
            out.write_output(b"b").unwrap();
            out.finish_output().unwrap();
        }
        assert_eq!(buf, b"b");
    }

    #[test]
    fn empty_run_writes_no_trailing_delimiter_by_default() {
        let config = base_config();
        let mut buf = Vec::new();
        {
            let mut out = OutputStream::new(&config, &mut buf);
            out.finish_output().unwrap();
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn delimit_on_empty_forces_trailing_delimiter() {
        let mut config = base_config();
        config.delimit_on_empty = true;
        config.bout_delimiter = b"!".to_vec();
        let mut buf = Vec::new();
        {
            let mut out = OutputStream::new(&config, &mut buf);
            out.finish_output().unwrap();
        }
        assert_eq!(buf, b"!");
    }

    #[test]
    fn sed_mode_suppresses_all_delimiters() {
        let mut config = base_config();
        config.sed = true;
        config.match_mode = true;
        let mut buf = Vec::new();
        {
            let mut out = OutputStream::new(&config, &mut buf);
            out.write_output(b"a").unwrap();
            out.write_output(b"b").unwrap();
            out.finish_output().unwrap();
        }
        assert_eq!(buf, b"ab");
    }

    /// Counts `flush` calls instead of actually buffering, so `--flush`'s
    /// "output is flushed after each token" contract is observable: a
    /// plain `Vec<u8>`'s `Write::flush` is a no-op either way.
    #[derive(Default)]
    struct CountingWriter {
        flushes: usize,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn flush_mode_flushes_after_every_token() {
        let mut config = base_config();
        config.flush = true;
        let mut writer = CountingWriter::default();
        {
            let mut out = OutputStream::new(&config, &mut writer);
            out.write_output(b"a").unwrap();
            out.write_output(b"b").unwrap();
        }
        assert_eq!(writer.flushes, 2);
    }

    #[test]
    fn without_flush_mode_nothing_flushes_until_asked() {
        let mut writer = CountingWriter::default();
        {
            let config = base_config();
            let mut out = OutputStream::new(&config, &mut writer);
            out.write_output(b"a").unwrap();
            out.write_output(b"b").unwrap();
        }
        assert_eq!(writer.flushes, 0);
    }

    #[test]
    fn tui_mode_queues_output_until_flush_queued() {
        let mut config = base_config();
        config.tui = true;
        let mut buf = Vec::new();
        {
            let mut out = OutputStream::new(&config, &mut buf);
            out.write_output(b"a").unwrap();
            out.write_output(b"b").unwrap();
            out.finish_output().unwrap();
            assert!(buf.is_empty());
            out.flush_queued().unwrap();
        }
        assert_eq!(buf, b"a\nb");
    }
}
