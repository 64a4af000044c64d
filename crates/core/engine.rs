//! The streaming match engine: reads input into a fixed-size match
//! buffer, finds the next delimiter or match (honoring partial matches
//! so a delimiter split across two reads isn't missed), and reports each
//! token found to a [`TokenSink`].
//!
//! Same fixed buffer, same `PCRE2_PARTIAL_HARD`/`PCRE2_NOTEMPTY_ATSTART`
//! dance, same lookbehind-aware compaction and fragment-spill policy
//! throughout. A "retry against the same buffer without reading more
//! input" control-flow pattern recurs as a nested loop: the inner loop
//! re-matches against the same buffer; breaking out of it (without
//! breaking the outer loop) goes back to read more.

use std::io::Read;

use morsel_matcher::Captures;
use morsel_pcre2::MatchOutcome;

use crate::config::{Config, PrimaryPattern};
use crate::error::{CoreError, Result};
use crate::strutil::utf8;
use crate::strutil::{read_buffered, read_unbuffered};
use crate::boundary_warning;

/// One token found by the match engine, handed to a [`TokenSink`].
///
/// `begin`/`end` index into the `subject` slice the sink's
/// [`TokenSink::token`] call also receives. `fragment` is non-empty when
/// earlier bytes of this same token were already spilled out of the match
/// buffer by a prior iteration and must be prepended.
pub struct TokenEvent<'a> {
    /// Start offset of this token's bytes within `subject`.
    pub begin: usize,
    /// End offset (exclusive) of this token's bytes within `subject`.
    pub end: usize,
    /// Bytes of this token that didn't fit in the match buffer on an
    /// earlier iteration. Empty unless a fragment spill occurred.
    pub fragment: Vec<u8>,
    /// Capture groups of the primary pattern's match that produced this
    /// token, for `Replace` to interpolate against. `None` in delimiter
    /// mode, or for the single-byte delimiter fast path, where there's
    /// nothing to interpolate.
    pub outer_captures: Option<&'a dyn Captures>,
}

/// What a [`TokenSink`] wants the engine to do after handling one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    /// Keep reading and matching.
    Continue,
    /// Stop the read loop entirely.
    Stop,
}

/// Receives each token the match engine finds, in order.
///
/// A sink also owns the one [`crate::output::OutputStream`] the engine's
/// own direct writes (sed mode's verbatim passthrough, the fragment-spill
/// shortcut) go through, so that stream's delimiter/count bookkeeping
/// never diverges from whatever `token` itself writes through it.
pub trait TokenSink {
    /// Handle one token. `subject` is the full live match buffer (capture
    /// offsets in `event.outer_captures` are relative to its start, not to
    /// `event.begin`).
    fn token(&mut self, subject: &[u8], event: TokenEvent<'_>) -> Result<ControlFlow>;

    /// Write bytes verbatim (sed mode's passthrough), bypassing `token`
    /// entirely.
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()>;

    /// Write one piece of a token's bytes that were spilled out of the
    /// match buffer before it completed (the `!has_ops && tokens_not_stored`
    /// shortcut). The piece that completes the token
    /// still goes through `token` itself.
    fn write_output_fragment(&mut self, bytes: &[u8]) -> Result<()>;
}

/// One match attempt's outcome, abstracting over the single-byte fast
/// path and the general PCRE2 path.
enum Step {
    /// A complete match at `[start, end)`.
    Complete { start: usize, end: usize },
    /// No complete match yet. `partial_begin` is `Some` when PCRE2
    /// reported a partial match (never set on the single-byte fast path,
    /// which can't partially match itself).
    Incomplete { partial_begin: Option<usize> },
}

/// Drives the fixed-buffer read/match loop: fills the buffer, runs the
/// primary pattern over it, dispatches completed tokens to a
/// [`TokenSink`], and compacts the buffer (retaining lookbehind) when a
/// match only partially completed before the buffer's end.
pub struct MatchEngine<'c> {
    config: &'c Config,
    subject: Vec<u8>,
    match_offset: usize,
    prev_sep_end: usize,
    fragment: Vec<u8>,
    notempty_atstart: bool,
}

impl<'c> MatchEngine<'c> {
    /// Build an engine with an empty match buffer sized to `config.buf_size`.
    pub fn new(config: &'c Config) -> MatchEngine<'c> {
        MatchEngine {
            config,
            subject: Vec::with_capacity(config.buf_size),
            match_offset: 0,
            prev_sep_end: 0,
            fragment: Vec::new(),
            notempty_atstart: false,
        }
    }

    fn is_utf(&self) -> bool {
        match &self.config.primary {
            PrimaryPattern::Delimiter(p) | PrimaryPattern::Match(p) => p.is_utf(),
            PrimaryPattern::SingleByteDelimiter(_) => false,
        }
    }

    /// Run the match/read loop against `reader` to completion, reporting
    /// each token to `sink`. Sed mode's verbatim passthrough bytes and the
    /// `!has_ops && tokens_not_stored` fragment-spill shortcut go through
    /// `sink`'s own `write_raw`/`write_output_fragment`, bypassing `token`
    /// entirely.
    pub fn run<R, S>(&mut self, reader: &mut R, sink: &mut S) -> Result<()>
    where
        R: Read,
        S: TokenSink,
    {
        let config = self.config;
        let is_utf = self.is_utf();
        let single_byte = config.single_byte_delimiter();
        let is_match = config.match_mode && single_byte.is_none();
        let is_direct_output = config.is_direct_output();
        let is_sed = is_direct_output && is_match && config.sed;
        let has_ops = !config.ops.is_empty();

        'read: loop {
            let input_done = self.fill_buffer(reader)?;
            let partial_hard = !input_done;
            let effective_end = self.effective_end(is_utf, input_done)?;

            loop {
                let step = self.try_match(single_byte, effective_end, partial_hard)?;
                match step {
                    Step::Complete { start, end } => {
                        let flow = self.handle_complete(is_match, is_sed, single_byte.is_some(), start, end, sink)?;
                        if flow == ControlFlow::Stop {
                            break 'read;
                        }
                        // "goto skip_read": retry against the same buffer
                        // and effective_end, no new bytes read.
                        continue;
                    }
                    Step::Incomplete { partial_begin } => {
                        if !input_done {
                            self.compact(is_match, is_sed, is_utf, partial_begin, effective_end, sink)?;
                            break;
                        } else {
                            self.handle_final(is_match, is_sed, has_ops, effective_end, sink)?;
                            break 'read;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn fill_buffer<R: Read>(&mut self, reader: &mut R) -> Result<bool> {
        let config = self.config;
        let cur_len = self.subject.len();
        let room = config.buf_size - cur_len;
        let to_read = config.bytes_to_read.min(room);
        let start = self.subject.len();
        self.subject.resize(start + to_read, 0);
        let read = if config.flush {
            read_unbuffered(reader, &mut self.subject[start..start + to_read]).map_err(CoreError::from)?
        } else {
            read_buffered(reader, &mut self.subject[start..start + to_read]).map_err(CoreError::from)?
        };
        self.subject.truncate(start + read);
        let input_done = if config.flush { read == 0 } else { read != to_read };
        Ok(input_done)
    }

    fn effective_end(&self, is_utf: bool, input_done: bool) -> Result<usize> {
        if !is_utf || input_done {
            return Ok(self.subject.len());
        }
        match utf8::last_completed_character_end(&self.subject, 0, self.subject.len()) {
            Ok(end) => Ok(end),
            Err(_) if self.config.invalid_utf_tolerant => Ok(self.subject.len()),
            Err(_) => Err(CoreError::Config("invalid utf-8 in input".to_string())),
        }
    }

    fn try_match(&mut self, single_byte: Option<u8>, effective_end: usize, partial_hard: bool) -> Result<Step> {
        if let Some(byte) = single_byte {
            let pos = memchr::memchr(byte, &self.subject[self.prev_sep_end..effective_end])
                .map(|i| self.prev_sep_end + i);
            return Ok(match pos {
                Some(pos) => Step::Complete { start: pos, end: pos + 1 },
                None => Step::Incomplete { partial_begin: None },
            });
        }

        let pattern = self.primary_pattern();
        let outcome = pattern
            .try_match(&self.subject, effective_end, self.match_offset, partial_hard, self.notempty_atstart)
            .map_err(CoreError::from)?;
        match outcome {
            MatchOutcome::NoMatch => Ok(Step::Incomplete { partial_begin: None }),
            MatchOutcome::Partial { begin } => Ok(Step::Incomplete { partial_begin: Some(begin) }),
            MatchOutcome::Complete(_) => {
                let whole = pattern.captures().get(0).expect("group 0 always set on a complete match");
                self.notempty_atstart = whole.is_empty();
                Ok(Step::Complete { start: whole.start(), end: whole.end() })
            }
        }
    }

    fn primary_pattern(&self) -> &morsel_pcre2::StreamPattern {
        match &self.config.primary {
            PrimaryPattern::Delimiter(p) | PrimaryPattern::Match(p) => p,
            PrimaryPattern::SingleByteDelimiter(_) => unreachable!("single-byte delimiter never reaches the regex path"),
        }
    }

    fn handle_complete<S: TokenSink>(
        &mut self,
        is_match: bool,
        is_sed: bool,
        single_byte: bool,
        whole_start: usize,
        whole_end: usize,
        sink: &mut S,
    ) -> Result<ControlFlow> {
        let flow = if is_match {
            if is_sed {
                sink.write_raw(&self.subject[self.match_offset..whole_start])?;
                let fragment = std::mem::take(&mut self.fragment);
                sink.token(&self.subject, TokenEvent { begin: whole_start, end: whole_end, fragment, outer_captures: None })?
            } else {
                debug_assert!(!single_byte, "single-byte delimiters never run in match mode");
                self.dispatch_match_groups(sink)?
            }
        } else {
            let fragment = std::mem::take(&mut self.fragment);
            let flow = sink.token(
                &self.subject,
                TokenEvent { begin: self.prev_sep_end, end: whole_start, fragment, outer_captures: None },
            )?;
            self.prev_sep_end = whole_end;
            flow
        };

        self.match_offset = whole_end;
        Ok(flow)
    }

    /// Match mode, non-sed: each capture group of the match — including
    /// group 0, the whole match — becomes its own token event.
    fn dispatch_match_groups<S: TokenSink>(&mut self, sink: &mut S) -> Result<ControlFlow> {
        let pattern = self.primary_pattern();
        let captures = pattern.captures();
        for i in 0..captures.len() {
            let m = match captures.get(i) {
                Some(m) => m,
                // A group that didn't participate in this match carries no
                // span to emit as a token.
                None => continue,
            };
            let fragment = std::mem::take(&mut self.fragment);
            let flow = sink.token(
                &self.subject,
                TokenEvent { begin: m.start(), end: m.end(), fragment, outer_captures: Some(&captures) },
            )?;
            if flow == ControlFlow::Stop {
                return Ok(ControlFlow::Stop);
            }
        }
        Ok(ControlFlow::Continue)
    }

    /// No complete match, but more input is coming: shift the buffer so
    /// there's room to read more, retaining only the lookbehind window
    /// (and, in delimiter mode, the bytes since the last separator).
    fn compact<S: TokenSink>(
        &mut self,
        is_match: bool,
        is_sed: bool,
        is_utf: bool,
        partial_begin: Option<usize>,
        effective_end: usize,
        sink: &mut S,
    ) -> Result<()> {
        let config = self.config;

        let mut new_subject_begin = partial_begin.unwrap_or(effective_end);

        let new_subject_begin_cp = new_subject_begin;
        new_subject_begin = new_subject_begin.saturating_sub(config.max_lookbehind);
        if is_utf {
            new_subject_begin = utf8::decrement_until_character_start(&self.subject, new_subject_begin, 0, effective_end);
        }

        let retain_marker = new_subject_begin;

        if !is_match {
            new_subject_begin = new_subject_begin.min(self.prev_sep_end);
        }

        let old_match_offset = self.match_offset;
        self.match_offset = new_subject_begin_cp - new_subject_begin;
        if !is_match {
            self.prev_sep_end -= new_subject_begin;
        } else if is_sed {
            let begin = old_match_offset;
            let end = new_subject_begin + self.match_offset;
            if begin < end {
                sink.write_raw(&self.subject[begin..end])?;
            }
        }

        if new_subject_begin != 0 {
            self.subject.drain(0..new_subject_begin);
        } else if self.subject.len() == config.buf_size {
            self.clear_full_buffer(is_match, is_sed, is_utf, effective_end, retain_marker, sink)?;
        }
        // Otherwise nothing needs to move yet: the buffer isn't full and
        // everything already fits within the retained window.

        Ok(())
    }

    fn clear_full_buffer<S: TokenSink>(
        &mut self,
        is_match: bool,
        is_sed: bool,
        is_utf: bool,
        effective_end: usize,
        retain_marker: usize,
        sink: &mut S,
    ) -> Result<()> {
        let has_ops = !self.config.ops.is_empty();
        let tokens_not_stored = self.config.tokens_not_stored();

        if is_match {
            self.clear_except_trailing_incomplete(is_sed, is_utf, effective_end, sink)?;
            self.match_offset = 0;
        } else if self.prev_sep_end != 0 || retain_marker == 0 {
            // Retained only for lookbehind: this run of bytes can never
            // complete a match, so it's a fragment spill. Bounded by
            // effective_end, not subject.len(): a trailing incomplete
            // multibyte sequence past effective_end is left resident for
            // clear_except_trailing_incomplete to carry over, and must not
            // also be copied into the fragment here or it gets duplicated
            // once the next fill completes it.
            let spill_end = effective_end.max(self.prev_sep_end);
            self.spill_fragment(has_ops, tokens_not_stored, self.prev_sep_end, spill_end, sink)?;
            self.clear_except_trailing_incomplete(is_sed, is_utf, effective_end, sink)?;
            self.prev_sep_end = 0;
            self.match_offset = 0;
        } else {
            // Retained because of the previous delimiter's end position.
            self.spill_fragment(has_ops, tokens_not_stored, 0, retain_marker, sink)?;
            self.subject.drain(0..retain_marker);
            self.match_offset = 0;
        }
        Ok(())
    }

    fn clear_except_trailing_incomplete<S: TokenSink>(
        &mut self,
        is_sed: bool,
        is_utf: bool,
        effective_end: usize,
        sink: &mut S,
    ) -> Result<()> {
        if is_utf && self.subject.len() != effective_end && effective_end != 0 {
            if is_sed {
                sink.write_raw(&self.subject[self.match_offset..effective_end])?;
            }
            self.subject.drain(0..effective_end);
        } else {
            if is_sed {
                sink.write_raw(&self.subject[self.match_offset..])?;
            }
            self.subject.clear();
        }
        Ok(())
    }

    fn spill_fragment<S: TokenSink>(
        &mut self,
        has_ops: bool,
        tokens_not_stored: bool,
        begin: usize,
        end: usize,
        sink: &mut S,
    ) -> Result<()> {
        if !has_ops && tokens_not_stored {
            sink.write_output_fragment(&self.subject[begin..end])?;
        } else if self.fragment.len() + (end - begin) > self.config.buf_size_frag {
            boundary_warning!("morsel: warning: a token exceeded buf-size-frag bytes and was cut to fit");
            self.fragment.clear();
        } else {
            self.fragment.extend_from_slice(&self.subject[begin..end]);
        }
        Ok(())
    }

    /// No match and no more input: emit the last token (if any) and stop.
    fn handle_final<S: TokenSink>(
        &mut self,
        is_match: bool,
        is_sed: bool,
        _has_ops: bool,
        effective_end: usize,
        sink: &mut S,
    ) -> Result<()> {
        if !is_match {
            if self.prev_sep_end != self.subject.len() || self.config.use_input_delimiter || !self.fragment.is_empty() {
                let fragment = std::mem::take(&mut self.fragment);
                sink.token(
                    &self.subject,
                    TokenEvent { begin: self.prev_sep_end, end: self.subject.len(), fragment, outer_captures: None },
                )?;
            }
        } else if is_sed {
            sink.write_raw(&self.subject[self.match_offset..effective_end])?;
        }
        Ok(())
    }
}
