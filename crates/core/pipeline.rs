//! The operator pipeline driver: receives each token event from the
//! match engine, runs it through the compiled operator chain, and either
//! writes it straight to the output stream or files it away for the
//! final sort/truncate/reverse stage.

use std::borrow::Cow;
use std::io::Write;

use morsel_matcher::Captures;
use morsel_pcre2::StreamPattern;

use crate::config::{Config, PrimaryPattern};
use crate::engine::{ControlFlow, TokenEvent, TokenSink};
use crate::error::{CoreError, Result};
use crate::operator::OpOutcome;
use crate::output::OutputStream;
use crate::token::Token;
use crate::uniqueness::UniquenessSet;

/// Runs the operator chain over every token the match engine reports,
/// either streaming survivors straight to an [`OutputStream`] or
/// collecting them into `stored` for the final stage.
pub struct Pipeline<'c, W> {
    config: &'c Config,
    output: OutputStream<'c, W>,
    unique: Option<UniquenessSet>,
    stored: Vec<Token>,
    initial_selection_key: Option<Vec<u8>>,
}

impl<'c, W: Write> Pipeline<'c, W> {
    /// Build a pipeline writing to `writer`. `unique_set` should be
    /// `Some` whenever `config.unique` is set (the argument layer builds
    /// it, since only it knows the field/comparator/forgetful-capacity
    /// choice in play).
    pub fn new(config: &'c Config, writer: W, unique_set: Option<UniquenessSet>) -> Pipeline<'c, W> {
        Pipeline {
            config,
            output: OutputStream::new(config, writer),
            unique: unique_set,
            stored: Vec::new(),
            initial_selection_key: None,
        }
    }

    /// The index (within final output order) of the first token that
    /// matched a `TuiSelect` operator, if any.
    ///
    /// Resolved by equality against the matched token's bytes, captured at
    /// ingestion time, rather than by the position it occupied in `stored`
    /// at that point: sorting, truncation, reversal, and the bounded-memory
    /// insert all move tokens around after ingestion, so an index recorded
    /// during `TokenSink::token` would no longer point at the right token
    /// by the time `stored` reaches its final order. Must only be called
    /// after that final order is settled (i.e. after `sort_stored`,
    /// `truncate_stored`, and `reverse` have all run).
    fn resolve_initial_selection(&self) -> Option<usize> {
        let key = self.initial_selection_key.as_ref()?;
        self.stored.iter().position(|t| t.buffer() == key.as_slice())
    }

    /// Flush any buffered writer state and emit the trailing delimiter.
    /// Call after the match engine's `run` returns, once (for direct
    /// output) or after [`Pipeline::finish_stored`] (otherwise).
    pub fn finish_output(&mut self) -> Result<()> {
        self.output.finish_output().map_err(CoreError::from)
    }

    /// Sort, truncate, and reverse the stored vector, then write every
    /// surviving token. No-op when tokens were
    /// written directly as they arrived. Call once, after the match
    /// engine's `run` returns.
    pub fn finish_stored(&mut self) -> Result<()> {
        if self.config.is_direct_output() {
            return Ok(());
        }
        if !self.config.mem_is_bounded() {
            self.sort_stored();
            self.truncate_stored();
        }
        if self.config.reverse {
            self.stored.reverse();
        }
        let tokens = std::mem::take(&mut self.stored);
        for token in &tokens {
            self.output
                .write_output_no_truncate(token.buffer())
                .map_err(CoreError::from)?;
        }
        self.stored = tokens;
        Ok(())
    }

    /// Consume the pipeline, returning every stored token in final order
    /// plus the resolved index of the token a `TuiSelect` operator first
    /// marked (`None` if no operator marked one, or if that token didn't
    /// survive truncation/uniqueness). Used by TUI mode, which presents
    /// tokens interactively instead of writing them to a byte stream.
    pub fn into_stored(mut self) -> (Vec<Token>, Option<usize>) {
        if !self.config.mem_is_bounded() {
            self.sort_stored();
            self.truncate_stored();
        }
        if self.config.reverse {
            self.stored.reverse();
        }
        let index = self.resolve_initial_selection();
        (self.stored, index)
    }

    fn sort_stored(&mut self) {
        if !self.config.sort {
            return;
        }
        let comparator = self.config.sort_comparator;
        if self.config.fuzzing_deterministic {
            self.stored.sort_by(|a, b| comparator.cmp_keys(a.key(), b.key()));
        } else {
            use rayon::slice::ParallelSliceMut;
            self.stored.par_sort_by(|a, b| comparator.cmp_keys(a.key(), b.key()));
        }
    }

    fn truncate_stored(&mut self) {
        let start = self.config.out_start.unwrap_or(0);
        let end = self.config.out_end.unwrap_or(self.stored.len());
        if self.config.tail {
            let len = self.stored.len();
            let keep_end = len.saturating_sub(start);
            let keep_start = keep_end.saturating_sub(end.saturating_sub(start));
            self.stored.truncate(keep_end);
            if keep_start > 0 {
                self.stored.drain(0..keep_start);
            }
        } else {
            let end = end.min(self.stored.len());
            let start = start.min(end);
            self.stored.truncate(end);
            if start > 0 {
                self.stored.drain(0..start);
            }
        }
    }

    /// Insert `token` into `self.stored`, maintaining sort order and the
    /// `out_end` cap incrementally.
    /// Returns `true` if the pipeline should stop after this token (the
    /// cap is full and head mode, so nothing further could ever survive).
    fn insert_bounded(&mut self, token: Token) -> bool {
        let cap = self.config.out_end.expect("mem_is_bounded implies out_end is set");
        let comparator = self.config.sort_comparator;

        if !self.config.sort {
            if self.config.tail {
                if self.stored.len() == cap {
                    self.stored.remove(0);
                }
                self.stored.push(token);
            } else if self.stored.len() < cap {
                self.stored.push(token);
            }
            return !self.config.tail && self.stored.len() >= cap;
        }

        let pos = self
            .stored
            .binary_search_by(|existing| comparator.cmp_keys(existing.key(), token.key()))
            .unwrap_or_else(|pos| pos);

        if self.stored.len() < cap {
            self.stored.insert(pos, token);
            return false;
        }

        if self.config.tail {
            // Keep the largest `cap` keys seen so far: only insert if
            // `token` beats the current smallest, shifting the tail
            // forward rather than reallocating.
            if pos == 0 {
                return false;
            }
            self.stored.remove(0);
            self.stored.insert(pos - 1, token);
            false
        } else {
            // Keep the smallest `cap` keys seen so far. A later token can
            // still beat an already-kept one, so this never signals
            // "stop" the way the unsorted head case below does.
            if pos >= cap {
                return false;
            }
            self.stored.pop();
            self.stored.insert(pos, token);
            false
        }
    }

    /// When a field pattern is configured, narrow `token`'s comparison/hash key to
    /// the pattern's first match within it. A token the pattern doesn't
    /// match at all keeps the whole buffer as its key (the field
    /// sub-range is simply left unset).
    fn apply_field_pattern(&self, token: &mut Token) -> Result<()> {
        let pattern = match &self.config.field_pattern {
            Some(pattern) => pattern,
            None => return Ok(()),
        };
        if let Some((m, _)) = pattern.find_at(token.buffer(), 0).map_err(CoreError::from)? {
            token.set_field(m.start()..m.end());
        }
        Ok(())
    }

    /// Returns `true` if `key` has not been seen before (the caller
    /// should keep its token), `false` if it's a duplicate (the caller
    /// should drop it). Always `true` when no uniqueness set is
    /// configured.
    fn check_unique(&mut self, key: &[u8]) -> bool {
        match &mut self.unique {
            Some(set) => set.insert(key),
            None => true,
        }
    }

    /// The primary pattern, when it's a regex (not the single-byte
    /// delimiter fast path). `Replace` needs this to resolve `$name`
    /// references against the outer match it's substituting.
    fn primary_pattern(&self) -> Option<&StreamPattern> {
        match &self.config.primary {
            PrimaryPattern::Delimiter(p) | PrimaryPattern::Match(p) => Some(p),
            PrimaryPattern::SingleByteDelimiter(_) => None,
        }
    }
}

impl<'c, W: Write> TokenSink for Pipeline<'c, W> {
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.write_raw(bytes).map_err(CoreError::from)
    }

    fn write_output_fragment(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.write_output_fragment(bytes).map_err(CoreError::from)
    }

    fn token(&mut self, subject: &[u8], event: TokenEvent<'_>) -> Result<ControlFlow> {
        let TokenEvent { begin, end, fragment, outer_captures } = event;

        let mut buf: Cow<[u8]> = if fragment.is_empty() {
            Cow::Borrowed(&subject[begin..end])
        } else {
            let mut merged = fragment;
            merged.extend_from_slice(&subject[begin..end]);
            Cow::Owned(merged)
        };

        let outer: Option<(&dyn Captures, &[u8], &StreamPattern)> = outer_captures
            .and_then(|c| self.primary_pattern().map(|p| (c, subject, p)));

        let mut marks_initial_selection = false;
        let ops_len = self.config.ops.len();
        for (i, op) in self.config.ops.iter().enumerate() {
            let result = op.apply(&mut buf, outer)?;
            if result.marks_initial_selection {
                marks_initial_selection = true;
            }
            match result.outcome {
                OpOutcome::Keep => {}
                OpOutcome::Drop => return Ok(ControlFlow::Continue),
                OpOutcome::Stop => return Ok(ControlFlow::Stop),
            }
            let is_last = i + 1 == ops_len;
            if is_last && self.config.tokens_not_stored() {
                self.output.write_output(&buf).map_err(CoreError::from)?;
                return Ok(ControlFlow::Continue);
            }
        }

        if self.config.tokens_not_stored() {
            self.output.write_output(&buf).map_err(CoreError::from)?;
            return Ok(ControlFlow::Continue);
        }

        let mut token = Token::from_cow(buf);
        self.apply_field_pattern(&mut token)?;

        if !self.check_unique(token.key()) {
            return Ok(ControlFlow::Continue);
        }

        if self.config.is_direct_output() {
            self.output.write_output(token.buffer()).map_err(CoreError::from)?;
            return Ok(ControlFlow::Continue);
        }

        if marks_initial_selection && self.initial_selection_key.is_none() {
            self.initial_selection_key = Some(token.buffer().to_vec());
        }

        let stop = if self.config.mem_is_bounded() {
            self.insert_bounded(token)
        } else {
            self.stored.push(token);
            false
        };

        if stop {
            return Ok(ControlFlow::Stop);
        }

        Ok(ControlFlow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io;

    use morsel_pcre2::{Pattern, PatternOptions};

    use super::*;
    use crate::config::{Config, PrimaryPattern};
    use crate::numeric::Comparator;
    use crate::operator::CompiledOp;

    fn config_with_ops(ops: Vec<CompiledOp>) -> Config {
        Config {
            primary: PrimaryPattern::SingleByteDelimiter(b'\n'),
            ops,
            buf_size: 1024,
            bytes_to_read: 1024,
            buf_size_frag: 8192,
            max_lookbehind: 0,
            match_mode: false,
            sed: false,
            flush: false,
            use_input_delimiter: false,
            tui: true,
            sort: true,
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
            fuzzing_deterministic: true,
            sort_comparator: Comparator::Lexicographic,
            unique_comparator: Comparator::Lexicographic,
            out_start: None,
            out_end: None,
            out_delimiter: b"\n".to_vec(),
            bout_delimiter: Vec::new(),
            field_pattern: None,
        }
    }

    fn feed(pipeline: &mut Pipeline<'_, io::Sink>, subject: &[u8]) {
        let event = TokenEvent {
            begin: 0,
            end: subject.len(),
            fragment: Vec::new(),
            outer_captures: None,
        };
        pipeline.token(subject, event).unwrap();
    }

    /// `TuiSelect` marks a token's position at ingestion time, before
    /// `--sort` has had a chance to move it. The resolved index must track
    /// the token through that reorder rather than freeze the ingestion-time
    /// position.
    #[test]
    fn initial_selection_survives_final_sort() {
        let pattern = Pattern::compile("a", PatternOptions::default()).unwrap();
        let ops = vec![CompiledOp::TuiSelect { pattern, already_matched: Cell::new(false) }];
        let config = config_with_ops(ops);
        let mut pipeline = Pipeline::new(&config, io::sink(), None);

        // Fed out of sorted order; the marked token ("a") lands last.
        feed(&mut pipeline, b"c");
        feed(&mut pipeline, b"b");
        feed(&mut pipeline, b"a");

        let (stored, index) = pipeline.into_stored();
        let bufs: Vec<&[u8]> = stored.iter().map(|t| t.buffer()).collect();
        assert_eq!(bufs, vec![b"a".as_slice(), b"b", b"c"]);
        assert_eq!(index, Some(0));
    }
}
