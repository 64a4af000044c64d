//! The compiled settings handed to the match engine and pipeline by the
//! argument layer.
//!
//! `Config` is deliberately inert: it holds already-compiled patterns and
//! already-validated numbers. `Config::validate` is the single place that
//! turns impossible combinations into a `CoreError::Config`; nothing
//! downstream re-checks these invariants.

use std::cmp;

use morsel_pcre2::{Pattern, StreamPattern};

use crate::error::{CoreError, Result};
use crate::numeric::Comparator;
use crate::operator::CompiledOp;

/// Whether the primary pattern identifies the tokens themselves or the
/// separators between them (GLOSSARY: "Delimiter mode / Match mode").
///
/// Not `Debug`: the `StreamPattern` variants wrap a raw PCRE2 code
/// pointer that doesn't own a printable representation.
pub enum PrimaryPattern {
    /// Primary pattern matches the separators; fast-pathed to a single
    /// byte when possible.
    Delimiter(StreamPattern),
    /// A delimiter that's exactly one literal byte, bypassing the regex
    /// engine entirely.
    SingleByteDelimiter(u8),
    /// Primary pattern matches the tokens themselves.
    Match(StreamPattern),
}

/// Default `buf_size`.
pub const DEFAULT_BUF_SIZE: usize = 32 * 1024;

/// The full compiled configuration for one run of the core.
///
/// Not `Debug`: `ops` holds compiled `Pattern`/`StreamPattern` values
/// that don't implement it either (see `PrimaryPattern`).
pub struct Config {
    /// The primary pattern, in whichever mode it was compiled for.
    pub primary: PrimaryPattern,
    /// The operator pipeline, in declaration order.
    pub ops: Vec<CompiledOp>,

    /// Size of the match buffer.
    pub buf_size: usize,
    /// Maximum bytes requested per read call.
    pub bytes_to_read: usize,
    /// Size of the fragment buffer.
    pub buf_size_frag: usize,
    /// Bytes of lookbehind retained across buffer compactions, already
    /// multiplied by 4 if `utf` is set.
    pub max_lookbehind: usize,

    /// Primary pattern matches tokens rather than separators.
    pub match_mode: bool,
    /// Sed mode: additionally write the bytes around each match verbatim.
    pub sed: bool,
    /// Use raw, possibly-short, unbuffered reads.
    pub flush: bool,
    /// Honor a delimiter match that lands exactly at EOF as terminating a
    /// (possibly empty) trailing token, rather than discarding it.
    pub use_input_delimiter: bool,
    /// Present results via an interactive selector instead of a byte
    /// stream.
    pub tui: bool,
    /// Sort stored tokens before emitting them.
    pub sort: bool,
    /// Deduplicate stored tokens.
    pub unique: bool,
    /// Reverse token order as a final step.
    pub reverse: bool,
    /// Bounded-memory mode keeps the last `out_end` tokens (dropping from
    /// the front as new ones arrive) instead of the first `out_end`.
    pub tail: bool,
    /// Keep going after a non-fatal error instead of letting it affect
    /// the exit status.
    pub tenacious: bool,
    /// TUI: tokens are offered for selection in sorted order.
    pub selection_order: bool,
    /// TUI: the `End` key is enabled.
    pub end: bool,
    /// TUI: more than one token may be selected.
    pub multiple_selections: bool,
    /// Suppress the trailing `bout_delimiter` unless `delimit_on_empty`.
    pub delimit_not_at_end: bool,
    /// Force a trailing `bout_delimiter` even when nothing was emitted.
    pub delimit_on_empty: bool,
    /// Treat invalid UTF-8 as tolerable rather than a fatal error.
    pub invalid_utf_tolerant: bool,
    /// Suppress the one-shot fragment-dropped diagnostic.
    pub ignore_boundary_warning: bool,
    /// Run the final sort deterministically, single-threaded, opting out
    /// of the parallel sort.
    pub fuzzing_deterministic: bool,

    /// Comparator used when `sort` is set.
    pub sort_comparator: Comparator,
    /// Comparator used when `unique` is set.
    pub unique_comparator: Comparator,

    /// Lower bound of the output window (head/tail skip count).
    pub out_start: Option<usize>,
    /// Upper bound of the output window (bounded-memory cap).
    pub out_end: Option<usize>,

    /// Delimiter written between consecutive output tokens.
    pub out_delimiter: Vec<u8>,
    /// Delimiter written between batches / after the last batch.
    pub bout_delimiter: Vec<u8>,

    /// Optional pattern selecting the sub-range of a token used as its
    /// comparison/hash key (a "field").
    pub field_pattern: Option<Pattern>,
}

impl Config {
    /// `is_direct_output = !tui && !sort && !reverse`.
    pub fn is_direct_output(&self) -> bool {
        !self.tui && !self.sort && !self.reverse
    }

    /// `tokens_not_stored = is_direct_output && !unique`.
    pub fn tokens_not_stored(&self) -> bool {
        self.is_direct_output() && !self.unique
    }

    /// Whether the stored-token vector is a fixed-size sorted/unsorted
    /// buffer maintained incrementally, rather than grown without bound
    /// and truncated at the end. Bounded memory applies whenever there's
    /// a cap and either sorting or uniqueness doesn't need the full
    /// history to decide what survives.
    pub fn mem_is_bounded(&self) -> bool {
        self.out_end.is_some() && (!self.unique || self.sort_comparator == self.unique_comparator)
    }

    /// The single byte this config's primary pattern degenerates to, if
    /// any.
    pub fn single_byte_delimiter(&self) -> Option<u8> {
        match &self.primary {
            PrimaryPattern::SingleByteDelimiter(b) => Some(*b),
            _ => None,
        }
    }

    /// Validate cross-field invariants that can only be checked once every
    /// field is set. Called once, after the argument layer finishes
    /// building a `Config`.
    pub fn validate(&self) -> Result<()> {
        if self.buf_size == 0 {
            return Err(CoreError::Config("buf_size must be nonzero".to_string()));
        }
        if self.bytes_to_read == 0 {
            return Err(CoreError::Config(
                "bytes_to_read must be nonzero".to_string(),
            ));
        }
        if self.bytes_to_read > self.buf_size {
            return Err(CoreError::Config(
                "bytes_to_read must not exceed buf_size".to_string(),
            ));
        }

        let min_length = match &self.primary {
            PrimaryPattern::Delimiter(p) | PrimaryPattern::Match(p) => {
                p.min_length_chars() as usize
            }
            PrimaryPattern::SingleByteDelimiter(_) => 1,
        };
        if self.buf_size < min_length {
            return Err(CoreError::Config(format!(
                "buf_size ({}) is smaller than the pattern's minimum match length ({})",
                self.buf_size, min_length
            )));
        }
        if self.buf_size < self.max_lookbehind + min_length {
            return Err(CoreError::Config(format!(
                "buf_size ({}) must be at least max_lookbehind ({}) plus the \
                 pattern's minimum match length ({})",
                self.buf_size, self.max_lookbehind, min_length
            )));
        }

        let replace_present = self.ops.iter().any(|op| matches!(op, CompiledOp::Replace { .. }));
        if replace_present && !self.match_mode && !self.sed {
            return Err(CoreError::Config(
                "a replace operation requires match mode or sed mode".to_string(),
            ));
        }

        if self.out_end.is_some() && self.unique {
            // Bounded-memory insertion sort and uniqueness both want to
            // own the stored vector's shape; the pipeline driver only
            // implements one path at a time, so it requires the two
            // comparators to agree.
            if self.sort_comparator != self.unique_comparator {
                return Err(CoreError::Config(
                    "sort and unique comparators must agree in bounded-memory mode"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Derive `max_lookbehind` from a compiled pattern's own introspection,
/// multiplying by 4 under UTF mode.
pub fn detect_max_lookbehind(pattern: &StreamPattern, utf: bool) -> usize {
    let bytes = pattern.max_lookbehind_chars() as usize;
    if utf {
        bytes * 4
    } else {
        bytes
    }
}

/// `buf_size_frag` default: `buf_size * 8`.
pub fn default_buf_size_frag(buf_size: usize) -> usize {
    buf_size.saturating_mul(8)
}

/// Clamp a requested lookbehind so it never exceeds `buf_size`, used when
/// a user supplies `max_lookbehind` explicitly rather than letting it be
/// auto-detected.
pub fn clamp_lookbehind(requested: usize, buf_size: usize) -> usize {
    cmp::min(requested, buf_size)
}
