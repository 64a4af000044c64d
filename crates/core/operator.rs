//! The compiled operator chain.
//!
//! Each variant is one per-token transformation or filter a user can chain
//! onto the pipeline. The pipeline drives this chain in declaration order
//! for every token event; `CompiledOp` itself stays ignorant of
//! direct-output / bounded-memory bookkeeping, which belongs to
//! `pipeline.rs`.

use std::borrow::Cow;
use std::cell::Cell;

use morsel_matcher::Captures;
use morsel_pcre2::{Pattern, StreamPattern};

use crate::error::{CoreError, Result};

/// Whether an `RmOrFilter` operator removes tokens that match, or keeps
/// only tokens that match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmOrFilterKind {
    /// Drop tokens that match the pattern.
    Remove,
    /// Keep only tokens that match the pattern.
    Filter,
}

/// Where `Index` places the counter relative to the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// `"<n> <token>"`.
    Before,
    /// `"<token> <n>"`.
    After,
}

/// What an operator decided about the current token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    /// Continue processing this token through the remaining ops.
    Keep,
    /// Drop the token; stop processing the chain.
    Drop,
    /// `InLimit` has reached its upper bound: stop processing the chain
    /// for this token (it is dropped) and signal the pipeline to halt
    /// entirely.
    Stop,
}

/// The result of applying one operator to one token.
pub struct ApplyResult {
    /// What happened to the token.
    pub outcome: OpOutcome,
    /// Set by `TuiSelect` the first time it matches: tells the pipeline
    /// this token should become the TUI's initial cursor position.
    pub marks_initial_selection: bool,
}

impl ApplyResult {
    fn keep() -> ApplyResult {
        ApplyResult {
            outcome: OpOutcome::Keep,
            marks_initial_selection: false,
        }
    }

    fn drop_token() -> ApplyResult {
        ApplyResult {
            outcome: OpOutcome::Drop,
            marks_initial_selection: false,
        }
    }

    fn stop() -> ApplyResult {
        ApplyResult {
            outcome: OpOutcome::Stop,
            marks_initial_selection: false,
        }
    }
}

/// One compiled operator in the pipeline.
pub enum CompiledOp {
    /// Drop tokens that do (`Remove`) or do not (`Filter`) match
    /// `pattern`.
    RmOrFilter {
        kind: RmOrFilterKind,
        pattern: Pattern,
    },
    /// Global substitution within the token.
    Substitute { pattern: Pattern, replacement: Vec<u8> },
    /// Substitution on the outer match (requires match or sed mode;
    /// `Config::validate` enforces this at configuration time).
    Replace { replacement: Vec<u8> },
    /// Prepend or append an ascii decimal input index and a space.
    ///
    /// `counter` is a `Cell` rather than a plain field because the
    /// pipeline only ever holds a shared `&Config` (engine and pipeline
    /// both need concurrent read access to it), so per-token mutation of
    /// an op's own state has to go through interior mutability.
    Index { align: Align, counter: Cell<u64> },
    /// Head/tail/window: `REMOVE` while `consumed < low`, `ALLOW` while
    /// `consumed < high`, `DONE` thereafter.
    InLimit {
        consumed: Cell<u64>,
        low: Option<u64>,
        high: u64,
    },
    /// Marks the first matching token as the TUI's initial cursor
    /// position.
    TuiSelect { pattern: Pattern, already_matched: Cell<bool> },
}

impl CompiledOp {
    /// Apply this operator to `buf`, the token's current byte buffer.
    ///
    /// `outer` carries the outer match's captures, the subject slice, and
    /// the primary pattern that produced them (for `$name` resolution), and
    /// is only consulted by `Replace`; every other operator ignores it.
    pub fn apply(
        &self,
        buf: &mut Cow<'_, [u8]>,
        outer: Option<(&dyn Captures, &[u8], &StreamPattern)>,
    ) -> Result<ApplyResult> {
        match self {
            CompiledOp::RmOrFilter { kind, pattern } => {
                let matched = pattern.is_match(&buf[..]).map_err(CoreError::from)?;
                let keep = match kind {
                    RmOrFilterKind::Remove => !matched,
                    RmOrFilterKind::Filter => matched,
                };
                Ok(if keep {
                    ApplyResult::keep()
                } else {
                    ApplyResult::drop_token()
                })
            }
            CompiledOp::Substitute { pattern, replacement } => {
                let result = pattern
                    .substitute_global(&buf[..], replacement)
                    .map_err(CoreError::from)?;
                *buf = Cow::Owned(result);
                Ok(ApplyResult::keep())
            }
            CompiledOp::Replace { replacement } => {
                // In match-mode the token IS the outer match, so a
                // replace is just "the whole buffer becomes the
                // substituted-on-match result", no prefix/suffix splicing.
                if let Some((captures, subject, pattern)) = outer {
                    *buf = Cow::Owned(morsel_pcre2::substitute_on_match(captures, pattern, subject, replacement));
                }
                Ok(ApplyResult::keep())
            }
            CompiledOp::Index { align, counter } => {
                let n = counter.get();
                counter.set(n + 1);
                let digits = n.to_string();
                let owned = match align {
                    Align::Before => {
                        let mut out = Vec::with_capacity(digits.len() + 1 + buf.len());
                        out.extend_from_slice(digits.as_bytes());
                        out.push(b' ');
                        out.extend_from_slice(buf);
                        out
                    }
                    Align::After => {
                        let mut out = Vec::with_capacity(buf.len() + 1 + digits.len());
                        out.extend_from_slice(buf);
                        out.push(b' ');
                        out.extend_from_slice(digits.as_bytes());
                        out
                    }
                };
                *buf = Cow::Owned(owned);
                Ok(ApplyResult::keep())
            }
            CompiledOp::InLimit { consumed, low, high } => {
                let idx = consumed.get();
                consumed.set(idx + 1);
                if let Some(low) = low {
                    if idx < *low {
                        return Ok(ApplyResult::drop_token());
                    }
                }
                if idx < *high {
                    Ok(ApplyResult::keep())
                } else {
                    Ok(ApplyResult::stop())
                }
            }
            CompiledOp::TuiSelect { pattern, already_matched } => {
                let mut result = ApplyResult::keep();
                if !already_matched.get() && pattern.is_match(&buf[..]).map_err(CoreError::from)? {
                    already_matched.set(true);
                    result.marks_initial_selection = true;
                }
                Ok(result)
            }
        }
    }
}
