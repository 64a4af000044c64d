//! The partial-match-aware pattern used by the match engine's streaming
//! loop. Everything else in this crate goes through
//! [`crate::Pattern`]; this type exists only because the match engine
//! needs `PCRE2_PARTIAL_HARD` and pattern introspection, neither of which
//! the safe `pcre2` crate exposes. See `crate::raw` for why this reaches
//! past it.

use std::collections::HashMap;

use morsel_matcher::{Captures, Match};

use crate::error::Error;
use crate::pattern::PatternOptions;
use crate::raw::{self, MatchOutcome, RawCode, RawMatchData};

/// A compiled pattern plus its own reusable match-data block, used for one
/// match engine's primary (delimiter or match-mode) pattern.
pub struct StreamPattern {
    code: RawCode,
    match_data: RawMatchData,
    max_lookbehind_chars: u32,
    min_length_chars: u32,
    utf: bool,
    names: HashMap<String, usize>,
}

impl StreamPattern {
    /// Compile `pattern_str` for streaming use.
    pub fn compile(
        pattern_str: &str,
        opts: PatternOptions,
    ) -> Result<StreamPattern, Error> {
        let mut options = 0u32;
        if opts.caseless {
            options |= raw::CASELESS;
        }
        if opts.multi_line {
            options |= raw::MULTILINE;
        }
        if opts.utf {
            options |= raw::UTF;
        }
        if opts.invalid_utf_tolerant {
            options |= raw::NO_UTF_CHECK;
        }
        let bytes = if opts.literal {
            pcre2::escape(pattern_str).into_bytes()
        } else {
            pattern_str.as_bytes().to_vec()
        };
        log::trace!("compiling primary pattern: {:?}", pattern_str);
        let code = RawCode::compile(&bytes, options)?;
        let match_data = RawMatchData::for_code(&code);
        let max_lookbehind_chars = code.max_lookbehind()?;
        let min_length_chars = code.min_length()?;
        let names = code.capture_names()?;
        Ok(StreamPattern {
            code,
            match_data,
            max_lookbehind_chars,
            min_length_chars,
            utf: opts.utf,
            names,
        })
    }

    /// Resolve a `$name` reference to this pattern's capture group index.
    /// Used by `Replace`, the one operator that substitutes against the
    /// primary pattern's outer match instead of its own compiled
    /// [`crate::Pattern`].
    pub fn name_to_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Whether this pattern was compiled in UTF mode. The match engine
    /// uses this to decide whether it needs to keep buffer boundaries
    /// aligned on codepoint edges.
    pub fn is_utf(&self) -> bool {
        self.utf
    }

    /// The pattern's declared maximum lookbehind, in characters. Under UTF
    /// mode the match engine multiplies this by 4 (max UTF-8 bytes per
    /// character) to get a byte count.
    pub fn max_lookbehind_chars(&self) -> u32 {
        self.max_lookbehind_chars
    }

    /// A lower bound on the pattern's minimum match length, in characters.
    pub fn min_length_chars(&self) -> u32 {
        self.min_length_chars
    }

    /// Attempt one match starting at `start_offset`, treating only
    /// `subject[..effective_end]` as live input. `partial_hard` should be
    /// set while more input might still arrive; `notempty_atstart`
    /// suppresses a repeat zero-width match at the offset the previous
    /// iteration already consumed.
    pub fn try_match(
        &self,
        subject: &[u8],
        effective_end: usize,
        start_offset: usize,
        partial_hard: bool,
        notempty_atstart: bool,
    ) -> Result<MatchOutcome, Error> {
        let mut options = 0u32;
        if partial_hard {
            options |= raw::PARTIAL_HARD;
        }
        if notempty_atstart {
            options |= raw::NOTEMPTY_ATSTART;
        }
        raw::try_match(
            &self.code,
            &self.match_data,
            subject,
            effective_end,
            start_offset,
            options,
        )
    }

    /// The capture groups from the most recent [`StreamPattern::try_match`]
    /// call that returned [`MatchOutcome::Complete`].
    pub fn captures(&self) -> StreamCaptures<'_> {
        StreamCaptures { ovector: self.match_data.ovector() }
    }
}

/// Capture groups read out of a [`StreamPattern`]'s match data.
pub struct StreamCaptures<'a> {
    ovector: &'a [usize],
}

impl<'a> Captures for StreamCaptures<'a> {
    fn len(&self) -> usize {
        self.ovector.len() / 2
    }

    fn get(&self, i: usize) -> Option<Match> {
        let (start, end) = (*self.ovector.get(i * 2)?, *self.ovector.get(i * 2 + 1)?);
        if start == usize::MAX || end == usize::MAX {
            return None;
        }
        Some(Match::new(start, end))
    }
}
