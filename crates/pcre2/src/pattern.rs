use std::collections::HashMap;

use pcre2::bytes::{CaptureLocations, Regex, RegexBuilder};

use morsel_matcher::{Captures, Match};

use crate::error::Error;

/// Options shared by every pattern this crate compiles: literal, caseless,
/// multiline, UTF, invalid-UTF-tolerant.
#[derive(Clone, Copy, Debug, Default)]
pub struct PatternOptions {
    /// Treat the pattern as a literal string rather than a regular
    /// expression.
    pub literal: bool,
    /// Case-insensitive matching.
    pub caseless: bool,
    /// `^`/`$` match at line boundaries, not just subject boundaries.
    pub multi_line: bool,
    /// Treat the subject as UTF-8; `.` and character classes operate on
    /// codepoints rather than bytes.
    pub utf: bool,
    /// Under UTF mode, don't reject the subject on invalid UTF-8 — let the
    /// engine do its best-effort thing instead of erroring out.
    pub invalid_utf_tolerant: bool,
}

/// A compiled, reusable pattern for non-streaming matching: used by
/// `RmOrFilter`, `TuiSelect`, and `Substitute`, none of which need the
/// partial-match machinery the match engine itself requires (see
/// [`crate::engine::StreamPattern`] for that).
///
/// Built around the narrow set of operations this pipeline's operators
/// actually need, rather than a general-purpose `Matcher` abstraction.
#[derive(Clone, Debug)]
pub struct Pattern {
    regex: Regex,
    /// Capture group name to index, built once at compile time from
    /// `Regex::capture_names()`: `Captures::interpolate`'s `name_to_index`
    /// callback needs O(1) lookup, not a linear rescan of the pattern's
    /// capture table on every `$name` reference.
    names: HashMap<String, usize>,
}

impl Pattern {
    /// Compile `pattern_str` with the given options.
    pub fn compile(
        pattern_str: &str,
        opts: PatternOptions,
    ) -> Result<Pattern, Error> {
        let mut builder = RegexBuilder::new();
        builder
            .caseless(opts.caseless)
            .multi_line(opts.multi_line)
            .utf(opts.utf)
            .ucp(opts.utf);
        if opts.invalid_utf_tolerant {
            builder.disable_utf_check();
        }
        let pattern_str = if opts.literal {
            pcre2::escape(pattern_str)
        } else {
            pattern_str.to_string()
        };
        log::trace!("compiling operator pattern: {:?}", pattern_str);
        let regex =
            builder.build(&pattern_str).map_err(Error::regex)?;
        let mut names = HashMap::new();
        for (i, name) in regex.capture_names().iter().enumerate() {
            if let Some(name) = name {
                names.insert(name.to_string(), i);
            }
        }
        Ok(Pattern { regex, names })
    }

    /// Resolve a `$name` reference to its capture group index.
    fn name_to_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Returns true if and only if the pattern matches anywhere in
    /// `subject`.
    pub fn is_match(&self, subject: &[u8]) -> Result<bool, Error> {
        self.regex.is_match(subject).map_err(Error::regex)
    }

    /// Find the leftmost match starting no earlier than `start`, along with
    /// its capture groups.
    pub fn find_at(
        &self,
        subject: &[u8],
        start: usize,
    ) -> Result<Option<(Match, PatternCaptures)>, Error> {
        let mut locs = self.regex.capture_locations();
        let found = self
            .regex
            .captures_read_at(&mut locs, subject, start)
            .map_err(Error::regex)?;
        match found {
            None => Ok(None),
            Some(m) => {
                Ok(Some((Match::new(m.start(), m.end()), PatternCaptures(locs))))
            }
        }
    }

    /// Iterate over every non-overlapping match in `subject`, calling `f`
    /// with the match span and its captures. Stops early if `f` returns
    /// `false`.
    pub fn find_iter<F>(&self, subject: &[u8], mut f: F) -> Result<(), Error>
    where
        F: FnMut(Match, &PatternCaptures) -> bool,
    {
        let mut start = 0;
        while start <= subject.len() {
            match self.find_at(subject, start)? {
                None => break,
                Some((m, caps)) => {
                    let keep_going = f(m, &caps);
                    if !keep_going {
                        break;
                    }
                    start = if m.is_empty() { m.end() + 1 } else { m.end() };
                }
            }
        }
        Ok(())
    }

    /// Perform a global substitution of every match in `subject` with
    /// `replacement`, interpolating `$N`/`$name` capture references.
    ///
    /// Builds the replacement text by interpolating capture references
    /// against each match rather than asking the regex engine to
    /// substitute, the same way capture-aware replacement output is built
    /// elsewhere in this codebase.
    pub fn substitute_global(
        &self,
        subject: &[u8],
        replacement: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(subject.len());
        let mut last_end = 0;
        self.find_iter(subject, |m, caps| {
            out.extend_from_slice(&subject[last_end..m.start()]);
            caps.interpolate(
                &mut |name| self.name_to_index(name),
                subject,
                replacement,
                &mut out,
            );
            last_end = m.end();
            true
        })?;
        out.extend_from_slice(&subject[last_end..]);
        Ok(out)
    }
}

/// Capture groups produced by [`Pattern`].
#[derive(Clone, Debug)]
pub struct PatternCaptures(CaptureLocations);

impl Captures for PatternCaptures {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn get(&self, i: usize) -> Option<Match> {
        self.0.get(i).map(|(s, e)| Match::new(s, e))
    }
}
