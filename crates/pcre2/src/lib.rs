/*!
A thin semantic wrapper over PCRE2.

Two pattern types live here, split by what they need from the regex
engine:

- [`Pattern`] wraps the safe `pcre2` crate and backs every non-streaming
  operator: `RmOrFilter`, `TuiSelect`, `Substitute`.
- [`engine::StreamPattern`] reaches one layer lower, directly against
  `libpcre2-8`, because the match engine's streaming loop needs partial
  matching and pattern introspection that the safe crate doesn't expose.
  See `raw` for the reasoning.
*/

#![deny(missing_docs)]

mod engine;
mod error;
mod pattern;
mod raw;

use morsel_matcher::Captures;

pub use crate::engine::{StreamCaptures, StreamPattern};
pub use crate::error::{Error, ErrorKind};
pub use crate::pattern::{Pattern, PatternCaptures, PatternOptions};
pub use crate::raw::MatchOutcome;

/// Replace the matched region `captures` describes with `replacement`,
/// interpolating `$name`/`$N` references against `subject`. Unlike
/// [`Pattern::substitute_global`], this doesn't scan `subject` for further
/// matches: the caller already knows which single region — the outer
/// match — is being replaced.
///
/// The safe `pcre2` crate (and this crate's own `raw` FFI layer) has no
/// `pcre2_substitute`-level primitive that understands "replace only the
/// matched span, honoring the rest of the subject for lookaround"; this
/// falls back to substituting within the matched slice using the same
/// `$`-interpolation `substitute_global` already relies on.
pub fn substitute_on_match(
    captures: &dyn Captures,
    pattern: &StreamPattern,
    subject: &[u8],
    replacement: &[u8],
) -> Vec<u8> {
    let mut dst = Vec::new();
    captures.interpolate(
        &mut |name| pattern.name_to_index(name),
        subject,
        replacement,
        &mut dst,
    );
    dst
}
