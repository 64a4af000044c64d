//! Command-line argument parsing: turns process arguments into a
//! validated [`Config`] plus the uniqueness set the pipeline needs.
//!
//! `clap`'s builder API is wrapped behind a small `Args` type that is
//! built once from `ArgMatches` and then consumed to produce a frozen
//! `Config`.

use std::cell::Cell;
use std::ffi::OsString;

use clap::ArgMatches;

use morsel_pcre2::{Pattern, PatternOptions, StreamPattern};

use crate::app::app;
use crate::config::{
    clamp_lookbehind, default_buf_size_frag, detect_max_lookbehind, Config, PrimaryPattern,
    DEFAULT_BUF_SIZE,
};
use crate::error::{CoreError, Result};
use crate::numeric::Comparator;
use crate::operator::{Align, CompiledOp, RmOrFilterKind};
use crate::uniqueness::UniquenessSet;

/// A parsed, validated command line: the compiled [`Config`] plus the
/// uniqueness set `--unique` asked for (kept separate from `Config`
/// because it's mutable working state, not a setting).
pub struct Args {
    config: Config,
    unique_set: Option<UniquenessSet>,
}

impl Args {
    /// Parse `std::env::args_os()`. `--help`/`--version` and malformed
    /// flags exit the process directly, the way clap's own
    /// `get_matches()` does.
    pub fn parse() -> Result<Args> {
        Args::parse_from(std::env::args_os())
    }

    /// As [`Args::parse`], but from an explicit argument list (used by
    /// the integration tests to drive the core without a subprocess).
    pub fn parse_from<I, T>(args: I) -> Result<Args>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = app().get_matches_from_safe(args).unwrap_or_else(|e| e.exit());
        Args::from_matches(&matches)
    }

    /// Consume `self`, handing ownership of the config and uniqueness set
    /// to the caller (`try_main` builds the pipeline from these).
    pub fn into_parts(self) -> (Config, Option<UniquenessSet>) {
        (self.config, self.unique_set)
    }

    fn from_matches(matches: &ArgMatches<'_>) -> Result<Args> {
        let ignore_case = matches.is_present("ignore-case");
        let multi_line = matches.is_present("multiline");
        let utf = matches.is_present("utf") || matches.is_present("utf-allow-invalid");
        let invalid_utf_tolerant = matches.is_present("utf-allow-invalid");
        let regex = matches.is_present("regex");
        let sed = matches.is_present("sed");
        let match_mode = matches.is_present("match") || sed;

        let pattern_str = matches.value_of("pattern").unwrap_or("\n");
        let primary_opts = PatternOptions {
            literal: !regex,
            caseless: ignore_case,
            multi_line,
            utf,
            invalid_utf_tolerant,
        };

        let primary = if !match_mode && !regex && !ignore_case && pattern_str.len() == 1 {
            PrimaryPattern::SingleByteDelimiter(pattern_str.as_bytes()[0])
        } else if match_mode {
            PrimaryPattern::Match(StreamPattern::compile(pattern_str, primary_opts)?)
        } else {
            PrimaryPattern::Delimiter(StreamPattern::compile(pattern_str, primary_opts)?)
        };

        let buf_size = parse_usize(matches, "buf-size", DEFAULT_BUF_SIZE)?;
        let buf_size_frag = parse_usize(matches, "buf-size-frag", default_buf_size_frag(buf_size))?;
        let bytes_to_read = parse_usize(matches, "read", buf_size)?;

        let max_lookbehind = match &primary {
            PrimaryPattern::Delimiter(p) | PrimaryPattern::Match(p) => match matches.value_of("max-lookbehind") {
                Some(v) => clamp_lookbehind(parse_arg_usize(v, "max-lookbehind")?, buf_size),
                None => detect_max_lookbehind(p, utf),
            },
            PrimaryPattern::SingleByteDelimiter(_) => 0,
        };

        // Every operator pattern is always a regex (unlike the primary
        // pattern, which can be a plain literal delimiter byte); they
        // share the primary's case/multiline/utf modifiers.
        let op_opts = PatternOptions {
            literal: false,
            caseless: ignore_case,
            multi_line,
            utf,
            invalid_utf_tolerant,
        };
        let ops = compile_ops(matches, op_opts)?;

        let field_pattern = matches
            .value_of("field")
            .map(|p| Pattern::compile(p, op_opts))
            .transpose()?;

        let sort = matches.is_present("sort");
        let sort_comparator = parse_comparator(matches.value_of("sort-by"))?;
        let unique = matches.is_present("unique");
        let unique_comparator = parse_comparator(matches.value_of("unique-by"))?;

        let out_start = matches
            .value_of("out-start")
            .map(|v| parse_arg_usize(v, "out-start"))
            .transpose()?;
        let out_end = matches
            .value_of("out-end")
            .map(|v| parse_arg_usize(v, "out-end"))
            .transpose()?;

        let out_delimiter = matches.value_of("output-delimiter").unwrap_or("\n").as_bytes().to_vec();
        // An unset batch delimiter defaults to whatever the output
        // delimiter ended up being, not to empty, so a plain run still
        // terminates its last token the same way it separated every token
        // before it.
        let bout_delimiter = match matches.value_of("batch-delimiter") {
            Some(v) => v.as_bytes().to_vec(),
            None => out_delimiter.clone(),
        };

        let config = Config {
            primary,
            ops,

            buf_size,
            bytes_to_read,
            buf_size_frag,
            max_lookbehind,

            match_mode,
            sed,
            flush: matches.is_present("flush"),
            use_input_delimiter: matches.is_present("use-delimiter"),
            tui: matches.is_present("tui"),
            sort,
            unique,
            reverse: matches.is_present("reverse"),
            tail: matches.is_present("out-tail"),
            tenacious: matches.is_present("tenacious"),
            selection_order: matches.is_present("selection-order"),
            end: matches.is_present("end"),
            multiple_selections: matches.is_present("multi"),
            delimit_not_at_end: matches.is_present("delimit-not-at-end"),
            delimit_on_empty: matches.is_present("delimit-on-empty"),
            invalid_utf_tolerant,
            ignore_boundary_warning: matches.is_present("no-warn"),
            fuzzing_deterministic: matches.is_present("single-threaded"),

            sort_comparator,
            unique_comparator,

            out_start,
            out_end,

            out_delimiter,
            bout_delimiter,

            field_pattern,
        };
        config.validate()?;

        let unique_set = if unique {
            Some(build_unique_set(matches, unique_comparator)?)
        } else {
            None
        };

        Ok(Args { config, unique_set })
    }
}

fn build_unique_set(matches: &ArgMatches<'_>, comparator: Comparator) -> Result<UniquenessSet> {
    let ordered = matches.is_present("unique-ordered");
    match matches.value_of("unique-window") {
        Some(v) => {
            let n = parse_arg_usize(v, "unique-window")?;
            Ok(if ordered {
                UniquenessSet::forgetful_ordered(comparator, n)
            } else {
                UniquenessSet::forgetful_hash(comparator, n)
            })
        }
        None => Ok(if ordered {
            UniquenessSet::ordered_unique(comparator)
        } else {
            UniquenessSet::hash_unique(comparator)
        }),
    }
}

fn parse_comparator(value: Option<&str>) -> Result<Comparator> {
    match value {
        None | Some("lex") | Some("lexicographic") => Ok(Comparator::Lexicographic),
        Some("numeric") => Ok(Comparator::Numeric),
        Some("general-numeric") | Some("general") => Ok(Comparator::GeneralNumeric),
        Some(other) => Err(CoreError::Config(format!(
            "unrecognized comparator {:?} (expected lexicographic, numeric, or general-numeric)",
            other
        ))),
    }
}

fn parse_usize(matches: &ArgMatches<'_>, name: &str, default: usize) -> Result<usize> {
    match matches.value_of(name) {
        Some(v) => parse_arg_usize(v, name),
        None => Ok(default),
    }
}

fn parse_arg_usize(value: &str, name: &str) -> Result<usize> {
    value
        .parse::<usize>()
        .map_err(|_| CoreError::Config(format!("--{} must be a nonnegative integer, got {:?}", name, value)))
}

fn parse_arg_u64(value: &str, name: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|_| CoreError::Config(format!("--{} must be a nonnegative integer, got {:?}", name, value)))
}

/// Build the compiled operator chain, in the order its flags appeared on
/// the command line: the pipeline applies `ops` in declaration order.
fn compile_ops(matches: &ArgMatches<'_>, op_opts: PatternOptions) -> Result<Vec<CompiledOp>> {
    let mut staged: Vec<(usize, CompiledOp)> = Vec::new();

    for (i, pattern) in indexed_values(matches, "filter") {
        staged.push((
            i,
            CompiledOp::RmOrFilter { kind: RmOrFilterKind::Filter, pattern: Pattern::compile(pattern, op_opts)? },
        ));
    }
    for (i, pattern) in indexed_values(matches, "remove") {
        staged.push((
            i,
            CompiledOp::RmOrFilter { kind: RmOrFilterKind::Remove, pattern: Pattern::compile(pattern, op_opts)? },
        ));
    }
    for (i, (pattern, replacement)) in indexed_pairs(matches, "sub") {
        staged.push((
            i,
            CompiledOp::Substitute {
                pattern: Pattern::compile(pattern, op_opts)?,
                replacement: replacement.as_bytes().to_vec(),
            },
        ));
    }
    for (i, replacement) in indexed_values(matches, "replace") {
        staged.push((i, CompiledOp::Replace { replacement: replacement.as_bytes().to_vec() }));
    }
    for i in indexed_flags(matches, "index-before") {
        staged.push((i, CompiledOp::Index { align: Align::Before, counter: Cell::new(0) }));
    }
    for i in indexed_flags(matches, "index-after") {
        staged.push((i, CompiledOp::Index { align: Align::After, counter: Cell::new(0) }));
    }
    for (i, n) in indexed_values(matches, "head") {
        let high = parse_arg_u64(n, "head")?;
        staged.push((i, CompiledOp::InLimit { consumed: Cell::new(0), low: None, high }));
    }
    for (i, (low, high)) in indexed_pairs(matches, "window") {
        let low = parse_arg_u64(low, "window")?;
        let high = parse_arg_u64(high, "window")?;
        staged.push((i, CompiledOp::InLimit { consumed: Cell::new(0), low: Some(low), high }));
    }
    for (i, pattern) in indexed_values(matches, "tui-select") {
        staged.push((
            i,
            CompiledOp::TuiSelect { pattern: Pattern::compile(pattern, op_opts)?, already_matched: Cell::new(false) },
        ));
    }

    staged.sort_by_key(|(i, _)| *i);
    Ok(staged.into_iter().map(|(_, op)| op).collect())
}

/// Pair each occurrence of a single-valued, possibly-repeated flag with
/// its position on the command line, so [`compile_ops`] can interleave
/// different flags in the order the user actually gave them.
fn indexed_values<'a>(matches: &'a ArgMatches<'_>, name: &str) -> Vec<(usize, &'a str)> {
    let indices: Vec<usize> = matches.indices_of(name).map(Iterator::collect).unwrap_or_default();
    let values: Vec<&str> = matches.values_of(name).map(Iterator::collect).unwrap_or_default();
    indices.into_iter().zip(values).collect()
}

/// As [`indexed_values`], but for a flag declared with
/// `.number_of_values(2)`: each occurrence contributes a pair, anchored
/// at its first value's index.
fn indexed_pairs<'a>(matches: &'a ArgMatches<'_>, name: &str) -> Vec<(usize, (&'a str, &'a str))> {
    let indices: Vec<usize> = matches.indices_of(name).map(Iterator::collect).unwrap_or_default();
    let values: Vec<&str> = matches.values_of(name).map(Iterator::collect).unwrap_or_default();
    indices
        .chunks(2)
        .zip(values.chunks(2))
        .filter_map(|(ix, vs)| match (ix.first(), vs) {
            (Some(&i), [a, b]) => Some((i, (*a, *b))),
            _ => None,
        })
        .collect()
}

fn indexed_flags(matches: &ArgMatches<'_>, name: &str) -> Vec<usize> {
    matches.indices_of(name).map(Iterator::collect).unwrap_or_default()
}
