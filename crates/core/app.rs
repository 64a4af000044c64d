//! The `clap` argument definition, split out from `args.rs` so `build.rs`
//! can reuse it to generate shell completions without depending on the
//! rest of the core crate.
//!
//! `--sort-by`/`--unique-by`/`--field`/`--out-tail` are each their own
//! flag rather than folded into a denser, harder-to-parse value grammar.

use clap::{App, Arg};

lazy_static::lazy_static! {
    /// `CARGO_PKG_VERSION`, plus the short git hash `build.rs` embedded
    /// when this was built from a checkout rather than a source tarball.
    static ref VERSION: String = match option_env!("MORSEL_BUILD_GIT_HASH") {
        Some(hash) => format!("{} (rev {})", env!("CARGO_PKG_VERSION"), hash),
        None => env!("CARGO_PKG_VERSION").to_string(),
    };
}

pub fn app() -> App<'static, 'static> {
    App::new("morsel")
        .version(VERSION.as_str())
        .about("Split, filter, transform, and reorder a stream of tokens")
        .arg(Arg::with_name("pattern").help("primary delimiter or match pattern (default: newline)"))
        .arg(
            Arg::with_name("match")
                .short("m")
                .long("match")
                .help("the primary pattern identifies tokens, not the separators between them"),
        )
        .arg(Arg::with_name("sed").long("sed").help("sed mode: write the bytes around each match verbatim, applying ops only to the match"))
        .arg(Arg::with_name("regex").short("r").long("regex").help("treat the primary pattern as a PCRE2 regex instead of a literal string"))
        .arg(Arg::with_name("ignore-case").short("i").long("ignore-case").help("case-insensitive matching"))
        .arg(Arg::with_name("multiline").long("multiline").help("^ and $ match at line boundaries"))
        .arg(Arg::with_name("utf").long("utf").help("treat input as UTF-8"))
        .arg(Arg::with_name("utf-allow-invalid").long("utf-allow-invalid").help("UTF-8 mode, tolerating invalid sequences instead of erroring"))
        .arg(
            Arg::with_name("filter")
                .short("f")
                .long("filter")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("keep only tokens matching PATTERN"),
        )
        .arg(
            Arg::with_name("remove")
                .long("remove")
                .alias("rm")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("drop tokens matching PATTERN"),
        )
        .arg(
            Arg::with_name("sub")
                .long("sub")
                .alias("substitute")
                .takes_value(true)
                .multiple(true)
                .number_of_values(2)
                .value_names(&["PATTERN", "REPLACEMENT"])
                .help("replace every match of PATTERN within each token with REPLACEMENT"),
        )
        .arg(
            Arg::with_name("replace")
                .long("replace")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("replace the outer match with REPLACEMENT (requires --match or --sed)"),
        )
        .arg(Arg::with_name("index-before").long("index-before").multiple(true).help("prepend each token with its 0-based input index"))
        .arg(Arg::with_name("index-after").long("index-after").multiple(true).help("append each token's 0-based input index"))
        .arg(
            Arg::with_name("head")
                .long("head")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("keep only the first N tokens seen at this point in the pipeline"),
        )
        .arg(
            Arg::with_name("window")
                .long("window")
                .takes_value(true)
                .multiple(true)
                .number_of_values(2)
                .value_names(&["LOW", "HIGH"])
                .help("keep tokens with index in [LOW, HIGH) at this point in the pipeline"),
        )
        .arg(
            Arg::with_name("tui-select")
                .long("tui-select")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("mark the first token matching PATTERN as the TUI's initial cursor position"),
        )
        .arg(Arg::with_name("field").long("field").takes_value(true).help("narrow each token's sort/uniqueness key to its first match of PATTERN"))
        .arg(Arg::with_name("sort").short("s").long("sort").help("sort stored tokens before emitting them"))
        .arg(
            Arg::with_name("sort-by")
                .long("sort-by")
                .takes_value(true)
                .possible_values(&["lexicographic", "numeric", "general-numeric"])
                .help("comparator used by --sort (default: lexicographic)"),
        )
        .arg(Arg::with_name("unique").short("u").long("unique").help("deduplicate stored tokens"))
        .arg(
            Arg::with_name("unique-by")
                .long("unique-by")
                .takes_value(true)
                .possible_values(&["lexicographic", "numeric", "general-numeric"])
                .help("comparator used by --unique (default: lexicographic)"),
        )
        .arg(Arg::with_name("unique-window").long("unique-window").takes_value(true).help("forget a unique token once N more distinct tokens have been seen since"))
        .arg(Arg::with_name("unique-ordered").long("unique-ordered").help("back --unique with an ordered set instead of a hashed one"))
        .arg(Arg::with_name("reverse").long("reverse").help("reverse token order as a final step"))
        .arg(Arg::with_name("out-start").long("out-start").takes_value(true).help("discard the first N tokens of the final output window"))
        .arg(Arg::with_name("out-end").long("out-end").takes_value(true).help("cap the final output window to N tokens, enabling bounded-memory mode"))
        .arg(Arg::with_name("out-tail").long("out-tail").help("with --out-end, keep the last N tokens instead of the first N"))
        .arg(
            Arg::with_name("output-delimiter")
                .short("o")
                .long("output-delimiter")
                .takes_value(true)
                .help("delimiter written between consecutive output tokens (default: newline)"),
        )
        .arg(
            Arg::with_name("batch-delimiter")
                .short("b")
                .long("batch-delimiter")
                .takes_value(true)
                .help("delimiter written after the last output token (default: same as --output-delimiter)"),
        )
        .arg(Arg::with_name("delimit-not-at-end").long("delimit-not-at-end").help("never write the batch delimiter"))
        .arg(Arg::with_name("delimit-on-empty").long("delimit-on-empty").help("write the batch delimiter even if no tokens were emitted"))
        .arg(Arg::with_name("use-delimiter").long("use-delimiter").help("honor a delimiter match landing exactly at EOF as ending a trailing (possibly empty) token"))
        .arg(Arg::with_name("flush").long("flush").help("use raw, possibly-short, unbuffered reads and writes"))
        .arg(Arg::with_name("buf-size").long("buf-size").takes_value(true).help("size in bytes of the match buffer"))
        .arg(Arg::with_name("buf-size-frag").long("buf-size-frag").takes_value(true).help("size in bytes of the fragment buffer (default: 8x buf-size)"))
        .arg(Arg::with_name("max-lookbehind").long("max-lookbehind").takes_value(true).help("override the pattern's auto-detected lookbehind, in bytes"))
        .arg(Arg::with_name("read").long("read").takes_value(true).help("maximum bytes requested per read call (default: buf-size)"))
        .arg(Arg::with_name("tui").short("t").long("tui").help("present results via an interactive selector instead of a byte stream"))
        .arg(Arg::with_name("selection-order").long("selection-order").help("TUI: offer tokens for selection in sorted order"))
        .arg(Arg::with_name("end").short("e").long("end").help("TUI: enable the End key"))
        .arg(Arg::with_name("multi").long("multi").help("TUI: allow selecting more than one token"))
        .arg(Arg::with_name("tenacious").long("tenacious").help("keep going after a non-fatal error instead of letting it affect the exit status"))
        .arg(Arg::with_name("no-warn").long("no-warn").help("suppress the fragment-dropped boundary warning"))
        .arg(Arg::with_name("single-threaded").long("single-threaded").help("run the final sort single-threaded and deterministically"))
}
