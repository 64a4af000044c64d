use std::io::{self, Read, Write};
use std::process;

#[macro_use]
mod messages;

mod app;
mod args;
mod config;
mod engine;
mod error;
mod logger;
mod numeric;
mod operator;
mod output;
mod pipeline;
mod strutil;
mod token;
mod uniqueness;

use args::Args;
use config::Config;
use engine::MatchEngine;
use error::{CoreError, Result};
use output::OutputStream;
use pipeline::Pipeline;
use uniqueness::UniquenessSet;

// The system allocator is fine everywhere else, and jemalloc adds build
// time this crate would rather not pay by default.
#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

fn main() {
    if let Err(err) = Args::parse().and_then(try_main) {
        eprintln_locked!("morsel: {}", err);
        process::exit(2);
    }
}

fn try_main(args: Args) -> Result<()> {
    logger::Logger::init().expect("the logger is installed exactly once, before any other code runs");
    log::set_max_level(log::LevelFilter::Warn);
    messages::set_messages(true);

    let (config, unique_set) = args.into_parts();
    messages::set_ignore_boundary_warning(config.ignore_boundary_warning);

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let writer = io::BufWriter::new(stdout.lock());

    if config.tui {
        run_tui(&config, unique_set, &mut reader, writer)?;
    } else {
        run_stream(&config, unique_set, &mut reader, writer)?;
    }

    if messages::errored() && !config.tenacious {
        process::exit(2);
    }
    Ok(())
}

/// The common case: run the match engine to completion, letting the
/// pipeline write survivors as they arrive (direct-output mode) or
/// buffer them for the final sort/truncate/reverse stage.
fn run_stream<R: Read, W: Write>(
    config: &Config,
    unique_set: Option<UniquenessSet>,
    reader: &mut R,
    writer: W,
) -> Result<()> {
    let mut engine = MatchEngine::new(config);
    let mut pipeline = Pipeline::new(config, writer, unique_set);

    engine.run(reader, &mut pipeline)?;
    pipeline.finish_stored()?;
    pipeline.finish_output()?;
    Ok(())
}

/// TUI mode (`Config.tui`) degrades to: run the match engine exactly as
/// `run_stream` does, collect every surviving token in final order, log
/// the index a `TuiSelect` operator marked as the initial cursor
/// position, then stream the final-order candidates to `writer` the same
/// way `run_stream` would. Rendering an actual interactive selector is out
/// of scope for this binary; this still gives a tenacious caller a
/// deterministic, scriptable result.
///
/// Output goes through a queue (`OutputStream` is queue-aware whenever
/// `Config.tui` is set) and is only flushed to `writer` at the very end,
/// so a real external TUI has exclusive use of the terminal until it
/// tears down.
fn run_tui<R: Read, W: Write>(
    config: &Config,
    unique_set: Option<UniquenessSet>,
    reader: &mut R,
    mut writer: W,
) -> Result<()> {
    let mut engine = MatchEngine::new(config);
    // `tui` forces `!is_direct_output`, so this pipeline's own writer
    // never receives a single byte: every survivor goes to `self.stored`
    // and comes back out through `into_stored` below.
    let mut pipeline = Pipeline::new(config, io::sink(), unique_set);

    engine.run(reader, &mut pipeline)?;

    // The index must be resolved from `stored`'s final order, after
    // `into_stored` has already sorted, truncated, and reversed it:
    // nothing earlier in the pipeline can tell where a token will end up.
    let (stored, initial_selection) = pipeline.into_stored();
    if let Some(index) = initial_selection {
        log::info!("initial TUI selection would be token #{}", index);
    }

    let mut output = OutputStream::new(config, &mut writer);
    for token in &stored {
        output.write_output(token.buffer()).map_err(CoreError::from)?;
    }
    output.finish_output().map_err(CoreError::from)?;
    output.flush_queued().map_err(CoreError::from)?;
    Ok(())
}
