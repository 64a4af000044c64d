use std::env;
use std::process::Command;

use clap::Shell;

#[allow(dead_code)]
#[path = "crates/core/app.rs"]
mod app;

fn main() {
    let outdir = match env::var_os("OUT_DIR") {
        Some(outdir) => outdir,
        None => return,
    };

    let mut app = app::app();
    app.gen_completions("morsel", Shell::Bash, &outdir);
    app.gen_completions("morsel", Shell::Fish, &outdir);
    app.gen_completions("morsel", Shell::PowerShell, &outdir);

    if let Some(rev) = git_revision_hash() {
        println!("cargo:rustc-env=MORSEL_BUILD_GIT_HASH={}", rev);
    }
}

/// Try to get the current git revision hash, for embedding in `--version`
/// output via `MORSEL_BUILD_GIT_HASH`. Best effort: when this isn't a git
/// checkout (e.g. a crates.io source tarball), there's simply no hash.
fn git_revision_hash() -> Option<String> {
    let result = Command::new("git")
        .arg("rev-parse")
        .arg("--short=10")
        .arg("HEAD")
        .output();
    let output = match result {
        Err(_) => return None,
        Ok(output) => output,
    };
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string())
}
