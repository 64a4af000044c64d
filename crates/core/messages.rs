use std::sync::atomic::{AtomicBool, Ordering};

static MESSAGES: AtomicBool = AtomicBool::new(false);
static IGNORE_BOUNDARY_WARNING: AtomicBool = AtomicBool::new(false);
static BOUNDARY_WARNING_FIRED: AtomicBool = AtomicBool::new(false);
static ERRORED: AtomicBool = AtomicBool::new(false);

/// Like `eprintln!`, but locks stdout first to keep diagnostic lines from
/// interleaving with buffered token output on the same terminal.
#[macro_export]
macro_rules! eprintln_locked {
    ($($tt:tt)*) => {{
        {
            let stdout = std::io::stdout();
            let _handle = stdout.lock();
            eprintln!($($tt)*);
        }
    }}
}

/// Emit a non-fatal diagnostic, unless messages are disabled.
#[macro_export]
macro_rules! message {
    ($($tt:tt)*) => {
        if $crate::messages::messages() {
            eprintln_locked!($($tt)*);
        }
    }
}

/// Like `message!`, but also sets the "errored" flag that controls the
/// process exit status: non-fatal diagnostics still affect exit status
/// when `tenacious` isn't set — see `Config::tenacious`.
#[macro_export]
macro_rules! err_message {
    ($($tt:tt)*) => {
        $crate::messages::set_errored();
        message!($($tt)*);
    }
}

/// Emit the one-shot fragment-dropped `BoundaryWarning` diagnostic: at
/// most once per run, and not at all if `ignore_boundary_warning` is
/// set. Goes through `err_message!` like any other non-fatal diagnostic,
/// so it also affects the exit status unless `Config.tenacious` is set.
#[macro_export]
macro_rules! boundary_warning {
    ($($tt:tt)*) => {
        if !$crate::messages::ignore_boundary_warning()
            && !$crate::messages::boundary_warning_fired() {
            $crate::messages::set_boundary_warning_fired();
            err_message!($($tt)*);
        }
    }
}

/// Returns true if and only if diagnostics should be printed at all.
pub fn messages() -> bool {
    MESSAGES.load(Ordering::SeqCst)
}

/// Set whether diagnostics should be printed. Disabled by default.
pub fn set_messages(yes: bool) {
    MESSAGES.store(yes, Ordering::SeqCst)
}

/// Returns true if and only if the fragment-dropped boundary warning
/// should be suppressed after its first occurrence.
pub fn ignore_boundary_warning() -> bool {
    IGNORE_BOUNDARY_WARNING.load(Ordering::SeqCst)
}

/// Set whether repeat fragment-dropped warnings should be suppressed.
pub fn set_ignore_boundary_warning(yes: bool) {
    IGNORE_BOUNDARY_WARNING.store(yes, Ordering::SeqCst)
}

/// Returns true if and only if the boundary warning has already printed
/// once this run.
pub fn boundary_warning_fired() -> bool {
    BOUNDARY_WARNING_FIRED.load(Ordering::SeqCst)
}

/// Record that the boundary warning has now fired once.
pub fn set_boundary_warning_fired() {
    BOUNDARY_WARNING_FIRED.store(true, Ordering::SeqCst)
}

/// Returns true if and only if a non-fatal error has been encountered.
pub fn errored() -> bool {
    ERRORED.load(Ordering::SeqCst)
}

/// Record that a non-fatal error was encountered.
pub fn set_errored() {
    ERRORED.store(true, Ordering::SeqCst);
}
