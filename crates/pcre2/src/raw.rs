/*!
The one place in this crate that steps outside the safe `pcre2` crate.

The safe `pcre2::bytes::Regex` API, which the rest of this crate uses for
everything else, has no way to ask for a *partial* match
(`PCRE2_PARTIAL_HARD`) or to introspect a compiled pattern's maximum
lookbehind / minimum match length (`PCRE2_INFO_MAXLOOKBEHIND`,
`PCRE2_INFO_MINLENGTH`). Both are load-bearing for the streaming match
engine: it needs partial-match results to know when to hold more input
before concluding "no match", and it needs the lookbehind/minlength
figures to size its retention window and validate its buffer size at
configuration time.

Rather than guess at the shape of the `pcre2-sys` crate's Rust bindings,
this module declares the small, stable slice of the PCRE2 8-bit C API it
needs directly and links against the same native `libpcre2-8` library
that `pcre2-sys` itself links against. The function names, option flags,
and `PCRE2_INFO_*` identifiers below are the public, documented PCRE2 ABI
as of libpcre2 10.x; see `pcre2.h` if a given library version disagrees.
*/

use std::ffi::c_void;
use std::os::raw::c_int;
use std::ptr;

use crate::error::{Error, ErrorKind};

#[allow(non_camel_case_types)]
enum pcre2_code_8 {}
#[allow(non_camel_case_types)]
enum pcre2_match_data_8 {}
#[allow(non_camel_case_types)]
enum pcre2_compile_context_8 {}
#[allow(non_camel_case_types)]
enum pcre2_general_context_8 {}

#[link(name = "pcre2-8")]
extern "C" {
    fn pcre2_compile_8(
        pattern: *const u8,
        length: usize,
        options: u32,
        errorcode: *mut c_int,
        erroroffset: *mut usize,
        ccontext: *mut pcre2_compile_context_8,
    ) -> *mut pcre2_code_8;

    fn pcre2_code_free_8(code: *mut pcre2_code_8);

    fn pcre2_get_error_message_8(
        errorcode: c_int,
        buffer: *mut u8,
        bufflen: usize,
    ) -> c_int;

    fn pcre2_match_data_create_from_pattern_8(
        code: *const pcre2_code_8,
        gcontext: *mut pcre2_general_context_8,
    ) -> *mut pcre2_match_data_8;

    fn pcre2_match_data_free_8(match_data: *mut pcre2_match_data_8);

    fn pcre2_match_8(
        code: *const pcre2_code_8,
        subject: *const u8,
        length: usize,
        startoffset: usize,
        options: u32,
        match_data: *mut pcre2_match_data_8,
        mcontext: *mut c_void,
    ) -> c_int;

    fn pcre2_get_ovector_pointer_8(
        match_data: *mut pcre2_match_data_8,
    ) -> *mut usize;

    fn pcre2_get_ovector_count_8(match_data: *mut pcre2_match_data_8) -> u32;

    fn pcre2_pattern_info_8(
        code: *const pcre2_code_8,
        what: u32,
        where_: *mut c_void,
    ) -> c_int;
}

// PCRE2 option bits (pcre2.h). Only the ones this crate uses.
pub const CASELESS: u32 = 0x0000_0008;
pub const MULTILINE: u32 = 0x0000_0400;
pub const UTF: u32 = 0x0008_0000;
pub const NO_UTF_CHECK: u32 = 0x4000_0000;
pub const LITERAL: u32 = 0x0200_0000;
pub const PARTIAL_HARD: u32 = 0x0000_0020;
pub const NOTEMPTY_ATSTART: u32 = 0x0000_0008;
pub const ANCHORED: u32 = 0x8000_0000;

// `PCRE2_INFO_*` identifiers, used with `pcre2_pattern_info`.
const INFO_MAXLOOKBEHIND: u32 = 15;
const INFO_MINLENGTH: u32 = 16;
const INFO_NAMECOUNT: u32 = 17;
const INFO_NAMEENTRYSIZE: u32 = 18;
const INFO_NAMETABLE: u32 = 19;

// PCRE2 return codes (pcre2.h).
const ERROR_NOMATCH: c_int = -1;
const ERROR_PARTIAL: c_int = -2;

/// A compiled pattern, owned for the lifetime of this value.
pub struct RawCode {
    ptr: *mut pcre2_code_8,
}

// PCRE2 compiled patterns are read-only after compilation and the PCRE2
// documentation describes them as safe to use concurrently from multiple
// threads as long as each thread uses its own match data block, which is
// exactly how this crate uses them (one `RawMatchData` per `RawCode` user).
unsafe impl Send for RawCode {}
unsafe impl Sync for RawCode {}

impl Drop for RawCode {
    fn drop(&mut self) {
        unsafe { pcre2_code_free_8(self.ptr) }
    }
}

impl RawCode {
    /// Compile `pattern` with the given PCRE2 option bits.
    pub fn compile(pattern: &[u8], options: u32) -> Result<RawCode, Error> {
        let mut errorcode: c_int = 0;
        let mut erroroffset: usize = 0;
        let ptr = unsafe {
            pcre2_compile_8(
                pattern.as_ptr(),
                pattern.len(),
                options,
                &mut errorcode,
                &mut erroroffset,
                ptr::null_mut(),
            )
        };
        if ptr.is_null() {
            return Err(Error::new(ErrorKind::Regex(format!(
                "{} (at offset {})",
                error_message(errorcode),
                erroroffset
            ))));
        }
        Ok(RawCode { ptr })
    }

    /// The pattern's maximum lookbehind, in characters (not bytes).
    pub fn max_lookbehind(&self) -> Result<u32, Error> {
        let mut out: u32 = 0;
        let rc = unsafe {
            pcre2_pattern_info_8(
                self.ptr,
                INFO_MAXLOOKBEHIND,
                &mut out as *mut u32 as *mut c_void,
            )
        };
        if rc != 0 {
            return Err(Error::new(ErrorKind::Introspection(format!(
                "failed to query PCRE2_INFO_MAXLOOKBEHIND: {}",
                error_message(rc)
            ))));
        }
        Ok(out)
    }

    /// A lower bound on the pattern's minimum match length, in characters.
    pub fn min_length(&self) -> Result<u32, Error> {
        let mut out: u32 = 0;
        let rc = unsafe {
            pcre2_pattern_info_8(
                self.ptr,
                INFO_MINLENGTH,
                &mut out as *mut u32 as *mut c_void,
            )
        };
        if rc != 0 {
            return Err(Error::new(ErrorKind::Introspection(format!(
                "failed to query PCRE2_INFO_MINLENGTH: {}",
                error_message(rc)
            ))));
        }
        Ok(out)
    }

    /// This pattern's named capture groups, mapped to their 1-based group
    /// index — the same table the safe `pcre2` crate's
    /// `Regex::capture_names()` exposes, read here directly since
    /// `StreamPattern` otherwise never touches that crate. Backs `$name`
    /// interpolation in `Replace`, the one operator that works against
    /// this crate's raw outer match instead of `crate::Pattern`'s safe
    /// wrapper.
    pub fn capture_names(&self) -> Result<std::collections::HashMap<String, usize>, Error> {
        let mut name_count: u32 = 0;
        let rc = unsafe {
            pcre2_pattern_info_8(
                self.ptr,
                INFO_NAMECOUNT,
                &mut name_count as *mut u32 as *mut c_void,
            )
        };
        if rc != 0 {
            return Err(Error::new(ErrorKind::Introspection(format!(
                "failed to query PCRE2_INFO_NAMECOUNT: {}",
                error_message(rc)
            ))));
        }
        if name_count == 0 {
            return Ok(std::collections::HashMap::new());
        }

        let mut entry_size: u32 = 0;
        let rc = unsafe {
            pcre2_pattern_info_8(
                self.ptr,
                INFO_NAMEENTRYSIZE,
                &mut entry_size as *mut u32 as *mut c_void,
            )
        };
        if rc != 0 {
            return Err(Error::new(ErrorKind::Introspection(format!(
                "failed to query PCRE2_INFO_NAMEENTRYSIZE: {}",
                error_message(rc)
            ))));
        }

        let mut table_ptr: *const u8 = ptr::null();
        let rc = unsafe {
            pcre2_pattern_info_8(
                self.ptr,
                INFO_NAMETABLE,
                &mut table_ptr as *mut *const u8 as *mut c_void,
            )
        };
        if rc != 0 {
            return Err(Error::new(ErrorKind::Introspection(format!(
                "failed to query PCRE2_INFO_NAMETABLE: {}",
                error_message(rc)
            ))));
        }

        // Each entry is `entry_size` bytes: a big-endian u16 group number
        // followed by the NUL-terminated name, padded to fill the entry.
        let entry_size = entry_size as usize;
        let table =
            unsafe { std::slice::from_raw_parts(table_ptr, entry_size * name_count as usize) };
        let mut names = std::collections::HashMap::with_capacity(name_count as usize);
        for entry in table.chunks_exact(entry_size) {
            let index = ((entry[0] as usize) << 8) | entry[1] as usize;
            let name_bytes = &entry[2..];
            let nul = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
            if let Ok(name) = std::str::from_utf8(&name_bytes[..nul]) {
                names.insert(name.to_string(), index);
            }
        }
        Ok(names)
    }
}

/// The reusable scratch space PCRE2 writes match offsets into. One of
/// these is created per compiled pattern and reused across every match
/// call the match engine makes with that pattern.
pub struct RawMatchData {
    ptr: *mut pcre2_match_data_8,
}

impl Drop for RawMatchData {
    fn drop(&mut self) {
        unsafe { pcre2_match_data_free_8(self.ptr) }
    }
}

impl RawMatchData {
    pub fn for_code(code: &RawCode) -> RawMatchData {
        let ptr = unsafe {
            pcre2_match_data_create_from_pattern_8(code.ptr, ptr::null_mut())
        };
        assert!(!ptr.is_null(), "pcre2_match_data_create_from_pattern_8 returned null");
        RawMatchData { ptr }
    }

    /// The raw ovector: pairs of (start, end) byte offsets, one pair per
    /// capture group with index 0 being the whole match. Offsets are
    /// `PCRE2_UNSET` (`usize::MAX`) for groups that didn't participate.
    pub fn ovector(&self) -> &[usize] {
        unsafe {
            let ptr = pcre2_get_ovector_pointer_8(self.ptr);
            let count = pcre2_get_ovector_count_8(self.ptr) as usize;
            std::slice::from_raw_parts(ptr, count * 2)
        }
    }
}

/// The outcome of a single streaming match attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchOutcome {
    /// No match, and no partial match either: this subject cannot possibly
    /// match starting anywhere searched.
    NoMatch,
    /// The subject matched up to the end of the searched region, but more
    /// input could extend or invalidate the match. `begin` is the byte
    /// offset the partial match started at (PCRE2 still fills `ovector[0]`
    /// on a partial-match return).
    Partial {
        /// Offset into `subject` where the partial match began.
        begin: usize,
    },
    /// A complete match, with `usize` capture groups (including the whole
    /// match at index 0).
    Complete(usize),
}

/// Run one match attempt: `code` against `subject[start_offset..]`, but
/// only considering `subject[..effective_end]` as live input (the rest, if
/// any, is treated as not-yet-read for the purposes of lookahead).
///
/// `options` should include [`PARTIAL_HARD`] while more input might still
/// arrive, and [`NOTEMPTY_ATSTART`] to suppress a second zero-width match
/// at the same offset the previous iteration already consumed.
pub fn try_match(
    code: &RawCode,
    match_data: &RawMatchData,
    subject: &[u8],
    effective_end: usize,
    start_offset: usize,
    options: u32,
) -> Result<MatchOutcome, Error> {
    debug_assert!(effective_end <= subject.len());
    debug_assert!(start_offset <= effective_end);
    let rc = unsafe {
        pcre2_match_8(
            code.ptr,
            subject.as_ptr(),
            effective_end,
            start_offset,
            options,
            match_data.ptr,
            ptr::null_mut(),
        )
    };
    if rc == ERROR_NOMATCH {
        return Ok(MatchOutcome::NoMatch);
    }
    if rc == ERROR_PARTIAL {
        let begin = match_data.ovector()[0];
        return Ok(MatchOutcome::Partial { begin });
    }
    if rc < 0 {
        return Err(Error::new(ErrorKind::Match(format!(
            "pcre2_match failed: {}",
            error_message(rc)
        ))));
    }
    // rc == 0 means the ovector was too small to hold every group; the
    // overall match (group 0) is still valid.
    let groups = if rc == 0 { 1 } else { rc as usize };
    let ovector = match_data.ovector();
    if ovector[0] != usize::MAX && ovector[1] != usize::MAX && ovector[0] > ovector[1] {
        return Err(Error::new(ErrorKind::KBeforeMatchEnd));
    }
    Ok(MatchOutcome::Complete(groups))
}

fn error_message(code: c_int) -> String {
    let mut buf = [0u8; 256];
    let len = unsafe {
        pcre2_get_error_message_8(code, buf.as_mut_ptr(), buf.len())
    };
    if len < 0 {
        return format!("PCRE2 error {}", code);
    }
    String::from_utf8_lossy(&buf[..len as usize]).into_owned()
}
