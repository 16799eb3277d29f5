//! Checkpoint markers for targets written in Rust
//!
//! A target calls [`checkpoint`] wherever its state should be captured. The
//! call does nothing at run time; the harness stops on entry, reads the tag
//! and inspects a variable in the caller's frame.
//!
//! C and C++ targets use `fixtures/break_here.h`, which defines the same
//! contract.

use std::ffi::c_char;
use std::hint::black_box;

/// Symbol to pass as the marker when the target uses [`checkpoint`].
pub const RUST_MARKER: &str = "checkprobe::marker::checkpoint";

/// Capture point. Never inlined, and `tag` stays materialized in an argument
/// slot so the debugger can read it on entry.
#[inline(never)]
pub fn checkpoint(tag: &str) {
    black_box(tag);
}

/// Unmangled variant with a C signature. The pointer is never dereferenced.
#[no_mangle]
#[inline(never)]
pub extern "C" fn checkprobe_checkpoint(tag: *const c_char) {
    black_box(tag);
}
