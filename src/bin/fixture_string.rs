//! Target program: a string crossing the inline-storage threshold and back.
//!
//! Run it under checkprobe with `--marker checkprobe::marker::checkpoint
//! --variable s`.

use std::hint::black_box;

use checkprobe::marker::checkpoint;

// each value is only observed through the debugger
#[allow(unused_assignments)]
#[inline(never)]
fn test_string() {
    let mut s = String::new();
    checkpoint("empty");

    s = "hello".to_string();
    checkpoint("short");

    s.push_str(", world!");
    checkpoint("short_append");

    s = "this string is long enough to exceed the small buffer optimization limit".to_string();
    checkpoint("long");

    s = "back to short".to_string();
    checkpoint("long_to_short");

    s.clear();
    checkpoint("cleared");

    s = "special chars: \t\n\\\"".to_string();
    checkpoint("special_chars");

    black_box(&s);
}

fn main() {
    test_string();
}
