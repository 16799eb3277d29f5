//! Target program: a vector through a growth and shrink sequence.
//!
//! Run it under checkprobe with `--marker checkprobe::marker::checkpoint
//! --variable v`. Build without optimizations so `v` stays in its frame.

use std::hint::black_box;

use checkprobe::marker::checkpoint;

#[inline(never)]
fn test_vector_int() {
    let mut v: Vec<i32> = Vec::new();
    checkpoint("empty");

    v.push(10);
    checkpoint("push_back_one");

    v.push(20);
    v.push(30);
    checkpoint("push_back_three");

    v.pop();
    checkpoint("after_pop_back");

    v = vec![100, 200, 300, 400, 500];
    checkpoint("after_assign");

    v.reserve(100);
    checkpoint("after_reserve");

    v.shrink_to_fit();
    checkpoint("after_shrink_to_fit");

    // back to zero capacity so the next pushes reallocate
    v.clear();
    v.shrink_to_fit();
    checkpoint("cleared");

    v.push(1);
    v.push(2);
    checkpoint("growing");

    v.push(3);
    v.push(4);
    v.push(5);
    checkpoint("after_realloc");

    black_box(&v);
}

fn main() {
    test_vector_int();
}
