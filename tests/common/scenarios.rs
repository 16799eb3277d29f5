use std::path::PathBuf;

use checkprobe::controller::InspectionPlan;
use checkprobe::debugger::mock::{ScriptBuilder, ScriptConfig};
use checkprobe::debugger::{FormatterSource, TargetSpec};

pub const MARKER: &str = "BREAK_HERE";

pub const VECTOR_TAGS: [&str; 10] = [
    "empty",
    "push_back_one",
    "push_back_three",
    "after_pop_back",
    "after_assign",
    "after_reserve",
    "after_shrink_to_fit",
    "cleared",
    "growing",
    "after_realloc",
];

pub const STRING_TAGS: [&str; 7] = [
    "empty",
    "short",
    "short_append",
    "long",
    "long_to_short",
    "cleared",
    "special_chars",
];

pub fn plan(variable: &str) -> InspectionPlan {
    InspectionPlan {
        target: TargetSpec::Launch {
            path: PathBuf::from("/tmp/test_binary"),
            args: vec![],
        },
        formatter: FormatterSource::Builtin,
        marker: MARKER.to_string(),
        variable: variable.to_string(),
        frame_depth: 1,
    }
}

/// What a vector printer reports at each step of the growth sequence
pub fn vector_script() -> ScriptBuilder {
    let values = [
        "std::vector of length 0, capacity 0",
        "std::vector of length 1, capacity 1 = {10}",
        "std::vector of length 3, capacity 4 = {10, 20, 30}",
        "std::vector of length 2, capacity 4 = {10, 20}",
        "std::vector of length 5, capacity 5 = {100, 200, 300, 400, 500}",
        "std::vector of length 5, capacity 100 = {100, 200, 300, 400, 500}",
        "std::vector of length 5, capacity 5 = {100, 200, 300, 400, 500}",
        "std::vector of length 0, capacity 0",
        "std::vector of length 2, capacity 2 = {1, 2}",
        "std::vector of length 5, capacity 8 = {1, 2, 3, 4, 5}",
    ];
    VECTOR_TAGS
        .iter()
        .zip(values)
        .fold(ScriptBuilder::new("test_vector_int"), |script, (tag, value)| {
            script.checkpoint(tag, "v", value)
        })
}

/// String printer output, reporting inline or heap storage
pub fn string_script() -> ScriptConfig {
    ScriptBuilder::new("test_string")
        .checkpoint("empty", "s", "\"\" (inline, size 0)")
        .checkpoint("short", "s", "\"hello\" (inline, size 5)")
        .checkpoint("short_append", "s", "\"hello, world!\" (inline, size 13)")
        .checkpoint(
            "long",
            "s",
            "\"this string is long enough to exceed the small buffer optimization limit\" (heap, size 72)",
        )
        .checkpoint("long_to_short", "s", "\"back to short\" (inline, size 13)")
        .checkpoint("cleared", "s", "\"\" (inline, size 0)")
        .checkpoint("special_chars", "s", "\"special chars: \\t\\n\\\\\\\"\" (inline, size 20)")
        .build()
}
