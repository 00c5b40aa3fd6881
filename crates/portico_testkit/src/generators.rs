//! Property-test strategies and reference implementations.

use portico_model::{Timestamp, Value};
use proptest::prelude::*;

/// Strategy for scalar values of every kind, null included.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e12_f64..1.0e12).prop_map(Value::Float),
        text_strategy().prop_map(Value::Text),
        any::<i64>().prop_map(|ms| Value::Timestamp(Timestamp::from_millis(ms))),
    ]
}

/// Strategy for values as they appear on records: scalars plus flat
/// arrays of scalars.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => scalar_value_strategy(),
        1 => prop::collection::vec(scalar_value_strategy(), 0..4).prop_map(Value::Array),
    ]
}

/// Strategy for short text, including characters outside ASCII.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            prop::char::range('a', 'e'),
            Just('ü'),
            Just('%'),
            Just('_'),
        ],
        0..12,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// Strategy for `like` patterns: literals mixed with `%` and `_`.
///
/// Kept short because the reference matcher backtracks naively.
pub fn pattern_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            3 => prop::char::range('a', 'e'),
            1 => Just('ü'),
            2 => Just('%'),
            1 => Just('_'),
        ],
        0..8,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// Reference `like` matcher: the obvious recursion, exponential in the
/// worst case. The production matcher must agree with it on every input
/// the strategies produce.
#[must_use]
pub fn like_match_reference(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    fn step(pattern: &[char], text: &[char]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some('%') => {
                step(&pattern[1..], text) || (!text.is_empty() && step(pattern, &text[1..]))
            }
            Some('_') => !text.is_empty() && step(&pattern[1..], &text[1..]),
            Some(&literal) => text.first() == Some(&literal) && step(&pattern[1..], &text[1..]),
        }
    }

    let fold = |s: &str| -> Vec<char> {
        if case_insensitive {
            s.chars().flat_map(char::to_lowercase).collect()
        } else {
            s.chars().collect()
        }
    };
    step(&fold(pattern), &fold(text))
}
