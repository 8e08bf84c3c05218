//! Natural ("human") ordering of version names.
//!
//! A key is split into alternating runs of non-digits and digits. Digit runs
//! compare as numbers and text runs compare lexically, so `v10.0` sorts after
//! `v2.0` instead of between `v1.0` and `v2.0`.

use std::cmp::{Ordering, Reverse};

/// One run of a natural sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Number(u128),
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Number(a), Segment::Number(b)) => a.cmp(b),
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            // Runs alternate text/number in every key, so a mixed pair only
            // comes from a digit run too long for u128 (see `number`).
            (Segment::Number(_), Segment::Text(_)) => Ordering::Less,
            (Segment::Text(_), Segment::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Split `key` into its natural sort segments.
///
/// The result always starts with a (possibly empty) text run and then
/// alternates, e.g. `v1.10` becomes `["v", 1, ".", 10]`.
pub fn natural_key(key: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut digits = String::new();

    for ch in key.chars() {
        if ch.is_ascii_digit() {
            if digits.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            digits.push(ch);
        } else {
            if !digits.is_empty() {
                segments.push(number(&std::mem::take(&mut digits)));
            }
            text.push(ch);
        }
    }

    if !digits.is_empty() {
        segments.push(number(&digits));
    } else if !text.is_empty() || segments.is_empty() {
        segments.push(Segment::Text(text));
    }

    segments
}

fn number(digits: &str) -> Segment {
    // Runs too long for u128 are kept as text without leading zeros; they
    // still sort above every parsed number.
    digits
        .parse::<u128>()
        .map(Segment::Number)
        .unwrap_or_else(|_| Segment::Text(digits.trim_start_matches('0').to_string()))
}

/// Ascending natural comparison of two keys.
pub fn compare(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

/// Sort `items` by the natural order of `key`, most recent (largest) first.
///
/// The sort is stable: items with identical keys keep their input order.
pub fn sort_descending_by_key<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> String,
{
    items.sort_by_cached_key(|item| Reverse(natural_key(&key(item))));
}
