//! Dotted version-string comparison
//!
//! Dependency lists mix ticket ids with base-version strings like "4.8.2".
//! Ordering is segment-wise: numeric segments compare numerically, anything
//! else falls back to lexical, and a version that is a strict prefix of
//! another sorts older.

use std::cmp::Ordering;

pub fn compare(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(m), Ok(n)) => m.cmp(&n),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// True when `required` is a strictly newer version than `base`.
pub fn is_newer_than(required: &str, base: &str) -> bool {
    compare(base, required) == Ordering::Less
}
