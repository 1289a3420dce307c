//! ID prefix resolution.
//!
//! Agents and humans address tasks and messages by a leading slice of their
//! ID. Every lookup goes through [`resolve_prefix`] so that NotFound and
//! Ambiguous are reported the same way everywhere.

use crate::{Error, Result};

/// Shortest prefix accepted when addressing an entity.
pub const MIN_PREFIX_LEN: usize = 8;

/// Outcome of matching a prefix against a set of IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixMatch {
    /// Exactly one entry matched; carries its index.
    Unique(usize),
    None,
    /// More than one entry matched; carries the match count.
    Multiple(usize),
}

/// Match `prefix` against the IDs of `items`.
///
/// An exact ID match wins over longer IDs sharing the same prefix.
pub fn match_prefix<'a, I>(prefix: &str, ids: I) -> PrefixMatch
where
    I: IntoIterator<Item = &'a str>,
{
    let mut first = None;
    let mut count = 0;
    for (index, id) in ids.into_iter().enumerate() {
        if id == prefix {
            return PrefixMatch::Unique(index);
        }
        if id.starts_with(prefix) {
            count += 1;
            first.get_or_insert(index);
        }
    }
    match (count, first) {
        (1, Some(index)) => PrefixMatch::Unique(index),
        (0, _) => PrefixMatch::None,
        _ => PrefixMatch::Multiple(count),
    }
}

/// Resolve `prefix` to the index of a single entry, or fail with the
/// appropriate error. `what` names the entity in error messages.
pub fn resolve_prefix<'a, I>(prefix: &str, ids: I, what: &str) -> Result<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = prefix.trim();
    if prefix.len() < MIN_PREFIX_LEN {
        return Err(Error::Validation(format!(
            "{} ID prefix must be at least {} characters, got {}: '{}'",
            what,
            MIN_PREFIX_LEN,
            prefix.len(),
            prefix
        )));
    }

    match match_prefix(prefix, ids) {
        PrefixMatch::Unique(index) => Ok(index),
        PrefixMatch::None => Err(Error::NotFound(format!("{} not found: {}", what, prefix))),
        PrefixMatch::Multiple(count) => Err(Error::Ambiguous {
            prefix: prefix.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDS: [&str; 3] = [
        "aaaa1111bbbb2222cccc3333dddd4444",
        "aaaa1111ffff0000cccc3333dddd4444",
        "12345678abcdef0012345678abcdef00",
    ];

    #[test]
    fn test_match_unique() {
        assert_eq!(match_prefix("12345678", IDS), PrefixMatch::Unique(2));
        assert_eq!(match_prefix("aaaa1111b", IDS), PrefixMatch::Unique(0));
    }

    #[test]
    fn test_match_none() {
        assert_eq!(match_prefix("ffffffff", IDS), PrefixMatch::None);
    }

    #[test]
    fn test_match_multiple() {
        assert_eq!(match_prefix("aaaa1111", IDS), PrefixMatch::Multiple(2));
    }

    #[test]
    fn test_exact_match_wins() {
        let ids = ["abcdefgh", "abcdefghij"];
        assert_eq!(match_prefix("abcdefgh", ids), PrefixMatch::Unique(0));
    }

    #[test]
    fn test_resolve_rejects_short_prefix() {
        let err = resolve_prefix("1234567", IDS, "Task").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_resolve_maps_errors() {
        assert!(matches!(
            resolve_prefix("ffffffff", IDS, "Task"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            resolve_prefix("aaaa1111", IDS, "Task"),
            Err(Error::Ambiguous { count: 2, .. })
        ));
        assert_eq!(resolve_prefix("12345678", IDS, "Task").unwrap(), 2);
    }
}
