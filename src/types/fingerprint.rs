//! Request fingerprints used as cache keys.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A normalized identifier for a request's query text.
///
/// Queries that differ only in surrounding whitespace or letter case map to
/// the same fingerprint.
///
/// Uses `DefaultHasher` (SipHash), which is deterministic within a process
/// lifetime. That is all an in-memory cache needs; do not persist these
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Fingerprint a query's text.
    pub fn of(query: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        query.trim().to_lowercase().hash(&mut hasher);
        Fingerprint(hasher.finish())
    }

    /// Wrap a fingerprint computed elsewhere.
    pub fn from_raw(raw: u64) -> Self {
        Fingerprint(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(
            Fingerprint::of("  What is Furusato Nozei?\n"),
            Fingerprint::of("what is furusato nozei?")
        );
    }

    #[test]
    fn distinct_queries_differ() {
        assert_ne!(Fingerprint::of("医療費控除"), Fingerprint::of("住宅ローン控除"));
    }

    #[test]
    fn display_is_fixed_width_hex() {
        assert_eq!(Fingerprint::from_raw(0xff).to_string(), "00000000000000ff");
    }
}
