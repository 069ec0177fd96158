//! Subspaces: reserved byte prefixes over the tuple layer.

use crate::tuple::{Element, Tuple};
use std::{
    collections::HashMap,
    sync::{LazyLock, Mutex},
};

///
/// Subspace
///
/// Immutable byte prefix plus operations to extend it, pack tuples under
/// it, and yield a `[begin, end)` byte range covering every key below it.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    /// The root subspace: an empty prefix over the whole keyspace.
    #[must_use]
    pub const fn all() -> Self {
        Self { prefix: Vec::new() }
    }

    #[must_use]
    pub const fn from_bytes(prefix: Vec<u8>) -> Self {
        Self { prefix }
    }

    #[must_use]
    pub fn from_tuple(tuple: &Tuple) -> Self {
        Self { prefix: tuple.pack() }
    }

    /// Parse `"a/b/c"` into a three-level subspace, one tuple element per
    /// segment. Results are memoized process-wide; `clear_path_cache`
    /// resets the memo for tests.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        if let Some(hit) = PATH_CACHE
            .lock()
            .expect("path cache poisoned")
            .get(path)
            .cloned()
        {
            return hit;
        }

        let mut tuple = Tuple::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            tuple.push(segment);
        }
        let subspace = Self::from_tuple(&tuple);

        // Losing a race is fine: equal paths produce equal prefixes.
        PATH_CACHE
            .lock()
            .expect("path cache poisoned")
            .insert(path.to_string(), subspace.clone());

        subspace
    }

    /// Extend the prefix by one tuple element.
    #[must_use]
    pub fn subspace(&self, element: impl Into<Element>) -> Self {
        let mut prefix = self.prefix.clone();
        prefix.extend(Tuple::single(element).pack());
        Self { prefix }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.prefix
    }

    /// Pack a tuple under this prefix.
    #[must_use]
    pub fn pack(&self, tuple: &Tuple) -> Vec<u8> {
        let mut out = self.prefix.clone();
        out.extend(tuple.pack());
        out
    }

    /// Strip the prefix and decode the remainder.
    pub fn unpack(&self, key: &[u8]) -> Result<Tuple, crate::error::Error> {
        key.strip_prefix(self.prefix.as_slice()).map_or_else(
            || {
                Err(crate::error::Error::InvalidKey(format!(
                    "key does not start with subspace prefix ({} bytes)",
                    self.prefix.len()
                )))
            },
            Tuple::unpack,
        )
    }

    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    /// `[begin, end)` byte range spanning every key at or below this prefix.
    #[must_use]
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        let begin = self.prefix.clone();
        let mut end = self.prefix.clone();
        end.push(0xff);
        (begin, end)
    }
}

///
/// PATH CACHE
///
/// Process-wide, lock-protected; holds nothing beyond owned strings and
/// prefixes, so it never extends any external lifetime.
///

static PATH_CACHE: LazyLock<Mutex<HashMap<String, Subspace>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Drop all memoized path subspaces (test hook).
pub fn clear_path_cache() {
    PATH_CACHE.lock().expect("path cache poisoned").clear();
}

/// Whether a path is currently memoized (test hook).
#[must_use]
pub fn path_cache_contains(path: &str) -> bool {
    PATH_CACHE
        .lock()
        .expect("path cache poisoned")
        .contains_key(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests that clear the global cache must not interleave; other tests
    // only ever add entries, which these assertions tolerate.
    static CACHE_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn path_subspaces_are_byte_equal_and_cached() {
        let _guard = CACHE_TEST_LOCK.lock().expect("test lock");
        clear_path_cache();
        assert!(!path_cache_contains("a/b/c"));

        let first = Subspace::from_path("a/b/c");
        assert!(path_cache_contains("a/b/c"));

        let second = Subspace::from_path("a/b/c");
        assert_eq!(first.bytes(), second.bytes());
        assert!(path_cache_contains("a/b/c"), "second call must hit the cache");
    }

    #[test]
    fn clear_path_cache_resets_the_memo() {
        let _guard = CACHE_TEST_LOCK.lock().expect("test lock");

        let _ = Subspace::from_path("x/y/z");
        assert!(path_cache_contains("x/y/z"));

        clear_path_cache();
        assert!(!path_cache_contains("x/y/z"));
    }

    #[test]
    fn path_parsing_matches_manual_tuple() {
        let parsed = Subspace::from_path("tenants/acme/players");
        let mut tuple = Tuple::new();
        tuple.push("tenants");
        tuple.push("acme");
        tuple.push("players");

        assert_eq!(parsed.bytes(), Subspace::from_tuple(&tuple).bytes());
    }

    #[test]
    fn range_covers_packed_keys() {
        let subspace = Subspace::all().subspace("scores");
        let key = subspace.pack(&Tuple::single(7i64));
        let (begin, end) = subspace.range();

        assert!(key >= begin && key < end);
        assert!(subspace.contains(&key));
    }

    #[test]
    fn unpack_round_trips_under_prefix() {
        let subspace = Subspace::from_path("x/y");
        let tuple = Tuple::from_elements([Element::Int(-4), Element::String("pk".into())]);
        let key = subspace.pack(&tuple);

        assert_eq!(subspace.unpack(&key).expect("unpack"), tuple);
    }

    #[test]
    fn unpack_rejects_foreign_prefix() {
        let a = Subspace::from_path("a");
        let b = Subspace::from_path("b");
        let key = a.pack(&Tuple::single(1i64));

        assert!(b.unpack(&key).is_err());
    }

    #[test]
    fn nested_subspace_extends_prefix() {
        let root = Subspace::from_path("store");
        let child = root.subspace("records");

        assert!(child.bytes().starts_with(root.bytes()));
        assert!(child.bytes().len() > root.bytes().len());
    }
}
