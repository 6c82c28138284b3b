use std::collections::HashMap;

use super::code::{ErrorCode, NOT_KNOWN_ERROR_NAME};
use super::counters::CategoryCounters;

/// Fixed set of counted error codes, built once at startup.
///
/// Every lookup resolves to an entry: codes outside the catalogue map to
/// the reserved fallback entry, which is registered last.
pub struct CategoryRegistry {
    entries: Vec<CategoryCounters>,
    by_code: HashMap<ErrorCode, usize>,
    fallback: usize,
}

/// Result of resolving a code against the registry.
pub struct Lookup<'a> {
    pub entry: &'a CategoryCounters,
    /// False when the code was not registered and the fallback was used.
    pub known: bool,
}

impl CategoryRegistry {
    /// Build the registry from `(code, name)` pairs plus the fallback entry.
    ///
    /// Duplicate codes keep their first registration. A pair using the
    /// reserved fallback code is ignored.
    pub fn new(codes: &[(ErrorCode, &'static str)], ring_len: usize) -> Self {
        let mut entries = Vec::with_capacity(codes.len() + 1);
        let mut by_code = HashMap::with_capacity(codes.len() + 1);

        for (code, name) in codes {
            if *code == ErrorCode::NOT_KNOWN || by_code.contains_key(code) {
                continue;
            }
            by_code.insert(*code, entries.len());
            entries.push(CategoryCounters::new(*code, *name, ring_len));
        }

        let fallback = entries.len();
        by_code.insert(ErrorCode::NOT_KNOWN, fallback);
        entries.push(CategoryCounters::new(
            ErrorCode::NOT_KNOWN,
            NOT_KNOWN_ERROR_NAME,
            ring_len,
        ));

        Self {
            entries,
            by_code,
            fallback,
        }
    }

    /// Resolve a code, falling back to the reserved entry.
    #[inline]
    pub fn lookup(&self, code: ErrorCode) -> Lookup<'_> {
        match self.by_code.get(&code) {
            Some(&idx) => Lookup {
                entry: &self.entries[idx],
                known: code != ErrorCode::NOT_KNOWN,
            },
            None => Lookup {
                entry: &self.entries[self.fallback],
                known: false,
            },
        }
    }

    /// The reserved entry for unregistered codes.
    pub fn fallback(&self) -> &CategoryCounters {
        &self.entries[self.fallback]
    }

    /// All entries in registration order, fallback last.
    pub fn entries(&self) -> &[CategoryCounters] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
