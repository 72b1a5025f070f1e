use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Concurrent claim set for folder (or item) ids.
///
/// The first `claim` of an id wins; later claims only bump its seen-count.
#[derive(Debug, Default)]
pub struct VisitedRegistry {
    seen: DashMap<String, u64>,
}

impl VisitedRegistry {
    pub fn new() -> Self {
        Self {
            seen: DashMap::new(),
        }
    }

    /// Returns `true` for the single caller allowed to process `id`.
    pub fn claim(&self, id: &str) -> bool {
        match self.seen.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() += 1;
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(0);
                true
            }
        }
    }

    /// Number of rejected claims for `id`, `None` if it was never claimed.
    pub fn seen_count(&self, id: &str) -> Option<u64> {
        self.seen.get(id).map(|count| *count)
    }

    /// Sum of rejected claims over all ids.
    pub fn duplicate_references(&self) -> u64 {
        self.seen.iter().map(|entry| *entry.value()).sum()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
