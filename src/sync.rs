//! Apply-then-reconcile-or-rollback for low-risk list mutations.
//!
//! A pending entry is keyed by a placeholder id minted at `apply` time, never
//! by position, so interleaved mutations cannot corrupt each other. Refreshes
//! are generation-checked: a refetch that started before the latest mutation
//! completed is stale and must not resurrect a rolled-back entry.

/// Locally minted key for a pending entry, never a server-issued id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaceholderId(u64);

/// Proof that a pending entry exists; consumed exactly once by `commit` or
/// `rollback`.
#[derive(Debug)]
#[must_use = "a pending entry must be committed or rolled back"]
pub struct PendingHandle {
    key: PlaceholderId,
}

impl PendingHandle {
    pub fn key(&self) -> PlaceholderId {
        self.key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry<T, P> {
    Confirmed(T),
    Pending { key: PlaceholderId, draft: P },
}

impl<T, P> Entry<T, P> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Entry::Pending { .. })
    }
}

/// Snapshot of the mutation generation at the moment a refetch was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshToken {
    generation: u64,
}

pub struct OptimisticList<T, P> {
    entries: Vec<Entry<T, P>>,
    next_key: u64,
    generation: u64,
}

impl<T, P> Default for OptimisticList<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P> OptimisticList<T, P> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_key: 0,
            generation: 0,
        }
    }

    pub fn from_confirmed(confirmed: Vec<T>) -> Self {
        let mut list = Self::new();
        list.entries = confirmed.into_iter().map(Entry::Confirmed).collect();
        list
    }

    pub fn apply(&mut self, draft: P) -> PendingHandle {
        let key = PlaceholderId(self.next_key);
        self.next_key += 1;
        self.entries.push(Entry::Pending { key, draft });
        PendingHandle { key }
    }

    /// Replace the pending entry with the confirmed value, in place.
    pub fn commit(&mut self, handle: PendingHandle, confirmed: T) {
        let position = self.position_of(handle.key);
        self.entries[position] = Entry::Confirmed(confirmed);
        self.generation += 1;
    }

    /// Remove exactly the entry the handle was minted for.
    pub fn rollback(&mut self, handle: PendingHandle) {
        let position = self.position_of(handle.key);
        self.entries.remove(position);
        self.generation += 1;
    }

    pub fn begin_refresh(&self) -> RefreshToken {
        RefreshToken {
            generation: self.generation,
        }
    }

    /// Replace the confirmed entries with server truth. Pending entries from
    /// still-in-flight mutations are retained after the confirmed ones.
    /// Returns false (and changes nothing) when a mutation completed after
    /// the refetch was issued.
    pub fn apply_refresh(&mut self, token: RefreshToken, confirmed: Vec<T>) -> bool {
        if token.generation != self.generation {
            return false;
        }
        let pending: Vec<Entry<T, P>> = std::mem::take(&mut self.entries)
            .into_iter()
            .filter(Entry::is_pending)
            .collect();
        self.entries = confirmed.into_iter().map(Entry::Confirmed).collect();
        self.entries.extend(pending);
        true
    }

    /// Drop confirmed entries the server no longer knows about. Counts as a
    /// mutation for staleness purposes.
    pub fn retain_confirmed<F>(&mut self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.entries.retain(|entry| match entry {
            Entry::Confirmed(value) => keep(value),
            Entry::Pending { .. } => true,
        });
        self.generation += 1;
    }

    pub fn entries(&self) -> &[Entry<T, P>] {
        &self.entries
    }

    pub fn confirmed(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Confirmed(value) => Some(value),
            Entry::Pending { .. } => None,
        })
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position_of(&self, key: PlaceholderId) -> usize {
        self.entries
            .iter()
            .position(|entry| matches!(entry, Entry::Pending { key: k, .. } if *k == key))
            .expect("pending handle outlived its entry")
    }
}
