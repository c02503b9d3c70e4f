// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template registry: keyed store of enrolled signatures, one per modality.
//
// Matchers only talk to the `TemplateStore` trait, so a persistent backend
// can replace `InMemoryStore` without touching scoring code.

use std::collections::HashMap;

use kioskid_core::WorkerId;

/// Storage interface used by the matchers.
///
/// Keys are unique. Storing under an existing key replaces the signature in
/// place, so iteration order stays the order of each worker's *first*
/// enrollment.
pub trait TemplateStore<T> {
    /// Insert or replace the signature for `worker_id`.
    fn store(&mut self, worker_id: WorkerId, signature: T);

    fn lookup(&self, worker_id: &WorkerId) -> Option<&T>;

    fn remove(&mut self, worker_id: &WorkerId) -> Option<T>;

    /// Drop every entry.
    fn clear(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, worker_id: &WorkerId) -> bool {
        self.lookup(worker_id).is_some()
    }

    /// All `(worker_id, signature)` pairs in insertion order.
    fn entries<'a>(&'a self) -> impl Iterator<Item = (&'a WorkerId, &'a T)>
    where
        T: 'a;
}

/// Insertion-ordered in-memory store. Lives for the process lifetime only.
#[derive(Debug, Clone)]
pub struct InMemoryStore<T> {
    entries: Vec<(WorkerId, T)>,
    index: HashMap<WorkerId, usize>,
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> InMemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> TemplateStore<T> for InMemoryStore<T> {
    fn store(&mut self, worker_id: WorkerId, signature: T) {
        match self.index.get(&worker_id) {
            Some(&pos) => self.entries[pos].1 = signature,
            None => {
                self.index.insert(worker_id.clone(), self.entries.len());
                self.entries.push((worker_id, signature));
            }
        }
    }

    fn lookup(&self, worker_id: &WorkerId) -> Option<&T> {
        self.index.get(worker_id).map(|&pos| &self.entries[pos].1)
    }

    fn remove(&mut self, worker_id: &WorkerId) -> Option<T> {
        let pos = self.index.remove(worker_id)?;
        let (_, signature) = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(signature)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entries<'a>(&'a self) -> impl Iterator<Item = (&'a WorkerId, &'a T)>
    where
        T: 'a,
    {
        self.entries.iter().map(|(id, signature)| (id, signature))
    }
}
