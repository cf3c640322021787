//! Scope index: weakly-held scopes mapped to the entries activated in them.
//!
//! Every `take_*` method moves entries out of the index; the caller deactivates
//! them after releasing the cache lock. An instance may be cached under several
//! keys or scopes, so the index counts its entries and hands it out for
//! deactivation only when the last one leaves.

use std::collections::HashMap;

use super::entry::InstanceEntry;
use crate::context::DeactivationReason;
use crate::instance::ObjectId;
use crate::key::{Binding, GenericArgument};
use crate::scope::{ScopeRef, SubscriptionId, WeakScope};

/// Entries belonging to one scope object.
pub(crate) struct ScopeRecord {
    scope: WeakScope,
    generation: u64,
    subscription: Option<SubscriptionId>,
    entries: Vec<InstanceEntry>,
}

impl ScopeRecord {
    fn detach(self, reason: DeactivationReason, removal: &mut Removal) {
        removal.scopes.push(DetachedScope {
            scope: self.scope,
            subscription: self.subscription,
        });
        removal
            .entries
            .extend(self.entries.into_iter().map(|entry| (entry, reason)));
    }
}

/// A scope record that left the index, kept only to drop its subscription.
pub(crate) struct DetachedScope {
    scope: WeakScope,
    subscription: Option<SubscriptionId>,
}

impl DetachedScope {
    /// Unsubscribes from the scope's disposal notifications, if still alive.
    pub(crate) fn unsubscribe(self) {
        if let (Some(id), Some(notifier)) = (self.subscription, self.scope.notifier()) {
            notifier.unsubscribe(id);
        }
    }
}

/// Everything one operation took out of the index.
#[derive(Default)]
pub(crate) struct Removal {
    /// Instances that left the index for good, one entry each
    pub(crate) entries: Vec<(InstanceEntry, DeactivationReason)>,
    pub(crate) scopes: Vec<DetachedScope>,
    /// Entries removed, including those of instances still cached elsewhere
    pub(crate) removed: usize,
}

impl Removal {
    pub(crate) fn is_empty(&self) -> bool {
        self.removed == 0
    }
}

/// Result of inserting an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Inserted {
    /// Stored in the scope-less area
    Scopeless,
    /// Stored under an existing scope record
    Existing,
    /// Stored under a record created for this insert
    NewScope { generation: u64 },
}

#[derive(Default)]
pub(crate) struct ScopeIndex {
    records: HashMap<ObjectId, ScopeRecord>,
    scopeless: Vec<InstanceEntry>,
    /// Entry count per cached instance
    instances: HashMap<ObjectId, usize>,
    next_generation: u64,
    len: usize,
}

impl ScopeIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of tracked entries, scope-less ones included.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Number of scope records.
    pub(crate) fn scope_count(&self) -> usize {
        self.records.len()
    }

    /// First entry under `scope` matching the key. Scope-less entries are
    /// never found.
    pub(crate) fn find(
        &self,
        scope: ObjectId,
        binding: &Binding,
        generic_arguments: Option<&[GenericArgument]>,
    ) -> Option<&InstanceEntry> {
        self.records
            .get(&scope)?
            .entries
            .iter()
            .find(|entry| entry.matches(binding, generic_arguments))
    }

    pub(crate) fn insert(&mut self, scope: Option<&ScopeRef>, entry: InstanceEntry) -> Inserted {
        self.len += 1;
        *self.instances.entry(entry.id()).or_insert(0) += 1;
        let Some(scope) = scope else {
            self.scopeless.push(entry);
            return Inserted::Scopeless;
        };

        if let Some(record) = self.records.get_mut(&scope.id()) {
            record.entries.push(entry);
            return Inserted::Existing;
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.records.insert(
            scope.id(),
            ScopeRecord {
                scope: scope.downgrade(),
                generation,
                subscription: None,
                entries: vec![entry],
            },
        );
        Inserted::NewScope { generation }
    }

    /// Stores the disposal subscription of a record. Returns `false` when the
    /// record is gone (or was replaced), in which case the caller must drop
    /// the subscription itself.
    pub(crate) fn attach_subscription(
        &mut self,
        scope: ObjectId,
        generation: u64,
        subscription: SubscriptionId,
    ) -> bool {
        match self.records.get_mut(&scope) {
            Some(record) if record.generation == generation => {
                record.subscription = Some(subscription);
                true
            }
            _ => false,
        }
    }

    /// Takes every entry for `instance`, wherever it is cached.
    pub(crate) fn take_instance(&mut self, instance: ObjectId) -> Removal {
        let mut removal = Removal::default();

        let mut emptied = Vec::new();
        for (id, record) in self.records.iter_mut() {
            take_matching(&mut record.entries, instance, &mut removal);
            if record.entries.is_empty() {
                emptied.push(*id);
            }
        }
        for id in emptied {
            if let Some(record) = self.records.remove(&id) {
                record.detach(DeactivationReason::Released, &mut removal);
            }
        }
        take_matching(&mut self.scopeless, instance, &mut removal);
        self.settle(removal)
    }

    /// Takes the record of `scope`. With `generation` set, only that
    /// incarnation of the record is taken.
    pub(crate) fn take_scope(
        &mut self,
        scope: ObjectId,
        generation: Option<u64>,
        reason: DeactivationReason,
    ) -> Removal {
        let mut removal = Removal::default();
        let current = self.records.get(&scope).map(|record| record.generation);
        if current.is_some() && (generation.is_none() || generation == current) {
            if let Some(record) = self.records.remove(&scope) {
                record.detach(reason, &mut removal);
            }
        }
        self.settle(removal)
    }

    /// Takes every record whose scope is no longer alive. Returns the removal
    /// and the number of dead scopes found.
    pub(crate) fn take_dead(&mut self) -> (Removal, usize) {
        let dead: Vec<ObjectId> = self
            .records
            .iter()
            .filter(|(_, record)| !record.scope.is_alive())
            .map(|(id, _)| *id)
            .collect();

        let mut removal = Removal::default();
        for id in &dead {
            if let Some(record) = self.records.remove(id) {
                record.detach(DeactivationReason::Pruned, &mut removal);
            }
        }
        (self.settle(removal), dead.len())
    }

    /// Takes everything.
    pub(crate) fn take_all(&mut self, reason: DeactivationReason) -> Removal {
        let mut removal = Removal::default();
        for (_, record) in self.records.drain() {
            record.detach(reason, &mut removal);
        }
        removal
            .entries
            .extend(self.scopeless.drain(..).map(|entry| (entry, reason)));
        self.settle(removal)
    }

    /// Drops the counts of everything in `removal` and keeps, in order, only
    /// the entries whose instance left the index. Such an instance takes its
    /// own scope's entries with it when it is itself a scope.
    fn settle(&mut self, mut removal: Removal) -> Removal {
        let mut taken = std::mem::take(&mut removal.entries);
        let mut last = Vec::with_capacity(taken.len());
        let mut next = 0;
        while next < taken.len() {
            let id = taken[next].0.id();
            let gone = self.forget_entry(id);
            if gone {
                if let Some(record) = self.records.remove(&id) {
                    let mut cascaded = Removal::default();
                    record.detach(DeactivationReason::Cascaded, &mut cascaded);
                    taken.extend(cascaded.entries);
                    removal.scopes.extend(cascaded.scopes);
                }
            }
            last.push(gone);
            next += 1;
        }

        self.len -= taken.len();
        removal.removed += taken.len();
        removal.entries = taken
            .into_iter()
            .zip(last)
            .filter_map(|(entry, gone)| gone.then_some(entry))
            .collect();
        removal
    }

    /// Drops one entry from the count of `instance`. Returns `true` when it
    /// was the last.
    fn forget_entry(&mut self, instance: ObjectId) -> bool {
        match self.instances.get_mut(&instance) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            _ => {
                self.instances.remove(&instance);
                true
            }
        }
    }
}

fn take_matching(entries: &mut Vec<InstanceEntry>, instance: ObjectId, removal: &mut Removal) {
    if !entries.iter().any(|entry| entry.id() == instance) {
        return;
    }
    let (taken, kept): (Vec<_>, Vec<_>) = entries
        .drain(..)
        .partition(|entry| entry.id() == instance);
    *entries = kept;
    removal
        .entries
        .extend(taken.into_iter().map(|entry| (entry, DeactivationReason::Released)));
}
