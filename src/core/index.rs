//! Index contract shared by every index variant and the per-table index set.

use std::{fmt::Debug, hash::Hash, sync::Arc};

/// Structurally immutable typed record held by indexes.
///
/// Changes are expressed by building a new record; the identity returned by
/// [`Record::id`] is what set-shaped indexes use for membership.
pub trait Record: Debug + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + Ord + Debug + Send + Sync;

    fn id(&self) -> Self::Id;
}

/// Extracts one optional key from a record; `None` keeps the record out of the index.
pub type KeyFn<R, K> = Box<dyn Fn(&R) -> Option<K> + Send + Sync>;

/// Mutation side of an index. Lookups are inherent on each variant because
/// their value shapes differ.
///
/// Every method takes `&mut self`, so callers go through the owning table's
/// write guard and a remove-old/insert-new pair is never observed half done.
pub trait Index<R: Record>: Send + Sync {
    fn insert(&mut self, record: &Arc<R>);

    fn delete(&mut self, record: &R);

    /// Drops every entry.
    fn clear(&mut self);

    /// Number of live keys.
    fn key_count(&self) -> usize;

    fn insert_all(&mut self, records: &[Arc<R>]) {
        for record in records {
            self.insert(record);
        }
    }

    fn delete_all(&mut self, records: &[Arc<R>]) {
        for record in records {
            self.delete(record);
        }
    }

    /// Swaps `old` for `new`.
    fn update(&mut self, old: &R, new: &Arc<R>) {
        self.delete(old);
        self.insert(new);
    }

    /// Removes every old record before inserting the new ones.
    fn update_all(&mut self, changes: &[(Arc<R>, Arc<R>)]) {
        for (old, _) in changes {
            self.delete(old);
        }
        for (_, new) in changes {
            self.insert(new);
        }
    }

    /// Replaces the whole content.
    fn reset(&mut self, initial: &[Arc<R>]) {
        self.clear();
        self.insert_all(initial);
    }
}

/// All indexes of one table. The table wraps the set in its single lock.
pub trait IndexSet<R: Record>: Send + Sync {
    fn indexes_mut(&mut self) -> Vec<&mut dyn Index<R>>;

    fn reset(&mut self, records: &[Arc<R>]) {
        for index in self.indexes_mut() {
            index.reset(records);
        }
    }

    fn insert(&mut self, record: &Arc<R>) {
        for index in self.indexes_mut() {
            index.insert(record);
        }
    }

    fn update(&mut self, old: &R, new: &Arc<R>) {
        for index in self.indexes_mut() {
            index.update(old, new);
        }
    }

    fn delete(&mut self, record: &R) {
        for index in self.indexes_mut() {
            index.delete(record);
        }
    }
}
