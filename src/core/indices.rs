//! The four index variants: unique, bucket, sorted bucket and prefix search.

use std::{borrow::Borrow, collections::BTreeMap, hash::Hash, sync::Arc};

use hashbrown::HashMap;

use super::index::{Index, KeyFn, Record};

type Members<R> = BTreeMap<<R as Record>::Id, Arc<R>>;

/// One record per key; a later insert for the same key overwrites.
pub struct UniqueIndex<R: Record, K> {
    keys: Vec<KeyFn<R, K>>,
    data: HashMap<K, Arc<R>>,
}

impl<R, K> UniqueIndex<R, K>
where
    R: Record,
    K: Eq + Hash + Clone + Send + Sync,
{
    pub fn new(key: impl Fn(&R) -> Option<K> + Send + Sync + 'static) -> Self {
        Self::with_keys(vec![Box::new(key)])
    }

    pub fn with_keys(keys: Vec<KeyFn<R, K>>) -> Self {
        Self {
            keys,
            data: HashMap::new(),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<Arc<R>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.get(key).cloned()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.contains_key(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<R>> {
        self.data.values()
    }

    /// Copy of the underlying map.
    pub fn raw(&self) -> HashMap<K, Arc<R>> {
        self.data.clone()
    }
}

impl<R, K> Index<R> for UniqueIndex<R, K>
where
    R: Record,
    K: Eq + Hash + Clone + Send + Sync,
{
    fn insert(&mut self, record: &Arc<R>) {
        for key_fn in &self.keys {
            if let Some(key) = key_fn(record) {
                self.data.insert(key, Arc::clone(record));
            }
        }
    }

    fn delete(&mut self, record: &R) {
        let id = record.id();
        for key_fn in &self.keys {
            let Some(key) = key_fn(record) else {
                continue;
            };
            // The key may already belong to a newer record.
            if self.data.get(&key).is_some_and(|held| held.id() == id) {
                self.data.remove(&key);
            }
        }
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn key_count(&self) -> usize {
        self.data.len()
    }
}

/// Unordered set of records per key.
pub struct BucketIndex<R: Record, K> {
    keys: Vec<KeyFn<R, K>>,
    data: HashMap<K, Members<R>>,
}

impl<R, K> BucketIndex<R, K>
where
    R: Record,
    K: Eq + Hash + Clone + Send + Sync,
{
    pub fn new(key: impl Fn(&R) -> Option<K> + Send + Sync + 'static) -> Self {
        Self::with_keys(vec![Box::new(key)])
    }

    pub fn with_keys(keys: Vec<KeyFn<R, K>>) -> Self {
        Self {
            keys,
            data: HashMap::new(),
        }
    }

    /// Members of a bucket in identity order.
    pub fn get<Q>(&self, key: &Q) -> Option<Vec<Arc<R>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.get(key).map(|m| m.values().cloned().collect())
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.contains_key(key)
    }

    pub fn raw(&self) -> HashMap<K, Vec<Arc<R>>> {
        self.data
            .iter()
            .map(|(k, m)| (k.clone(), m.values().cloned().collect()))
            .collect()
    }
}

impl<R, K> Index<R> for BucketIndex<R, K>
where
    R: Record,
    K: Eq + Hash + Clone + Send + Sync,
{
    fn insert(&mut self, record: &Arc<R>) {
        for key_fn in &self.keys {
            if let Some(key) = key_fn(record) {
                self.data
                    .entry(key)
                    .or_default()
                    .insert(record.id(), Arc::clone(record));
            }
        }
    }

    fn delete(&mut self, record: &R) {
        let id = record.id();
        for key_fn in &self.keys {
            let Some(key) = key_fn(record) else {
                continue;
            };
            if let Some(members) = self.data.get_mut(&key) {
                members.remove(&id);
                if members.is_empty() {
                    self.data.remove(&key);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn key_count(&self) -> usize {
        self.data.len()
    }
}

/// Ordered list of records per key, kept sorted by a caller-supplied key.
///
/// Several key functions may map one record into several buckets, e.g. a
/// match filed under both of its players. Equal sort keys keep insertion order.
pub struct SortedBucketIndex<R: Record, K, S> {
    keys: Vec<KeyFn<R, K>>,
    sorter: Box<dyn Fn(&R) -> S + Send + Sync>,
    data: HashMap<K, Vec<Arc<R>>>,
}

impl<R, K, S> SortedBucketIndex<R, K, S>
where
    R: Record,
    K: Eq + Hash + Clone + Send + Sync,
    S: Ord,
{
    pub fn new(
        key: impl Fn(&R) -> Option<K> + Send + Sync + 'static,
        sorter: impl Fn(&R) -> S + Send + Sync + 'static,
    ) -> Self {
        Self::with_keys(vec![Box::new(key)], sorter)
    }

    pub fn with_keys(keys: Vec<KeyFn<R, K>>, sorter: impl Fn(&R) -> S + Send + Sync + 'static) -> Self {
        Self {
            keys,
            sorter: Box::new(sorter),
            data: HashMap::new(),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<Vec<Arc<R>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.get(key).cloned()
    }

    /// Borrowed view of a bucket.
    pub fn get_ref<Q>(&self, key: &Q) -> Option<&[Arc<R>]>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.get(key).map(Vec::as_slice)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.data.keys()
    }

    pub fn raw(&self) -> HashMap<K, Vec<Arc<R>>> {
        self.data.clone()
    }

    fn insert_into(&mut self, key: K, record: &Arc<R>) {
        let id = record.id();
        let bucket = self.data.entry(key).or_default();
        if bucket.iter().any(|m| m.id() == id) {
            return;
        }
        let order = (self.sorter)(record);
        let at = bucket.partition_point(|m| (self.sorter)(m) <= order);
        bucket.insert(at, Arc::clone(record));
    }
}

impl<R, K, S> Index<R> for SortedBucketIndex<R, K, S>
where
    R: Record,
    K: Eq + Hash + Clone + Send + Sync,
    S: Ord,
{
    fn insert(&mut self, record: &Arc<R>) {
        let keys: Vec<K> = self.keys.iter().filter_map(|key_fn| key_fn(record)).collect();
        for key in keys {
            self.insert_into(key, record);
        }
    }

    fn delete(&mut self, record: &R) {
        let id = record.id();
        for key_fn in &self.keys {
            let Some(key) = key_fn(record) else {
                continue;
            };
            if let Some(bucket) = self.data.get_mut(&key) {
                bucket.retain(|m| m.id() != id);
                if bucket.is_empty() {
                    self.data.remove(&key);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn key_count(&self) -> usize {
        self.data.len()
    }
}

/// Substring search over lowercase keys, e.g. `alex` finds Alexandru and Alexandra.
///
/// After every bulk mutation each key also absorbs the members of every
/// longer key it prefixes. Lookups try an exact key first and fall back to
/// scanning every key containing the query.
pub struct PrefixSearchIndex<R: Record> {
    keys: Box<dyn Fn(&R) -> Vec<String> + Send + Sync>,
    unique: BTreeMap<String, Members<R>>,
    data: HashMap<String, Members<R>>,
}

impl<R: Record> PrefixSearchIndex<R> {
    pub fn new(keys: impl Fn(&R) -> Vec<String> + Send + Sync + 'static) -> Self {
        Self {
            keys: Box::new(keys),
            unique: BTreeMap::new(),
            data: HashMap::new(),
        }
    }

    pub fn get(&self, query: &str) -> Option<Vec<Arc<R>>> {
        if let Some(members) = self.data.get(query).filter(|m| !m.is_empty()) {
            return Some(members.values().cloned().collect());
        }

        let mut found: Members<R> = BTreeMap::new();
        for (key, members) in &self.data {
            if key.contains(query) {
                found.extend(members.iter().map(|(id, r)| (id.clone(), Arc::clone(r))));
            }
        }
        (!found.is_empty()).then(|| found.into_values().collect())
    }

    /// Live keys after merging, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn add(&mut self, record: &Arc<R>) {
        for key in (self.keys)(record).into_iter().filter(|k| !k.is_empty()) {
            self.unique
                .entry(key)
                .or_default()
                .insert(record.id(), Arc::clone(record));
        }
    }

    fn remove(&mut self, record: &R) {
        let id = record.id();
        for key in (self.keys)(record) {
            if let Some(members) = self.unique.get_mut(&key) {
                members.remove(&id);
                if members.is_empty() {
                    self.unique.remove(&key);
                }
            }
        }
    }

    fn merge_search_prefixes(&mut self) {
        let mut data: HashMap<String, Members<R>> = HashMap::with_capacity(self.unique.len());
        // Chain of keys where each one prefixes the next.
        let mut chain: Vec<&str> = Vec::new();

        for (key, members) in &self.unique {
            while chain.last().is_some_and(|top| !key.starts_with(top)) {
                chain.pop();
            }
            for prefix in &chain {
                if let Some(absorbing) = data.get_mut(*prefix) {
                    absorbing.extend(members.iter().map(|(id, r)| (id.clone(), Arc::clone(r))));
                }
            }
            data.insert(key.clone(), members.clone());
            chain.push(key);
        }

        self.data = data;
    }
}

impl<R: Record> Index<R> for PrefixSearchIndex<R> {
    fn insert(&mut self, record: &Arc<R>) {
        self.add(record);
        self.merge_search_prefixes();
    }

    fn delete(&mut self, record: &R) {
        self.remove(record);
        self.merge_search_prefixes();
    }

    fn clear(&mut self) {
        self.unique.clear();
        self.data.clear();
    }

    fn key_count(&self) -> usize {
        self.data.len()
    }

    fn insert_all(&mut self, records: &[Arc<R>]) {
        for record in records {
            self.add(record);
        }
        self.merge_search_prefixes();
    }

    fn delete_all(&mut self, records: &[Arc<R>]) {
        for record in records {
            self.remove(record);
        }
        self.merge_search_prefixes();
    }

    fn update(&mut self, old: &R, new: &Arc<R>) {
        self.remove(old);
        self.add(new);
        self.merge_search_prefixes();
    }

    fn update_all(&mut self, changes: &[(Arc<R>, Arc<R>)]) {
        for (old, _) in changes {
            self.remove(old);
        }
        for (_, new) in changes {
            self.add(new);
        }
        self.merge_search_prefixes();
    }
}
