use alloc::boxed::Box;
#[cfg(feature = "stats")]
use alloc::vec;
#[cfg(feature = "stats")]
use alloc::vec::Vec;
use core::fmt::Debug;
use core::iter::FusedIterator;

use log::debug;
use log::trace;

use crate::config::Config;
use crate::error::ConfigError;

/// Owning link to the rest of a chain. A bucket is the head link of its
/// chain.
type Link<V> = Option<Box<Node<V>>>;

struct Node<V> {
    /// Full hash of the value's key. Only the remainder modulo the bucket
    /// count is positional, so this survives every resize unchanged.
    hash: u64,
    value: V,
    next: Link<V>,
}

impl<V> Node<V> {
    #[inline(always)]
    fn matches(&self, hash: u64, eq: &impl Fn(&V) -> bool) -> bool {
        self.hash == hash && eq(&self.value)
    }
}

#[inline(always)]
fn bucket_index(hash: u64, bucket_count: usize) -> usize {
    // The remainder is strictly below `bucket_count`, so narrowing back is
    // lossless.
    (hash % bucket_count as u64) as usize
}

#[inline(always)]
fn fits(entries: usize, bucket_count: usize, max_load_factor: f32) -> bool {
    entries as f64 <= bucket_count as f64 * f64::from(max_load_factor)
}

#[cold]
#[inline(never)]
fn capacity_overflow() -> ! {
    panic!("capacity overflow")
}

fn empty_buckets<V>(bucket_count: usize) -> Box<[Link<V>]> {
    (0..bucket_count).map(|_| None).collect()
}

/// Walks the chain starting at `link` and returns the link that owns the first
/// matching node, or the empty link terminating the chain.
///
/// Returning the owning link rather than the node lets callers unlink a match
/// with a single `take`, whether it is the bucket head or sits deeper in the
/// chain.
fn seek<'a, V>(
    mut link: &'a mut Link<V>,
    hash: u64,
    eq: &impl Fn(&V) -> bool,
) -> &'a mut Link<V> {
    while link.as_ref().is_some_and(|node| !node.matches(hash, eq)) {
        if let Some(node) = link {
            link = &mut node.next;
        }
    }
    link
}

/// Drops a chain one node at a time. Letting `Box` drop recursively would use
/// stack proportional to the chain length.
fn drop_chain<V>(mut link: Link<V>) {
    while let Some(mut node) = link {
        link = node.next.take();
    }
}

/// Chain length statistics for a table.
///
/// Requires the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of entries currently in the table
    pub populated: usize,
    /// Number of buckets in the table
    pub bucket_count: usize,
    /// Number of buckets with no chain
    pub empty_buckets: usize,
    /// Length of the longest chain
    pub longest_chain: usize,
    /// Load factor (populated / bucket_count)
    pub load_factor: f64,
    /// Average length of the non-empty chains
    pub mean_chain_length: f64,
}

#[cfg(feature = "stats")]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {} entries in {} buckets ({:.2}% load factor)",
            self.populated,
            self.bucket_count,
            self.load_factor * 100.0
        );
        println!(
            "Empty buckets: {}/{} ({:.02}%)",
            self.empty_buckets,
            self.bucket_count,
            if self.bucket_count == 0 {
                0.0
            } else {
                (self.empty_buckets as f64 / self.bucket_count as f64) * 100.0
            }
        );
        println!(
            "Chains: longest {}, mean {:.2} over non-empty buckets",
            self.longest_chain, self.mean_chain_length
        );
    }
}

/// A hash table using separate chaining.
///
/// `HashTable<V>` stores values of type `V` in an array of buckets, each the
/// head of a singly linked chain of heap nodes. Like `hashbrown::HashTable`,
/// it does not hash anything itself: every operation takes the
/// value's 64-bit hash and an equality predicate. The hash is cached in the
/// node so that resizing never needs it recomputed.
///
/// The table grows by doubling its bucket count whenever an insertion would
/// push `len / bucket_count` above the configured maximum load factor.
/// Growth relinks the existing nodes into the new bucket array; no value is
/// moved or copied, so node storage stays at the same address for the
/// lifetime of the entry.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use chain_hash::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # #[derive(Debug, PartialEq)]
/// # struct Person {
/// #     id: u64,
/// #     name: String,
/// # }
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
///
/// let mut table = HashTable::new();
/// let hash = hash_id(123);
///
/// match table.entry(hash, |p: &Person| p.id == 123) {
///     chain_hash::hash_table::Entry::Vacant(entry) => {
///         entry.insert(Person {
///             id: 123,
///             name: "Alice".to_string(),
///         });
///     }
///     chain_hash::hash_table::Entry::Occupied(_) => {
///         println!("Person already exists");
///     }
/// }
///
/// assert_eq!(table.find(hash, |p| p.id == 123).map(|p| p.name.as_str()), Some("Alice"));
/// ```
pub struct HashTable<V> {
    buckets: Box<[Link<V>]>,
    populated: usize,
    max_load_factor: f32,
}

impl<V> Debug for HashTable<V>
where
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<V> Clone for HashTable<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        let mut buckets = empty_buckets(self.buckets.len());
        let mut order = alloc::vec::Vec::new();

        for (source, target) in self.buckets.iter().zip(buckets.iter_mut()) {
            let mut cursor = source.as_deref();
            while let Some(node) = cursor {
                order.push(node);
                cursor = node.next.as_deref();
            }

            // Rebuild back to front so each clone keeps its position in the
            // chain.
            let mut chain = None;
            for node in order.drain(..).rev() {
                chain = Some(Box::new(Node {
                    hash: node.hash,
                    value: node.value.clone(),
                    next: chain,
                }));
            }
            *target = chain;
        }

        Self {
            buckets,
            populated: self.populated,
            max_load_factor: self.max_load_factor,
        }
    }
}

impl<V> Drop for HashTable<V> {
    fn drop(&mut self) {
        for bucket in self.buckets.iter_mut() {
            drop_chain(bucket.take());
        }
    }
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HashTable<V> {
    /// Creates an empty table with 16 buckets and a maximum load factor of
    /// 0.75.
    pub fn new() -> Self {
        Self::from_valid_config(Config::default())
    }

    /// Creates an empty table with `bucket_count` buckets and the default
    /// maximum load factor.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_count` is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::hash_table::HashTable;
    ///
    /// let table: HashTable<u64> = HashTable::with_capacity(100);
    /// assert_eq!(table.bucket_count(), 100);
    /// ```
    pub fn with_capacity(bucket_count: usize) -> Self {
        match Self::with_config(Config::default().with_initial_capacity(bucket_count)) {
            Ok(table) => table,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates an empty table from `config`.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] produced by [`Config::validate`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::config::Config;
    /// use chain_hash::error::ConfigError;
    /// use chain_hash::hash_table::HashTable;
    ///
    /// let table: HashTable<u64> =
    ///     HashTable::with_config(Config::default().with_max_load_factor(0.5)).unwrap();
    /// assert_eq!(table.max_load_factor(), 0.5);
    ///
    /// let err = HashTable::<u64>::with_config(Config::default().with_initial_capacity(0));
    /// assert_eq!(err.unwrap_err(), ConfigError::ZeroCapacity);
    /// ```
    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: Config) -> Self {
        Self {
            buckets: empty_buckets(config.initial_capacity),
            populated: 0,
            max_load_factor: config.max_load_factor,
        }
    }

    /// Returns the number of values in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table holds no values.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the current number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the configured maximum load factor.
    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    /// Returns `len / bucket_count`.
    pub fn load_factor(&self) -> f64 {
        self.populated as f64 / self.buckets.len() as f64
    }

    /// Returns a reference to the first value whose hash equals `hash` and for
    /// which `eq` returns `true`.
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        let mut cursor = self.buckets[bucket_index(hash, self.buckets.len())].as_deref();
        while let Some(node) = cursor {
            if node.matches(hash, &eq) {
                return Some(&node.value);
            }
            cursor = node.next.as_deref();
        }
        None
    }

    /// Returns a mutable reference to the first matching value.
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        let index = bucket_index(hash, self.buckets.len());
        seek(&mut self.buckets[index], hash, &eq)
            .as_deref_mut()
            .map(|node| &mut node.value)
    }

    /// Removes the first matching value and returns it.
    ///
    /// The matching node is unlinked by pointing its owning link, either the
    /// bucket head or its predecessor's `next`, at its successor.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::hash_table::HashTable;
    ///
    /// let mut table = HashTable::new();
    /// table.entry(7, |&v: &u32| v == 70).or_insert(70);
    ///
    /// assert_eq!(table.remove(7, |&v| v == 70), Some(70));
    /// assert_eq!(table.remove(7, |&v| v == 70), None);
    /// assert!(table.is_empty());
    /// ```
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        let index = bucket_index(hash, self.buckets.len());
        let link = seek(&mut self.buckets[index], hash, &eq);
        let node = link.take()?;
        let Node { value, next, .. } = *node;
        *link = next;
        self.populated -= 1;
        Some(value)
    }

    /// Gets the entry for the first matching value for in-place manipulation.
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Entry<'_, V> {
        let index = bucket_index(hash, self.buckets.len());
        if seek(&mut self.buckets[index], hash, &eq).is_none() {
            return Entry::Vacant(VacantEntry { table: self, hash });
        }

        Entry::Occupied(OccupiedEntry {
            link: seek(&mut self.buckets[index], hash, &eq),
            populated: &mut self.populated,
        })
    }

    /// Rebuilds the table with `bucket_count` buckets.
    ///
    /// Every node is detached from its old chain in chain order and pushed on
    /// the head of the bucket its cached hash selects in the new array. Nodes
    /// are relinked, never reallocated, and the order of values within a
    /// chain is not preserved.
    ///
    /// Shrinking below what the maximum load factor allows is permitted; the
    /// next insertion grows the table again.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_count` is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::hash_table::HashTable;
    ///
    /// let mut table: HashTable<u64> = HashTable::with_capacity(4);
    /// for v in 0..3u64 {
    ///     table.entry(v, |&x| x == v).or_insert(v);
    /// }
    ///
    /// table.resize(64);
    /// assert_eq!(table.bucket_count(), 64);
    /// assert_eq!(table.find(2, |&x| x == 2), Some(&2));
    /// ```
    pub fn resize(&mut self, bucket_count: usize) {
        assert!(bucket_count > 0, "a hash table needs at least one bucket");

        let old_count = self.buckets.len();
        let mut buckets = empty_buckets(bucket_count);
        for bucket in self.buckets.iter_mut() {
            let mut chain = bucket.take();
            while let Some(mut node) = chain {
                chain = node.next.take();
                let head = &mut buckets[bucket_index(node.hash, bucket_count)];
                node.next = head.take();
                *head = Some(node);
            }
        }
        self.buckets = buckets;

        debug!(
            "resized hash table from {} to {} buckets ({} entries)",
            old_count, bucket_count, self.populated
        );
    }

    /// Reserves room for at least `additional` more values without exceeding
    /// the maximum load factor, doubling the bucket count as often as needed.
    ///
    /// # Panics
    ///
    /// Panics if the required bucket count overflows `usize`.
    pub fn reserve(&mut self, additional: usize) {
        let entries = self
            .populated
            .checked_add(additional)
            .unwrap_or_else(|| capacity_overflow());
        self.grow_to_fit(entries);
    }

    /// Shrinks the bucket array to the smallest size that holds the current
    /// values under the maximum load factor. An empty table keeps a single
    /// bucket.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::hash_table::HashTable;
    ///
    /// let mut table: HashTable<u64> = HashTable::with_capacity(1000);
    /// for v in 0..3u64 {
    ///     table.entry(v, |&x| x == v).or_insert(v);
    /// }
    ///
    /// table.shrink_to_fit();
    /// assert_eq!(table.bucket_count(), 4);
    /// assert_eq!(table.len(), 3);
    /// ```
    pub fn shrink_to_fit(&mut self) {
        let estimate = (self.populated as f64 / f64::from(self.max_load_factor)) as usize;
        let mut target = estimate.max(1);
        while !fits(self.populated, target, self.max_load_factor) {
            target += 1;
        }
        while target > 1 && fits(self.populated, target - 1, self.max_load_factor) {
            target -= 1;
        }

        if target != self.buckets.len() {
            self.resize(target);
        }
    }

    /// Removes every value, keeping the bucket count.
    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            drop_chain(bucket.take());
        }
        self.populated = 0;
    }

    /// Returns an iterator over all values in bucket order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            buckets: self.buckets.iter(),
            chain: None,
            remaining: self.populated,
        }
    }

    /// Returns an iterator yielding mutable references to all values.
    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        IterMut {
            buckets: self.buckets.iter_mut(),
            chain: None,
            remaining: self.populated,
        }
    }

    /// Removes and yields every value. Values not consumed are dropped when
    /// the iterator is dropped.
    pub fn drain(&mut self) -> Drain<'_, V> {
        Drain {
            table: self,
            next_bucket: 0,
            chain: None,
        }
    }

    /// Doubles the bucket count until `entries` values fit under the maximum
    /// load factor, then resizes once.
    fn grow_to_fit(&mut self, entries: usize) {
        let current = self.buckets.len();
        if fits(entries, current, self.max_load_factor) {
            return;
        }

        let mut target = current;
        while !fits(entries, target, self.max_load_factor) {
            target = target.checked_mul(2).unwrap_or_else(|| capacity_overflow());
        }

        trace!(
            "{} entries exceed load factor {} at {} buckets, growing to {}",
            entries, self.max_load_factor, current, target
        );
        self.resize(target);
    }

    /// Ensures one more value can be inserted without exceeding the maximum
    /// load factor.
    pub(crate) fn reserve_one(&mut self) {
        self.grow_to_fit(self.populated + 1);
    }

    /// Returns a histogram of chain lengths: element `n` is the number of
    /// buckets whose chain holds exactly `n` values.
    ///
    /// Requires the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn chain_histogram(&self) -> Vec<usize> {
        let mut histogram = vec![0usize; 1];
        for bucket in self.buckets.iter() {
            let length = chain_length(bucket);
            if histogram.len() <= length {
                histogram.resize(length + 1, 0);
            }
            histogram[length] += 1;
        }
        histogram
    }

    /// Collects chain statistics for the table.
    ///
    /// Requires the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> DebugStats {
        let mut empty_buckets = 0;
        let mut longest_chain = 0;
        for bucket in self.buckets.iter() {
            let length = chain_length(bucket);
            if length == 0 {
                empty_buckets += 1;
            }
            longest_chain = longest_chain.max(length);
        }

        let occupied_buckets = self.buckets.len() - empty_buckets;
        DebugStats {
            populated: self.populated,
            bucket_count: self.buckets.len(),
            empty_buckets,
            longest_chain,
            load_factor: self.load_factor(),
            mean_chain_length: if occupied_buckets == 0 {
                0.0
            } else {
                self.populated as f64 / occupied_buckets as f64
            },
        }
    }
}

#[cfg(feature = "stats")]
fn chain_length<V>(bucket: &Link<V>) -> usize {
    let mut length = 0;
    let mut cursor = bucket.as_deref();
    while let Some(node) = cursor {
        length += 1;
        cursor = node.next.as_deref();
    }
    length
}

/// A view into a single entry in the table, which may either be vacant or
/// occupied.
pub enum Entry<'a, V> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, V>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, V>),
}

impl<'a, V> Entry<'a, V> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the entry's value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant and returns a
    /// mutable reference to the entry's value.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }
}

/// A view into a vacant entry in a `HashTable`.
pub struct VacantEntry<'a, V> {
    table: &'a mut HashTable<V>,
    hash: u64,
}

impl<'a, V> VacantEntry<'a, V> {
    /// Returns the hash the value will be stored under.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Inserts `value` at the head of its bucket's chain, growing the table
    /// first if the insertion would exceed the maximum load factor.
    pub fn insert(self, value: V) -> &'a mut V {
        let VacantEntry { table, hash } = self;
        table.reserve_one();
        table.populated += 1;

        let index = bucket_index(hash, table.buckets.len());
        let head = &mut table.buckets[index];
        let next = head.take();
        &mut head.insert(Box::new(Node { hash, value, next })).value
    }
}

/// A view into an occupied entry in a `HashTable`.
pub struct OccupiedEntry<'a, V> {
    /// The link owning the matched node: the bucket head or the predecessor's
    /// `next`. Always `Some`.
    link: &'a mut Link<V>,
    populated: &'a mut usize,
}

impl<'a, V> OccupiedEntry<'a, V> {
    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        match self.link.as_deref() {
            Some(node) => &node.value,
            None => unreachable!("occupied entry without a node"),
        }
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        match self.link.as_deref_mut() {
            Some(node) => &mut node.value,
            None => unreachable!("occupied entry without a node"),
        }
    }

    /// Converts the entry into a mutable reference to its value.
    pub fn into_mut(self) -> &'a mut V {
        match self.link.as_deref_mut() {
            Some(node) => &mut node.value,
            None => unreachable!("occupied entry without a node"),
        }
    }

    /// Unlinks the entry from its chain and returns the value.
    pub fn remove(self) -> V {
        let Some(node) = self.link.take() else {
            unreachable!("occupied entry without a node")
        };
        let Node { value, next, .. } = *node;
        *self.link = next;
        *self.populated -= 1;
        value
    }
}

/// An iterator over the values of a `HashTable`.
pub struct Iter<'a, V> {
    buckets: core::slice::Iter<'a, Link<V>>,
    chain: Option<&'a Node<V>>,
    remaining: usize,
}

impl<V> Clone for Iter<'_, V> {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets.clone(),
            chain: self.chain,
            remaining: self.remaining,
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.chain {
                self.chain = node.next.as_deref();
                self.remaining -= 1;
                return Some(&node.value);
            }
            self.chain = self.buckets.next()?.as_deref();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V> FusedIterator for Iter<'_, V> {}

/// A mutable iterator over the values of a `HashTable`.
pub struct IterMut<'a, V> {
    buckets: core::slice::IterMut<'a, Link<V>>,
    chain: Option<&'a mut Node<V>>,
    remaining: usize,
}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.chain.take() {
                self.chain = node.next.as_deref_mut();
                self.remaining -= 1;
                return Some(&mut node.value);
            }
            self.chain = self.buckets.next()?.as_deref_mut();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for IterMut<'_, V> {}

impl<V> FusedIterator for IterMut<'_, V> {}

/// A draining iterator over the values of a `HashTable`.
pub struct Drain<'a, V> {
    table: &'a mut HashTable<V>,
    next_bucket: usize,
    chain: Link<V>,
}

impl<V> Iterator for Drain<'_, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.chain.take() {
                let Node { value, next, .. } = *node;
                self.chain = next;
                self.table.populated -= 1;
                return Some(value);
            }
            let bucket = self.table.buckets.get_mut(self.next_bucket)?;
            self.chain = bucket.take();
            self.next_bucket += 1;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.populated, Some(self.table.populated))
    }
}

impl<V> ExactSizeIterator for Drain<'_, V> {}

impl<V> FusedIterator for Drain<'_, V> {}

impl<V> Drop for Drain<'_, V> {
    fn drop(&mut self) {
        for _ in self {}
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Item {
        key: u64,
        value: i32,
    }

    fn hash_key(state: &HashState, key: u64) -> u64 {
        let mut h = state.build_hasher();
        h.write_u64(key);
        h.finish()
    }

    fn insert_item(table: &mut HashTable<Item>, hash: u64, key: u64, value: i32) {
        match table.entry(hash, |v: &Item| v.key == key) {
            Entry::Vacant(v) => {
                v.insert(Item { key, value });
            }
            Entry::Occupied(_) => panic!("unexpected occupied entry for key {key}"),
        }
    }

    fn chain_values(table: &HashTable<Item>, bucket: usize) -> Vec<u64> {
        let mut keys = Vec::new();
        let mut cursor = table.buckets[bucket].as_deref();
        while let Some(node) = cursor {
            keys.push(node.value.key);
            cursor = node.next.as_deref();
        }
        keys
    }

    fn assert_home_buckets<V>(table: &HashTable<V>) {
        for (index, bucket) in table.buckets.iter().enumerate() {
            let mut cursor = bucket.as_deref();
            while let Some(node) = cursor {
                assert_eq!(bucket_index(node.hash, table.bucket_count()), index);
                cursor = node.next.as_deref();
            }
        }
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            insert_item(&mut table, hash, k, (k as i32) * 2);
            assert_eq!(
                table.find(hash, |v| v.key == k),
                Some(&Item {
                    key: k,
                    value: (k as i32) * 2
                })
            );
        }
        assert_eq!(table.len(), 32);

        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            assert_eq!(table.find(hash, |v| v.key == k).map(|v| v.value), Some(k as i32 * 2));
        }
        let miss = hash_key(&state, 99);
        assert!(table.find(miss, |v| v.key == 99).is_none());
        assert_home_buckets(&table);
    }

    #[test]
    fn duplicate_entry_is_occupied() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        let hash = hash_key(&state, 5);
        insert_item(&mut table, hash, 5, 1);

        match table.entry(hash, |v| v.key == 5) {
            Entry::Occupied(mut o) => {
                assert_eq!(o.get().value, 1);
                o.get_mut().value = 2;
            }
            Entry::Vacant(_) => panic!("expected occupied entry"),
        }
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(hash, |v| v.key == 5).map(|v| v.value), Some(2));
    }

    #[test]
    fn find_mut_and_modify() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        let hash = hash_key(&state, 10);
        insert_item(&mut table, hash, 10, 0);

        if let Some(item) = table.find_mut(hash, |v| v.key == 10) {
            item.value += 41;
        }
        assert_eq!(table.find(hash, |v| v.key == 10).map(|v| v.value), Some(41));
        assert!(table.find_mut(hash, |v| v.key == 11).is_none());
    }

    #[test]
    fn remove_items() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..64u64 {
            insert_item(&mut table, hash_key(&state, k), k, k as i32);
        }

        for k in (0..64u64).step_by(3) {
            let hash = hash_key(&state, k);
            assert_eq!(
                table.remove(hash, |v| v.key == k),
                Some(Item {
                    key: k,
                    value: k as i32
                })
            );
            assert!(table.remove(hash, |v| v.key == k).is_none());
        }

        for k in 0..64u64 {
            let found = table.find(hash_key(&state, k), |v| v.key == k).is_some();
            assert_eq!(found, k % 3 != 0, "key {k}");
        }
        assert_eq!(table.len(), 64 - 22);
    }

    #[test]
    fn remove_from_empty_bucket() {
        let mut table: HashTable<Item> = HashTable::with_capacity(8);
        assert!(table.remove(3, |v| v.key == 3).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn explicit_collision() {
        // Every item shares one hash, so they all live in a single chain.
        let hash = 0xDEAD_BEEF;
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..8u64 {
            insert_item(&mut table, hash, k, k as i32);
        }
        let bucket = bucket_index(hash, table.bucket_count());
        // Head insertion puts the newest value first.
        assert_eq!(chain_values(&table, bucket), vec![7, 6, 5, 4, 3, 2, 1, 0]);

        // Head.
        assert_eq!(table.remove(hash, |v| v.key == 7).map(|v| v.key), Some(7));
        // Middle.
        assert_eq!(table.remove(hash, |v| v.key == 3).map(|v| v.key), Some(3));
        // Tail.
        assert_eq!(table.remove(hash, |v| v.key == 0).map(|v| v.key), Some(0));
        // Same hash, absent key.
        assert!(table.remove(hash, |v| v.key == 100).is_none());

        assert_eq!(chain_values(&table, bucket), vec![6, 5, 4, 2, 1]);
        assert_eq!(table.len(), 5);
        for k in [6, 5, 4, 2, 1] {
            assert!(table.find(hash, |v| v.key == k).is_some());
        }
    }

    #[test]
    fn occupied_entry_remove_relinks_chain() {
        let hash = 17;
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..4u64 {
            insert_item(&mut table, hash, k, 0);
        }

        match table.entry(hash, |v| v.key == 2) {
            Entry::Occupied(o) => assert_eq!(o.remove().key, 2),
            Entry::Vacant(_) => panic!("expected occupied entry"),
        }
        assert_eq!(table.len(), 3);
        assert_eq!(
            chain_values(&table, bucket_index(hash, table.bucket_count())),
            vec![3, 1, 0]
        );
    }

    #[test]
    fn grows_when_projected_load_exceeds_threshold() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(16);

        for k in 0..12u64 {
            insert_item(&mut table, hash_key(&state, k), k, 0);
        }
        // 12 / 16 == 0.75 is still allowed.
        assert_eq!(table.bucket_count(), 16);

        insert_item(&mut table, hash_key(&state, 12), 12, 0);
        assert_eq!(table.bucket_count(), 32);
        assert_eq!(table.len(), 13);

        for k in 0..13u64 {
            assert!(table.find(hash_key(&state, k), |v| v.key == k).is_some());
        }
        assert_home_buckets(&table);
    }

    #[test]
    fn tiny_load_factor_doubles_until_it_fits() {
        let config = Config::default()
            .with_initial_capacity(1)
            .with_max_load_factor(0.1);
        let mut table: HashTable<Item> = HashTable::with_config(config).unwrap();

        insert_item(&mut table, 1, 1, 0);
        // 1 entry needs 10 buckets; doubling from 1 lands on 16.
        assert_eq!(table.bucket_count(), 16);
        assert!(table.load_factor() <= 0.1);
    }

    #[test]
    fn load_factor_bound_holds_while_growing() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(3);
        for k in 0..2000u64 {
            insert_item(&mut table, hash_key(&state, k), k, 0);
            assert!(table.load_factor() <= f64::from(table.max_load_factor()));
        }
    }

    #[test]
    fn resize_preserves_entries() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..100u64 {
            insert_item(&mut table, hash_key(&state, k), k, k as i32);
        }

        for bucket_count in [7, 1, 1024, 3] {
            table.resize(bucket_count);
            assert_eq!(table.bucket_count(), bucket_count);
            assert_eq!(table.len(), 100);
            assert_home_buckets(&table);
            for k in 0..100u64 {
                assert_eq!(
                    table.find(hash_key(&state, k), |v| v.key == k).map(|v| v.value),
                    Some(k as i32)
                );
            }
        }
    }

    #[test]
    fn resize_relinks_without_moving_values() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..10u64 {
            insert_item(&mut table, hash_key(&state, k), k, 0);
        }

        let before: Vec<*const Item> = (0..10u64)
            .map(|k| table.find(hash_key(&state, k), |v| v.key == k).unwrap() as *const Item)
            .collect();

        table.resize(257);

        let after: Vec<*const Item> = (0..10u64)
            .map(|k| table.find(hash_key(&state, k), |v| v.key == k).unwrap() as *const Item)
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    #[should_panic(expected = "at least one bucket")]
    fn resize_to_zero_panics() {
        let mut table: HashTable<Item> = HashTable::new();
        table.resize(0);
    }

    #[test]
    #[should_panic(expected = "initial capacity must be at least 1 bucket")]
    fn with_capacity_zero_panics() {
        let _table: HashTable<Item> = HashTable::with_capacity(0);
    }

    #[test]
    fn with_config_rejects_invalid() {
        assert_eq!(
            HashTable::<Item>::with_config(Config::default().with_initial_capacity(0)).err(),
            Some(ConfigError::ZeroCapacity)
        );
        assert_eq!(
            HashTable::<Item>::with_config(Config::default().with_max_load_factor(2.0)).err(),
            Some(ConfigError::InvalidLoadFactor(2.0))
        );
    }

    #[test]
    fn iter_and_drain() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 10..20u64 {
            insert_item(&mut table, hash_key(&state, k), k, (k as i32) + 1);
        }

        let iter = table.iter();
        assert_eq!(iter.len(), 10);
        let collected: Vec<u64> = iter.map(|v| v.key).collect();
        assert_eq!(collected.len(), 10, "{:#?}", table);
        for k in 10..20u64 {
            assert!(collected.contains(&k));
        }

        let drained: Vec<Item> = table.drain().collect();
        assert_eq!(drained.len(), 10);
        assert_eq!(table.len(), 0);

        for k in 10..20u64 {
            let hash = hash_key(&state, k);
            assert!(table.find(hash, |v| v.key == k).is_none());
        }
    }

    #[test]
    fn partial_drain_drops_the_rest() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..10u64 {
            insert_item(&mut table, hash_key(&state, k), k, 0);
        }

        let first: Vec<Item> = table.drain().take(3).collect();
        assert_eq!(first.len(), 3);
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn iter_mut_updates_values() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..20u64 {
            insert_item(&mut table, hash_key(&state, k), k, 1);
        }

        for item in table.iter_mut() {
            item.value = item.key as i32 * 10;
        }
        for k in 0..20u64 {
            assert_eq!(
                table.find(hash_key(&state, k), |v| v.key == k).map(|v| v.value),
                Some(k as i32 * 10)
            );
        }
    }

    #[test]
    fn clear_keeps_bucket_count() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..50u64 {
            insert_item(&mut table, hash_key(&state, k), k, 0);
        }
        let buckets = table.bucket_count();

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.bucket_count(), buckets);
        assert!(table.find(hash_key(&state, 1), |v| v.key == 1).is_none());
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct StringItem {
        key: String,
        value: i32,
    }

    fn hash_string_key(state: &HashState, key: &str) -> u64 {
        let mut h = state.build_hasher();
        h.write(key.as_bytes());
        h.finish()
    }

    #[test]
    fn insert_and_remove_string_keys() {
        let state = HashState::default();
        let mut table: HashTable<StringItem> = HashTable::with_capacity(2);
        let keys = ["hello", "world", "foo", "bar", "baz"];

        for (i, k) in keys.iter().enumerate() {
            let hash = hash_string_key(&state, k);
            table
                .entry(hash, |v: &StringItem| v.key == *k)
                .or_insert_with(|| StringItem {
                    key: k.to_string(),
                    value: i as i32,
                });
        }
        assert_eq!(table.len(), keys.len());

        let hash = hash_string_key(&state, "foo");
        assert_eq!(table.remove(hash, |v| v.key == "foo").map(|v| v.value), Some(2));
        assert!(table.find(hash, |v| v.key == "foo").is_none());
        assert_eq!(table.len(), keys.len() - 1);
    }

    #[test]
    fn entry_or_insert_keeps_existing() {
        let mut table: HashTable<(u64, &str)> = HashTable::new();
        table.entry(1, |v| v.0 == 1).or_insert((1, "first"));
        let value = table.entry(1, |v| v.0 == 1).or_insert((1, "second"));
        assert_eq!(value.1, "first");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_clone() {
        let hash = 5;
        let mut table: HashTable<Item> = HashTable::with_capacity(4);
        for k in 0..6u64 {
            insert_item(&mut table, hash, k, k as i32);
        }
        let state = HashState::default();
        for k in 6..40u64 {
            insert_item(&mut table, hash_key(&state, k), k, k as i32);
        }

        let cloned = table.clone();
        assert_eq!(cloned.len(), table.len());
        assert_eq!(cloned.bucket_count(), table.bucket_count());
        for bucket in 0..table.bucket_count() {
            assert_eq!(chain_values(&cloned, bucket), chain_values(&table, bucket));
        }

        table.clear();
        assert_eq!(cloned.len(), 40);
        assert!(cloned.find(hash, |v| v.key == 3).is_some());
    }

    #[test]
    fn test_shrink_to_fit() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(1024);
        for k in 0..30u64 {
            insert_item(&mut table, hash_key(&state, k), k, 0);
        }

        table.shrink_to_fit();
        // 30 / 0.75 == 40 buckets exactly.
        assert_eq!(table.bucket_count(), 40);
        for k in 0..30u64 {
            assert!(table.find(hash_key(&state, k), |v| v.key == k).is_some());
        }

        table.clear();
        table.shrink_to_fit();
        assert_eq!(table.bucket_count(), 1);
    }

    #[test]
    fn test_reserve() {
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        table.reserve(12);
        assert_eq!(table.bucket_count(), 16);

        table.reserve(100);
        // 100 / 0.75 needs 134 buckets; doubling from 16 gives 256.
        assert_eq!(table.bucket_count(), 256);
    }

    #[test]
    #[should_panic(expected = "capacity overflow")]
    fn reserve_overflow_panics() {
        let mut table: HashTable<Item> = HashTable::new();
        table.entry(0, |v| v.key == 0).or_insert(Item { key: 0, value: 0 });
        table.reserve(usize::MAX);
    }

    #[test]
    fn long_chain_drop_is_iterative() {
        let mut table: HashTable<u64> = HashTable::with_capacity(1 << 17);
        for v in 0..100_000u64 {
            table.entry(v, |&x| x == v).or_insert(v);
        }

        table.resize(1);
        assert_eq!(table.len(), 100_000);
        drop(table);
    }

    #[cfg(feature = "stats")]
    #[test]
    fn stats_report_chains() {
        let mut table: HashTable<u64> = HashTable::with_capacity(4);
        // Buckets 0, 1, 1, 1 and none in 2 or 3.
        for (hash, v) in [(0u64, 0u64), (1, 1), (5, 2), (9, 3)] {
            table.entry(hash, |&x| x == v).or_insert(v);
        }
        table.resize(4);

        assert_eq!(table.chain_histogram(), vec![2, 1, 0, 1]);

        let stats = table.debug_stats();
        assert_eq!(stats.populated, 4);
        assert_eq!(stats.bucket_count, 4);
        assert_eq!(stats.empty_buckets, 2);
        assert_eq!(stats.longest_chain, 3);
        assert_eq!(stats.mean_chain_length, 2.0);
    }
}
