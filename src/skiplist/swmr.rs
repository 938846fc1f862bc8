use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::index::{IndexError, OrderedIndex, WordValue};

/// Seed for the promotion coin when the caller does not supply one.
///
/// The coin decides how far a freshly inserted key climbs the levels, so the
/// generator lives inside the writer handle and is seeded deterministically.
/// Two runs that perform the same upserts build the same topology.
const DEFAULT_SEED: u64 = 0x0123_4567_89AB_CDEF;

/// A node at one level of the skip list.
///
/// Level heads carry no entry; every other node holds its key and the word
/// its value is stored as. The key and the `down` link are written before the
/// node is published and never change afterwards, so only `next` and the
/// value word need atomic access.
struct Node<K> {
    entry: Option<(K, AtomicU64)>,
    next: AtomicPtr<Node<K>>,
    down: *mut Node<K>,
}

impl<K> Node<K> {
    fn head() -> Box<Node<K>> {
        Box::new(Node {
            entry: None,
            next: AtomicPtr::new(ptr::null_mut()),
            down: ptr::null_mut(),
        })
    }

    fn new(key: K, word: u64, down: *mut Node<K>) -> Box<Node<K>> {
        Box::new(Node {
            entry: Some((key, AtomicU64::new(word))),
            next: AtomicPtr::new(ptr::null_mut()),
            down,
        })
    }

    fn key(&self) -> Option<&K> {
        self.entry.as_ref().map(|(key, _)| key)
    }
}

/// The level-linked node graph, shared between the writer and its readers.
///
/// `heads` is ordered top-down: index 0 is the sparsest level and the last
/// entry is the leaf level that holds every key. Each head starts a sorted
/// forward chain, and heads are chained downward so a descent never needs
/// the vector after it starts.
struct Levels<K> {
    heads: Vec<*mut Node<K>>,
    len: AtomicUsize,
}

// Nodes are reached only through the atomic forward links and the immutable
// downward links, and every mutation after publication goes through an
// atomic field.
unsafe impl<K: Send> Send for Levels<K> {}
unsafe impl<K: Send + Sync> Sync for Levels<K> {}

impl<K: Ord> Levels<K> {
    fn with_height(height: usize) -> Result<Levels<K>, IndexError> {
        if height == 0 {
            return Err(IndexError::ZeroHeight);
        }
        let mut heads = Vec::with_capacity(height);
        let mut above: *mut Node<K> = ptr::null_mut();
        for _ in 0..height {
            let head = Box::into_raw(Node::head());
            if !above.is_null() {
                // Heads are private to this constructor until it returns.
                unsafe { (*above).down = head };
            }
            heads.push(head);
            above = head;
        }
        Ok(Levels {
            heads,
            len: AtomicUsize::new(0),
        })
    }

    /// Walk forward at one level and return the rightmost node whose key is
    /// at most `key`, or `cur` itself if no such successor exists.
    ///
    /// The acquire load pairs with the release store in [`Levels::chain`]: a
    /// node reached through `next` is fully initialized before its key or
    /// links are read. Heads never appear as successors, so a missing entry
    /// on the candidate simply stops the walk.
    fn find_in_level<'a>(&self, mut cur: &'a Node<K>, key: &K) -> &'a Node<K> {
        loop {
            let next = cur.next.load(Ordering::Acquire);
            if next.is_null() {
                return cur;
            }
            let candidate = unsafe { &*next };
            match candidate.key() {
                Some(k) if k <= key => cur = candidate,
                _ => return cur,
            }
        }
    }

    fn lookup(&self, key: &K) -> Option<u64> {
        let mut spot = self.find_in_level(unsafe { &*self.heads[0] }, key);
        loop {
            if let Some((ref k, ref value)) = spot.entry {
                if k == key {
                    return Some(value.load(Ordering::Relaxed));
                }
            }
            if spot.down.is_null() {
                return None;
            }
            spot = self.find_in_level(unsafe { &*spot.down }, key);
        }
    }

    /// Recursive descent of the write path. Returns the node just linked at
    /// the level below the caller's, or null when no tower is growing.
    ///
    /// Insertion is bottom-up: the leaf link happens inside the deepest
    /// recursive call, before any higher level links the same key. A reader
    /// that finds the key at some level is therefore guaranteed to find it
    /// at every level beneath.
    fn upsert_rec(&self, cur: &Node<K>, key: &K, word: u64, rng: &mut SmallRng) -> *mut Node<K>
    where
        K: Clone,
    {
        let spot = self.find_in_level(cur, key);

        // Update case: overwrite in place here, then keep overwriting the
        // rest of the tower below. No allocation, no new links.
        if let Some((ref k, ref value)) = spot.entry {
            if k == key {
                value.store(word, Ordering::Relaxed);
                if !spot.down.is_null() {
                    self.upsert_rec(unsafe { &*spot.down }, key, word, rng);
                }
                return ptr::null_mut();
            }
        }

        // Leaf insert: this is where a new key first becomes visible.
        if spot.down.is_null() {
            let node = Node::new(key.clone(), word, ptr::null_mut());
            self.len.fetch_add(1, Ordering::Relaxed);
            return self.chain(spot, node);
        }

        // Internal level: insert below first, then promote on a fair coin.
        let child = self.upsert_rec(unsafe { &*spot.down }, key, word, rng);
        if child.is_null() {
            return ptr::null_mut();
        }
        if rng.random::<bool>() {
            let node = Node::new(key.clone(), word, child);
            return self.chain(spot, node);
        }
        ptr::null_mut()
    }

    /// Splice `node` into the chain right after `prev`.
    ///
    /// The release store into `prev.next` is the publication point. The new
    /// node's own forward link is written first with relaxed order because
    /// nothing can reach the node until the release store completes.
    fn chain(&self, prev: &Node<K>, node: Box<Node<K>>) -> *mut Node<K> {
        let raw = Box::into_raw(node);
        let succ = prev.next.load(Ordering::Relaxed);
        unsafe { (*raw).next.store(succ, Ordering::Relaxed) };
        prev.next.store(raw, Ordering::Release);
        raw
    }
}

impl<K> Drop for Levels<K> {
    fn drop(&mut self) {
        // Tower nodes are separate allocations per level, so freeing each
        // level's chain frees every node exactly once.
        for &head in &self.heads {
            let mut cur = head;
            while !cur.is_null() {
                let next = unsafe { (*cur).next.load(Ordering::Relaxed) };
                drop(unsafe { Box::from_raw(cur) });
                cur = next;
            }
        }
    }
}

/// An append-only ordered key-value index for a single writer and any number
/// of concurrent readers.
///
/// The index is a multi-level skip list. The writer owns this handle, and
/// because [`upsert`](SwmrSkipList::upsert) takes `&mut self` the
/// single-writer rule is enforced by the borrow checker rather than left as
/// documented misuse. Readers run through cloneable
/// [`SkipListReader`] handles obtained from
/// [`reader`](SwmrSkipList::reader); a lookup takes no lock and performs no
/// allocation, and it always observes a consistent prefix of the writer's
/// work.
///
/// Keys only accumulate: there is no removal, and updating an existing key
/// overwrites its value in place. That makes the structure a natural mutable
/// tier for a log-structured merge tree, where a full index is frozen and
/// flushed wholesale rather than edited.
///
/// Values must fit in one machine word (see [`WordValue`]) so that readers
/// can load them atomically without tearing. Wider payloads belong behind an
/// indirection chosen by the caller.
///
/// # Examples
///
/// ```
/// use memdex::SwmrSkipList;
///
/// let mut index: SwmrSkipList<i64, i64> = SwmrSkipList::with_height(16).unwrap();
///
/// index.upsert(1, 10);
/// index.upsert(2, 20);
/// index.upsert(1, 15);
///
/// assert_eq!(index.find(&1), Some(15));
/// assert_eq!(index.find(&2), Some(20));
/// assert_eq!(index.find(&3), None);
/// ```
///
/// Concurrent lookups run on reader handles while the writer keeps
/// inserting:
///
/// ```
/// use memdex::SwmrSkipList;
///
/// let mut index: SwmrSkipList<u64, u64> = SwmrSkipList::with_height(16).unwrap();
/// let reader = index.reader();
///
/// let probe = std::thread::spawn(move || {
///     // Either outcome is valid while the writer races this lookup.
///     matches!(reader.find(&7), None | Some(49))
/// });
///
/// index.upsert(7, 49);
/// assert!(probe.join().unwrap());
/// assert_eq!(index.find(&7), Some(49));
/// ```
pub struct SwmrSkipList<K, V> {
    levels: Arc<Levels<K>>,
    rng: SmallRng,
    _value: PhantomData<V>,
}

impl<K, V> SwmrSkipList<K, V>
where
    K: Ord + Clone,
    V: WordValue,
{
    /// Build an index with `height` empty levels and the default coin seed.
    ///
    /// A reasonable height is the base-2 logarithm of the number of keys the
    /// index is expected to hold before being flushed; 22 comfortably covers
    /// a few million keys. The height is fixed for the index's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::ZeroHeight`] if `height` is zero.
    pub fn with_height(height: usize) -> Result<Self, IndexError> {
        Self::with_height_and_seed(height, DEFAULT_SEED)
    }

    /// Build an index with `height` empty levels and a caller-chosen seed
    /// for the level-promotion coin.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::ZeroHeight`] if `height` is zero.
    pub fn with_height_and_seed(height: usize, seed: u64) -> Result<Self, IndexError> {
        Ok(SwmrSkipList {
            levels: Arc::new(Levels::with_height(height)?),
            rng: SmallRng::seed_from_u64(seed),
            _value: PhantomData,
        })
    }

    /// Insert `key` with `value`, or overwrite the value in place if the key
    /// is already present.
    ///
    /// A new key appears atomically at the leaf level and with probability
    /// 1/2 per step climbs some prefix of the levels above it. An overwrite
    /// touches no links at all. Readers racing this call observe either the
    /// state before it or the state after it for the affected key.
    pub fn upsert(&mut self, key: K, value: V) {
        let top = unsafe { &*self.levels.heads[0] };
        self.levels
            .upsert_rec(top, &key, value.to_word(), &mut self.rng);
    }

    /// Look up the value currently bound to `key`.
    pub fn find(&self, key: &K) -> Option<V> {
        self.levels.lookup(key).map(V::from_word)
    }

    /// Create a read handle sharing this index.
    ///
    /// Handles are cheap to clone and may be moved to any number of reader
    /// threads. They keep the node graph alive, so the index is only torn
    /// down once the writer and every reader handle are gone.
    pub fn reader(&self) -> SkipListReader<K, V> {
        SkipListReader {
            levels: Arc::clone(&self.levels),
            _value: PhantomData,
        }
    }

    /// Number of distinct keys in the index.
    pub fn len(&self) -> usize {
        self.levels.len.load(Ordering::Relaxed)
    }

    /// Returns true if no key has been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The fixed number of levels chosen at construction.
    pub fn height(&self) -> usize {
        self.levels.heads.len()
    }
}

impl<K, V> OrderedIndex<K, V> for SwmrSkipList<K, V>
where
    K: Ord + Clone,
    V: WordValue,
{
    fn upsert(&mut self, key: K, value: V) -> Result<(), IndexError> {
        SwmrSkipList::upsert(self, key, value);
        Ok(())
    }

    fn find(&self, key: &K) -> Result<Option<V>, IndexError> {
        Ok(SwmrSkipList::find(self, key))
    }

    fn len(&self) -> Result<usize, IndexError> {
        Ok(SwmrSkipList::len(self))
    }

    fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(SwmrSkipList::is_empty(self))
    }
}

impl<K, V> fmt::Debug for SwmrSkipList<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwmrSkipList")
            .field("height", &self.levels.heads.len())
            .field("len", &self.levels.len.load(Ordering::Relaxed))
            .finish()
    }
}

/// A shared read handle over a [`SwmrSkipList`].
///
/// Lookups are lock-free with respect to the writer: every traversal step
/// either advances or observes the previously linked state, and values are
/// read as single atomic words so an overwrite is seen as either the old or
/// the new value, never a mix.
pub struct SkipListReader<K, V> {
    levels: Arc<Levels<K>>,
    _value: PhantomData<V>,
}

impl<K, V> SkipListReader<K, V>
where
    K: Ord,
    V: WordValue,
{
    /// Look up the value currently bound to `key`.
    pub fn find(&self, key: &K) -> Option<V> {
        self.levels.lookup(key).map(V::from_word)
    }

    /// Number of distinct keys published so far.
    pub fn len(&self) -> usize {
        self.levels.len.load(Ordering::Relaxed)
    }

    /// Returns true if no key has been published yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Clone for SkipListReader<K, V> {
    fn clone(&self) -> Self {
        SkipListReader {
            levels: Arc::clone(&self.levels),
            _value: PhantomData,
        }
    }
}

impl<K, V> fmt::Debug for SkipListReader<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkipListReader")
            .field("height", &self.levels.heads.len())
            .field("len", &self.levels.len.load(Ordering::Relaxed))
            .finish()
    }
}
