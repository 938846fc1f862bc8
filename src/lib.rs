//! An append-only, in-memory ordered key-value index for the mutable tier of
//! a log-structured merge tree.
//!
//! The core type is [`SwmrSkipList`], a multi-level skip list tuned for one
//! writer and many readers. The writer upserts without ever blocking on the
//! readers, who look keys up lock-free through [`SkipListReader`] handles;
//! nothing is unlinked until the whole index is dropped. [`LockedIndex`] is
//! the lock-based baseline the skip list is benchmarked against, and both
//! implement [`OrderedIndex`].

pub mod index;
pub mod skiplist;

pub use index::{IndexError, LockedIndex, OrderedIndex, WordValue};
pub use skiplist::{SkipListReader, SwmrSkipList};
