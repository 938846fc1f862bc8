mod swmr;

pub use swmr::{SkipListReader, SwmrSkipList};
