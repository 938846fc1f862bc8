mod error;
mod locked;
mod traits;

pub use error::IndexError;
pub use locked::LockedIndex;
pub use traits::{OrderedIndex, WordValue};
