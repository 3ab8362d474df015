//! `Debug` formatters for large collections.
//!
//! Meant to be used through `custom_debug`:
//!
//! ```rust,ignore
//! #[derive(custom_debug::Debug)]
//! struct Geom {
//!     #[debug(with = raw3d_utils::debug::trimmed_collection_fmt)]
//!     vertices: Vec<Vertex>,
//! }
//! ```

use std::{cmp, fmt, sync};

const FIRST_N_ELEMENTS: usize = 3;

/// Anything that can hand out a prefix of its elements for printing.
pub trait HasLength {
    type Item: fmt::Debug;

    fn element_count(&self) -> usize;
    fn first_n(&self, elements: usize) -> &[Self::Item];
}

impl<T: fmt::Debug> HasLength for &[T] {
    type Item = T;

    fn element_count(&self) -> usize {
        self.len()
    }

    fn first_n(&self, elements: usize) -> &[Self::Item] {
        &self[..cmp::min(elements, self.len())]
    }
}

impl<T: fmt::Debug> HasLength for Vec<T> {
    type Item = T;

    fn element_count(&self) -> usize {
        self.len()
    }

    fn first_n(&self, elements: usize) -> &[Self::Item] {
        &self[..cmp::min(elements, self.len())]
    }
}

impl<T: ?Sized + HasLength> HasLength for sync::Arc<T> {
    type Item = T::Item;

    fn element_count(&self) -> usize {
        self.as_ref().element_count()
    }

    fn first_n(&self, elements: usize) -> &[Self::Item] {
        self.as_ref().first_n(elements)
    }
}

/// Prints the first three elements and how many were left out.
#[cfg(not(feature = "debug-print-all"))]
pub fn trimmed_collection_fmt<T: HasLength + fmt::Debug>(
    n: &T,
    f: &mut fmt::Formatter,
) -> fmt::Result {
    let head = n.first_n(FIRST_N_ELEMENTS);
    let skipped = n.element_count().saturating_sub(head.len());

    if skipped == 0 {
        write!(f, "{:?}", head)
    } else {
        write!(f, "{:?} + {} elements", head, skipped)
    }
}

#[cfg(feature = "debug-print-all")]
pub fn trimmed_collection_fmt<T: HasLength + fmt::Debug>(
    n: &T,
    f: &mut fmt::Formatter,
) -> fmt::Result {
    write!(f, "{:?}", n)
}
