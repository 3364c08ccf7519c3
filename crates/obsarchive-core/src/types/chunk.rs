//! Fixed-size batching over any iterator.
//!
//! Used wherever work is grouped before a bulk call: storage deletes and
//! catalog updates alike.

/// Iterator adapter yielding `Vec`s of at most `size` items.
///
/// Every batch except possibly the last holds exactly `size` items.
#[derive(Debug)]
pub struct Batches<I: Iterator> {
    inner: I,
    size: usize,
}

/// Split `items` into batches of `size` (a size of zero is treated as one).
pub fn batches<I: IntoIterator>(items: I, size: usize) -> Batches<I::IntoIter> {
    Batches {
        inner: items.into_iter(),
        size: size.max(1),
    }
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<_> = self.inner.by_ref().take(self.size).collect();
        if batch.is_empty() { None } else { Some(batch) }
    }
}
