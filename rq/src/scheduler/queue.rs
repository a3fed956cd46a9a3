//! FIFO task queue with admission control

use std::collections::VecDeque;

/// Ordered buffer of admitted, not-yet-dispatched items.
///
/// The only ways in and out are [`admit`](Self::admit) at the tail and
/// [`pop`](Self::pop) at the head.
#[derive(Debug)]
pub(crate) struct TaskQueue<I> {
    items: VecDeque<I>,
    peak_depth: usize,
}

impl<I> TaskQueue<I> {
    pub(crate) fn new() -> Self {
        Self {
            items: VecDeque::new(),
            peak_depth: 0,
        }
    }

    /// Append `item` unless the queue already holds `max_queued` items.
    ///
    /// On success returns the new depth; on rejection hands the item back.
    pub(crate) fn admit(&mut self, item: I, max_queued: Option<usize>) -> Result<usize, I> {
        if let Some(max) = max_queued {
            if self.items.len() >= max {
                return Err(item);
            }
        }
        self.items.push_back(item);
        self.peak_depth = self.peak_depth.max(self.items.len());
        Ok(self.items.len())
    }

    pub(crate) fn pop(&mut self) -> Option<I> {
        self.items.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn peak_depth(&self) -> usize {
        self.peak_depth
    }
}
