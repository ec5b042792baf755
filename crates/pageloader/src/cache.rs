use std::collections::HashMap;

use crate::PageBuffer;

/// Decoded pages keyed by index. When over capacity the pages farthest from
/// the focus page are dropped first.
pub(crate) struct PageCache {
    entries: HashMap<usize, PageBuffer>,
    capacity: usize,
    focus: usize,
}

impl PageCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            focus: 0,
        }
    }

    pub(crate) fn get(&self, page: usize) -> Option<&PageBuffer> {
        self.entries.get(&page)
    }

    pub(crate) fn contains(&self, page: usize) -> bool {
        self.entries.contains_key(&page)
    }

    pub(crate) fn insert(&mut self, page: usize, buffer: PageBuffer) {
        self.entries.insert(page, buffer);
        self.evict();
    }

    pub(crate) fn set_focus(&mut self, page: usize) {
        self.focus = page;
        self.evict();
    }

    /// Drops every entry and returns the evicted pages, nearest to the focus first.
    pub(crate) fn clear(&mut self) -> Vec<usize> {
        let focus = self.focus;
        let mut pages: Vec<usize> = self.entries.drain().map(|(page, _)| page).collect();
        pages.sort_by_key(|page| (page.abs_diff(focus), *page));
        pages
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let focus = self.focus;
            let victim = self
                .entries
                .keys()
                .copied()
                .max_by_key(|page| (page.abs_diff(focus), *page));
            match victim {
                Some(page) => {
                    self.entries.remove(&page);
                    tracing::trace!(page, focus, "evicted page from cache");
                }
                None => break,
            }
        }
    }
}
