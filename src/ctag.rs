//! Reusable integer pool backing consumer tags, mirroring the `IDPool`
//! used by the original router to render `zctag-<n>` handles.

use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub(crate) struct CtagPool {
    next: u64,
    free: BTreeSet<u64>,
}

impl CtagPool {
    pub(crate) fn new() -> CtagPool {
        CtagPool::default()
    }

    /// Allocates a consumer tag, preferring the lowest freed id before
    /// minting a new one.
    pub(crate) fn acquire(&mut self) -> String {
        let id = if let Some(&id) = self.free.iter().next() {
            self.free.remove(&id);
            id
        } else {
            let id = self.next;
            self.next += 1;
            id
        };
        render(id)
    }

    /// Returns a previously acquired tag's id to the free list so it can
    /// be recycled by a future `acquire`.
    pub(crate) fn release(&mut self, tag: &str) {
        if let Some(id) = parse(tag) {
            self.free.insert(id);
        }
    }
}

fn render(id: u64) -> String {
    format!("zctag-{}", id)
}

fn parse(tag: &str) -> Option<u64> {
    tag.strip_prefix("zctag-")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mints_sequential_tags() {
        let mut pool = CtagPool::new();
        assert_eq!(pool.acquire(), "zctag-0");
        assert_eq!(pool.acquire(), "zctag-1");
    }

    #[test]
    fn recycles_released_ids_before_minting_new_ones() {
        let mut pool = CtagPool::new();
        let a = pool.acquire();
        let _b = pool.acquire();
        pool.release(&a);
        assert_eq!(pool.acquire(), "zctag-0");
        assert_eq!(pool.acquire(), "zctag-2");
    }
}
