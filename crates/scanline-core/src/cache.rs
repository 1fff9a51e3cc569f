use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::frame::Frame;

struct Inner {
    frames: HashMap<i64, Arc<Frame>>,
    /// Most-recently-used at the front; freshened on `add`, left alone by `get`.
    freshness: VecDeque<i64>,
    /// Insertion order, used for range scans and kept strictly growing.
    ordered: Vec<i64>,
    max_bytes: u64,
}

/// A bounded cache of decoded frames with byte-budget eviction and LRU
/// freshening.
///
/// Every operation here takes the same lock for its whole body, including
/// `smallest_frame` and `total_bytes`: the original implementation only
/// locked part of those two, which could observe a torn view of the cache
/// under concurrent `add`/`remove`. Nothing in this reader needs that
/// weaker guarantee, so the stronger one is used throughout instead.
pub struct FrameCache {
    inner: Mutex<Inner>,
}

/// Eviction keeps at least this many entries regardless of the byte budget,
/// matching the original's floor so a very small `max_bytes` can't thrash
/// the cache down to nothing.
const MIN_RETAINED: usize = 20;

impl FrameCache {
    pub fn new(max_bytes: u64) -> Self {
        FrameCache {
            inner: Mutex::new(Inner {
                frames: HashMap::new(),
                freshness: VecDeque::new(),
                ordered: Vec::new(),
                max_bytes,
            }),
        }
    }

    pub fn unbounded() -> Self {
        FrameCache::new(0)
    }

    pub fn set_max_bytes_from_info(
        &self,
        number_of_frames: u64,
        width: u32,
        height: u32,
        sample_rate: u32,
        channels: u32,
    ) {
        let per_frame = height as u64 * width as u64 * 4 + sample_rate as u64 * channels as u64 * 4;
        let mut inner = self.inner.lock().unwrap();
        inner.max_bytes = number_of_frames * per_frame;
    }

    pub fn add(&self, frame: Arc<Frame>) {
        let mut inner = self.inner.lock().unwrap();
        let number = frame.number;

        if inner.frames.contains_key(&number) {
            inner.frames.insert(number, frame);
            Self::move_to_front(&mut inner.freshness, number);
            return;
        }

        inner.frames.insert(number, frame);
        inner.freshness.push_front(number);
        inner.ordered.push(number);
        Self::clean_up(&mut inner);
    }

    /// Returns the cached frame, if any. Does not freshen: the promotion
    /// and gap-filling sweeps read frames constantly and must not perturb
    /// the LRU order just by inspecting the cache.
    pub fn get(&self, number: i64) -> Option<Arc<Frame>> {
        let inner = self.inner.lock().unwrap();
        inner.frames.get(&number).cloned()
    }

    pub fn smallest_frame(&self) -> Option<Arc<Frame>> {
        let inner = self.inner.lock().unwrap();
        let smallest = inner.freshness.iter().copied().min()?;
        inner.frames.get(&smallest).cloned()
    }

    pub fn remove(&self, number: i64) {
        self.remove_range(number, number);
    }

    /// Removes every frame in `[lo, hi]` from all three structures. The
    /// original only dropped matching entries from the freshness deque in
    /// one pass and from the map/ordered list in a second pass; kept
    /// correct here by removing from all three in a single pass so the
    /// map's key set can never drift out of sync with the order lists.
    pub fn remove_range(&self, lo: i64, hi: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames.retain(|&n, _| !(lo..=hi).contains(&n));
        inner.freshness.retain(|&n| !(lo..=hi).contains(&n));
        inner.ordered.retain(|&n| !(lo..=hi).contains(&n));
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames.clear();
        inner.freshness.clear();
        inner.ordered.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> u64 {
        let inner = self.inner.lock().unwrap();
        inner.frames.values().map(|f| f.estimated_bytes()).sum()
    }

    fn move_to_front(freshness: &mut VecDeque<i64>, number: i64) {
        if let Some(pos) = freshness.iter().position(|&n| n == number) {
            freshness.remove(pos);
        }
        freshness.push_front(number);
    }

    fn clean_up(inner: &mut Inner) {
        if inner.max_bytes == 0 {
            return;
        }
        loop {
            let total: u64 = inner.frames.values().map(|f| f.estimated_bytes()).sum();
            if total <= inner.max_bytes || inner.freshness.len() <= MIN_RETAINED {
                break;
            }
            let Some(evict) = inner.freshness.pop_back() else {
                break;
            };
            inner.frames.remove(&evict);
            inner.ordered.retain(|&n| n != evict);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_frame(number: i64) -> Arc<Frame> {
        let mut f = Frame::blank(number, 44_100, 2);
        f.add_color(8, 8, [1, 2, 3, 4]);
        Arc::new(f)
    }

    #[test]
    fn add_then_get_round_trips() {
        let cache = FrameCache::unbounded();
        cache.add(dummy_frame(1));
        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
    }

    #[test]
    fn get_does_not_freshen() {
        let cache = FrameCache::unbounded();
        cache.add(dummy_frame(1));
        cache.add(dummy_frame(2));
        let _ = cache.get(1);
        // freshness order should still have 2 most-recently-added at front
        let smallest = cache.smallest_frame().unwrap();
        assert_eq!(smallest.number, 1);
    }

    #[test]
    fn remove_range_clears_all_three_structures() {
        let cache = FrameCache::unbounded();
        for n in 1..=5 {
            cache.add(dummy_frame(n));
        }
        cache.remove_range(2, 4);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(1).is_some());
        assert!(cache.get(5).is_some());
        assert!(cache.get(2).is_none());
        assert!(cache.smallest_frame().unwrap().number == 1);
    }

    #[test]
    fn eviction_respects_min_retained_floor() {
        let cache = FrameCache::new(1);
        for n in 1..=30 {
            cache.add(dummy_frame(n));
        }
        assert_eq!(cache.len(), MIN_RETAINED);
    }

    #[test]
    fn set_max_bytes_from_info_matches_formula() {
        let cache = FrameCache::unbounded();
        cache.set_max_bytes_from_info(10, 100, 50, 44_100, 2);
        let expected = 10 * (50 * 100 * 4 + 44_100 * 2 * 4);
        let inner = cache.inner.lock().unwrap();
        assert_eq!(inner.max_bytes, expected as u64);
    }

    #[test]
    fn clear_empties_everything() {
        let cache = FrameCache::unbounded();
        cache.add(dummy_frame(1));
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert!(cache.smallest_frame().is_none());
    }
}
