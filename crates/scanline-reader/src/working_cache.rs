// Frames under construction: each is mutated by whichever packet processor
// currently owns it, coordinated through `Bookkeeping` rather than a
// per-frame lock ordering. Unlike `scanline_core::FrameCache`, this cache
// has no byte budget or LRU eviction — entries live here only for the
// short window between a packet's decode and the frame's promotion to
// `final_cache`, so its size is naturally bounded by decode parallelism.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use scanline_core::Frame;

pub(crate) struct WorkingCache {
    frames: Mutex<HashMap<i64, Arc<Mutex<Frame>>>>,
}

impl WorkingCache {
    pub(crate) fn new() -> Self {
        WorkingCache {
            frames: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the in-progress frame for `number`, creating a blank one
    /// (matching the stream's sample rate and channel count) if this is
    /// the first packet to reach it.
    pub(crate) fn get_or_create(&self, number: i64, sample_rate: i32, channels: i32) -> Arc<Mutex<Frame>> {
        self.frames
            .lock()
            .unwrap()
            .entry(number)
            .or_insert_with(|| Arc::new(Mutex::new(Frame::blank(number, sample_rate, channels))))
            .clone()
    }

    pub(crate) fn get(&self, number: i64) -> Option<Arc<Mutex<Frame>>> {
        self.frames.lock().unwrap().get(&number).cloned()
    }

    pub(crate) fn remove(&self, number: i64) -> Option<Arc<Mutex<Frame>>> {
        self.frames.lock().unwrap().remove(&number)
    }

    pub(crate) fn smallest_number(&self) -> Option<i64> {
        self.frames.lock().unwrap().keys().copied().min()
    }

    pub(crate) fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let cache = WorkingCache::new();
        let a = cache.get_or_create(1, 44_100, 2);
        let b = cache.get_or_create(1, 44_100, 2);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn smallest_number_tracks_minimum_key() {
        let cache = WorkingCache::new();
        cache.get_or_create(5, 44_100, 2);
        cache.get_or_create(2, 44_100, 2);
        cache.get_or_create(9, 44_100, 2);
        assert_eq!(cache.smallest_number(), Some(2));
    }

    #[test]
    fn remove_drops_the_entry() {
        let cache = WorkingCache::new();
        cache.get_or_create(1, 44_100, 2);
        assert!(cache.remove(1).is_some());
        assert!(cache.get(1).is_none());
    }
}
