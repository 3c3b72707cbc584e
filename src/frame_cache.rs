//! Bounded cache of encoded video frames.
//!
//! The cache is owned by whichever component requests frames; there is no
//! process-wide instance. It is bounded both by entry count and by total
//! bytes, and evicts the least recently used frame first. A single frame
//! larger than the byte budget is returned to the caller but never cached.

use anyhow::Result;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::source::SourceLocation;

pub const DEFAULT_MAX_ENTRIES: usize = 256;
pub const DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub video_key: String,
    pub frame_index: u32,
}

impl FrameKey {
    pub fn new(video_key: impl Into<String>, frame_index: u32) -> Self {
        Self {
            video_key: video_key.into(),
            frame_index,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct FrameCache {
    /// Capacity is the entry bound; the byte bound is enforced on insert.
    frames: LruCache<FrameKey, Arc<[u8]>>,
    max_bytes: usize,
    total_bytes: usize,
    stats: FrameCacheStats,
}

impl FrameCache {
    /// Bounds of zero are raised to one entry / one byte.
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            frames: LruCache::new(capacity),
            max_bytes: max_bytes.max(1),
            total_bytes: 0,
            stats: FrameCacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &FrameKey) -> Option<Arc<[u8]>> {
        match self.frames.get(key) {
            Some(frame) => {
                self.stats.hits += 1;
                Some(frame.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or replace a frame, evicting as needed.
    pub fn insert(&mut self, key: FrameKey, bytes: Vec<u8>) -> Arc<[u8]> {
        let frame: Arc<[u8]> = Arc::from(bytes);
        self.remove(&key);
        if frame.len() > self.max_bytes {
            log::debug!(
                "frame cache: {} frame {} ({} bytes) exceeds budget; not cached",
                key.video_key,
                key.frame_index,
                frame.len()
            );
            return frame;
        }

        while self.frames.len() >= self.frames.cap().get()
            || self.total_bytes + frame.len() > self.max_bytes
        {
            let Some((_, evicted)) = self.frames.pop_lru() else {
                break;
            };
            self.total_bytes -= evicted.len();
            self.stats.evictions += 1;
        }

        self.total_bytes += frame.len();
        self.frames.put(key, frame.clone());
        frame
    }

    /// Cached frame, or the result of `fetch` (cached on success).
    pub fn get_or_fetch<F>(&mut self, key: &FrameKey, fetch: F) -> Result<Arc<[u8]>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        if let Some(frame) = self.get(key) {
            return Ok(frame);
        }
        let bytes = fetch()?;
        Ok(self.insert(key.clone(), bytes))
    }

    pub fn remove(&mut self, key: &FrameKey) -> Option<Arc<[u8]>> {
        let frame = self.frames.pop(key)?;
        self.total_bytes -= frame.len();
        Some(frame)
    }

    /// Membership check; does not refresh recency.
    pub fn contains(&self, key: &FrameKey) -> bool {
        self.frames.contains(key)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn stats(&self) -> FrameCacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.total_bytes = 0;
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_MAX_BYTES)
    }
}

/// Location of an extracted frame: `<frame_dir>/<video_key>/frame_<NNNNNN>.jpg`.
pub fn frame_location(frame_dir: &SourceLocation, key: &FrameKey) -> SourceLocation {
    frame_dir.join(&format!("{}/frame_{:06}.jpg", key.video_key, key.frame_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::path::PathBuf;

    fn key(frame: u32) -> FrameKey {
        FrameKey::new("survey_0412", frame)
    }

    #[test]
    fn evicts_least_recently_used_by_count() {
        let mut cache = FrameCache::new(2, 1024);
        cache.insert(key(1), vec![1; 10]);
        cache.insert(key(2), vec![2; 10]);
        assert!(cache.get(&key(1)).is_some());
        cache.insert(key(3), vec![3; 10]);

        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn evicts_to_stay_within_byte_budget() {
        let mut cache = FrameCache::new(10, 100);
        cache.insert(key(1), vec![0; 40]);
        cache.insert(key(2), vec![0; 40]);
        cache.insert(key(3), vec![0; 40]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.total_bytes(), 80);
        assert!(!cache.contains(&key(1)));
    }

    #[test]
    fn hit_protects_frame_from_byte_eviction() {
        let mut cache = FrameCache::new(10, 100);
        cache.insert(key(1), vec![0; 40]);
        cache.insert(key(2), vec![0; 40]);
        assert!(cache.get(&key(1)).is_some());
        cache.insert(key(3), vec![0; 40]);

        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert_eq!(cache.total_bytes(), 80);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn contains_does_not_refresh_recency() {
        let mut cache = FrameCache::new(2, 1024);
        cache.insert(key(1), vec![1; 10]);
        cache.insert(key(2), vec![2; 10]);
        assert!(cache.contains(&key(1)));
        cache.insert(key(3), vec![3; 10]);

        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(2)));
        assert_eq!(cache.total_bytes(), 20);
    }

    #[test]
    fn zero_bounds_still_hold_one_frame() {
        let mut cache = FrameCache::new(0, 0);
        cache.insert(key(1), vec![9]);
        cache.insert(key(2), vec![9]);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key(2)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn oversized_frame_returned_but_not_cached() {
        let mut cache = FrameCache::new(10, 16);
        let frame = cache.insert(key(1), vec![7; 32]);
        assert_eq!(frame.len(), 32);
        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn replacing_a_frame_updates_byte_total() {
        let mut cache = FrameCache::new(10, 100);
        cache.insert(key(1), vec![0; 40]);
        cache.insert(key(1), vec![0; 10]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), 10);
    }

    #[test]
    fn get_or_fetch_only_fetches_on_miss() -> Result<()> {
        let mut cache = FrameCache::default();
        let mut fetches = 0;
        for _ in 0..3 {
            cache.get_or_fetch(&key(5), || {
                fetches += 1;
                Ok(vec![1, 2, 3])
            })?;
        }
        assert_eq!(fetches, 1);
        assert_eq!(cache.stats().hits, 2);
        assert_eq!(cache.stats().misses, 1);

        let err = cache.get_or_fetch(&key(6), || Err(anyhow!("frame missing")));
        assert!(err.is_err());
        assert!(!cache.contains(&key(6)));
        Ok(())
    }

    #[test]
    fn frame_location_is_zero_padded() {
        let dir = SourceLocation::File(PathBuf::from("frames"));
        assert_eq!(
            frame_location(&dir, &key(42)),
            SourceLocation::File(PathBuf::from("frames/survey_0412/frame_000042.jpg"))
        );
    }
}
