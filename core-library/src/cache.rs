//! Paginated result cache
//!
//! Holds the listing pages of exactly one search, in page order. A flat item
//! index `i` lives on storage page `i / RESULTS_PER_PAGE` at offset
//! `i % RESULTS_PER_PAGE`. Pages are only ever appended, and only when they
//! are the next page expected; every rejected store leaves the cache as it
//! was.

use bytes::Bytes;
use std::ops::RangeInclusive;
use tracing::{debug, warn};

use crate::error::{LibraryError, Result};
use crate::models::{Photo, PhotoListPage, ResultsEnvelope, RESULTS_PER_PAGE};

/// Page-indexed cache of listing results.
///
/// The cache carries no search key of its own; callers must [`clear`] it
/// before reusing it for a different search.
///
/// [`clear`]: PageCache::clear
#[derive(Debug, Default)]
pub struct PageCache {
    pages: Vec<PhotoListPage>,
}

/// Storage position of a flat index.
fn locate(flat_index: usize) -> (usize, usize) {
    (flat_index / RESULTS_PER_PAGE, flat_index % RESULTS_PER_PAGE)
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw listing payload and append it as page `for_page` (1-based).
    ///
    /// Fails without mutating the cache when the payload does not decode,
    /// the envelope's `stat` is not `ok`, the envelope carries no page, or
    /// `for_page` is not `page_count() + 1`.
    pub fn store_page(&mut self, payload: &[u8], for_page: u32) -> Result<&PhotoListPage> {
        let envelope: ResultsEnvelope = serde_json::from_slice(payload).map_err(|e| {
            warn!(page = for_page, error = %e, "Failed to decode listing payload");
            LibraryError::Decode(e)
        })?;

        if !envelope.is_ok() {
            warn!(
                page = for_page,
                stat = %envelope.stat,
                code = ?envelope.code,
                "Listing envelope reported failure"
            );
            return Err(LibraryError::RemoteStatus {
                code: envelope.code,
                message: envelope.message.unwrap_or(envelope.stat),
            });
        }

        let expected = self.next_page();
        if for_page != expected {
            debug!(expected, received = for_page, "Rejecting out-of-order page");
            return Err(LibraryError::OutOfOrder {
                expected,
                received: for_page,
            });
        }

        let page = envelope.photos.ok_or(LibraryError::MissingPage)?;
        debug!(
            page = for_page,
            items = page.photos().len(),
            total = %page.total,
            "Cached listing page"
        );
        self.pages.push(page);

        Ok(&self.pages[self.pages.len() - 1])
    }

    /// Declared total of the first cached page, or 0 with nothing cached.
    pub fn item_count(&self) -> u64 {
        self.pages.first().map_or(0, PhotoListPage::total_count)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 1-based number of the page the next store must carry.
    pub fn next_page(&self) -> u32 {
        u32::try_from(self.pages.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }

    /// Whether 1-based `page_number` is cached. Page 0 never exists.
    pub fn page_exists(&self, page_number: u32) -> bool {
        page_number >= 1 && (page_number as usize - 1) < self.pages.len()
    }

    /// Number of items actually held across cached pages.
    pub fn cached_item_count(&self) -> usize {
        self.pages.iter().map(|page| page.photos().len()).sum()
    }

    pub fn item_at(&self, flat_index: usize) -> Option<&Photo> {
        let (page, offset) = locate(flat_index);
        self.pages.get(page)?.photo.as_ref()?.get(offset)
    }

    /// Attach thumbnail bytes to the item at `flat_index`.
    ///
    /// Returns `false`, changing nothing, when no item is cached there.
    pub fn set_thumbnail(&mut self, flat_index: usize, bytes: Bytes) -> bool {
        let (page, offset) = locate(flat_index);
        let slot = self
            .pages
            .get_mut(page)
            .and_then(|page| page.photo.as_mut())
            .and_then(|photos| photos.get_mut(offset));

        match slot {
            Some(photo) => {
                photo.thumbnail = Some(bytes);
                true
            }
            None => false,
        }
    }

    /// 1-based page numbers that must be fetched, in order, before
    /// `last_index` is addressable. Empty when already cached.
    pub fn missing_pages_through(&self, last_index: usize) -> RangeInclusive<u32> {
        let (page, _) = locate(last_index);
        let last_needed = u32::try_from(page).unwrap_or(u32::MAX).saturating_add(1);
        self.next_page()..=last_needed
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(page: u32, items: usize, total: &str) -> Vec<u8> {
        let photos: Vec<_> = (0..items)
            .map(|i| {
                json!({
                    "id": format!("{}-{}", page, i),
                    "title": format!("photo {}", i),
                    "url_s": format!("https://img.example/{}/{}_s.jpg", page, i),
                })
            })
            .collect();
        serde_json::to_vec(&json!({
            "stat": "ok",
            "photos": {
                "page": page, "pages": 3, "perpage": 50, "total": total,
                "photo": photos,
            }
        }))
        .unwrap()
    }

    fn cache_with_pages(count: u32) -> PageCache {
        let mut cache = PageCache::new();
        for page in 1..=count {
            cache
                .store_page(&listing(page, RESULTS_PER_PAGE, "2589493"), page)
                .unwrap();
        }
        cache
    }

    #[test]
    fn test_empty_cache() {
        let cache = PageCache::new();

        assert_eq!(cache.item_count(), 0);
        assert_eq!(cache.page_count(), 0);
        assert!(!cache.page_exists(1));
        assert!(cache.item_at(0).is_none());
    }

    #[test]
    fn test_single_page_reports_declared_total() {
        let cache = cache_with_pages(1);

        assert_eq!(cache.item_count(), 2_589_493);
        assert_eq!(cache.page_count(), 1);
        assert!(cache.page_exists(1));
        assert!(!cache.page_exists(3));
        assert!(!cache.page_exists(0));
        assert_eq!(cache.cached_item_count(), 50);
    }

    #[test]
    fn test_flat_index_maps_to_page_and_offset() {
        let cache = cache_with_pages(2);

        for index in [0, 1, 49, 50, 73, 99] {
            let item = cache.item_at(index).unwrap();
            let expected = format!("{}-{}", index / 50 + 1, index % 50);
            assert_eq!(item.id.as_str(), expected);
        }
        assert!(cache.item_at(100).is_none());
    }

    #[test]
    fn test_short_page_lookup_fails_softly() {
        let mut cache = PageCache::new();
        cache.store_page(&listing(1, 10, "10"), 1).unwrap();

        assert!(cache.item_at(9).is_some());
        assert!(cache.item_at(10).is_none());
        assert!(cache.item_at(49).is_none());
    }

    #[test]
    fn test_out_of_order_and_duplicate_pages_rejected() {
        let mut cache = cache_with_pages(1);

        let skipped = cache.store_page(&listing(3, 50, "2589493"), 3);
        assert!(matches!(
            skipped,
            Err(LibraryError::OutOfOrder {
                expected: 2,
                received: 3
            })
        ));

        let duplicate = cache.store_page(&listing(1, 50, "2589493"), 1);
        assert!(matches!(duplicate, Err(LibraryError::OutOfOrder { .. })));

        assert_eq!(cache.page_count(), 1);
        cache.store_page(&listing(2, 50, "2589493"), 2).unwrap();
        assert_eq!(cache.page_count(), 2);
    }

    #[test]
    fn test_page_zero_is_rejected() {
        let mut cache = PageCache::new();

        let result = cache.store_page(&listing(0, 50, "100"), 0);
        assert!(matches!(result, Err(LibraryError::OutOfOrder { .. })));
        assert_eq!(cache.page_count(), 0);
    }

    #[test]
    fn test_undecodable_payload_rejected() {
        let mut cache = PageCache::new();

        let result = cache.store_page(b"{ not json", 1);
        assert!(matches!(result, Err(LibraryError::Decode(_))));
        assert!(result.unwrap_err().is_rejection());
        assert_eq!(cache.page_count(), 0);
    }

    #[test]
    fn test_failed_status_rejected() {
        let mut cache = PageCache::new();
        let payload = br#"{"stat":"fail","code":100,"message":"Invalid API Key (Key has invalid format)"}"#;

        match cache.store_page(payload, 1) {
            Err(LibraryError::RemoteStatus { code, message }) => {
                assert_eq!(code, Some(100));
                assert!(message.starts_with("Invalid API Key"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(cache.page_count(), 0);
    }

    #[test]
    fn test_ok_envelope_without_page_rejected() {
        let mut cache = PageCache::new();

        let result = cache.store_page(br#"{"stat":"ok"}"#, 1);
        assert!(matches!(result, Err(LibraryError::MissingPage)));
        assert_eq!(cache.page_count(), 0);
    }

    #[test]
    fn test_unparsable_total_counts_as_zero() {
        let mut cache = PageCache::new();
        cache.store_page(&listing(1, 5, "lots"), 1).unwrap();

        assert_eq!(cache.page_count(), 1);
        assert_eq!(cache.item_count(), 0);
    }

    #[test]
    fn test_set_thumbnail_mutates_only_target() {
        let mut cache = cache_with_pages(2);

        assert!(cache.set_thumbnail(73, Bytes::from_static(b"jpeg")));

        assert_eq!(
            cache.item_at(73).unwrap().thumbnail,
            Some(Bytes::from_static(b"jpeg"))
        );
        assert!(cache.item_at(72).unwrap().thumbnail.is_none());
        assert!(cache.item_at(23).unwrap().thumbnail.is_none());
        assert_eq!(cache.page_count(), 2);
        assert_eq!(cache.item_count(), 2_589_493);
    }

    #[test]
    fn test_set_thumbnail_on_uncached_index_is_noop() {
        let mut cache = cache_with_pages(1);

        assert!(!cache.set_thumbnail(120, Bytes::from_static(b"jpeg")));
        assert_eq!(cache.page_count(), 1);
        assert_eq!(cache.cached_item_count(), 50);
    }

    #[test]
    fn test_missing_pages_through() {
        let empty = PageCache::new();
        assert_eq!(empty.missing_pages_through(0), 1..=1);
        assert_eq!(empty.missing_pages_through(120), 1..=3);

        let cache = cache_with_pages(2);
        assert!(cache.missing_pages_through(99).is_empty());
        assert_eq!(cache.missing_pages_through(100), 3..=3);
        assert_eq!(cache.missing_pages_through(160), 3..=4);
    }

    #[test]
    fn test_clear_discards_pages() {
        let mut cache = cache_with_pages(3);
        cache.clear();

        assert_eq!(cache.page_count(), 0);
        assert_eq!(cache.item_count(), 0);
        cache.store_page(&listing(1, 50, "7"), 1).unwrap();
        assert_eq!(cache.item_count(), 7);
    }
}
