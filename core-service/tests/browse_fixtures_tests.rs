use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_desktop::TokioFileSystem;
use core_library::{LibraryError, PhotoId};
use core_request::RequestError;
use core_runtime::config::{CoreConfig, TransportMode};
use core_runtime::events::{CoreEvent, SearchEvent};
use core_service::{CoreError, PageFetch, PhotoBrowserService, ThumbnailFetch};
use tempfile::TempDir;

const DECLARED_TOTAL: u64 = 2_589_493;

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../core-library/tests/fixtures")
}

/// Recorded id of item `offset` on 1-based `page`.
fn recorded_id(page: u64, offset: u64) -> PhotoId {
    PhotoId::new((48_070_000_000 + page * 1000 + offset * 7).to_string())
}

async fn service_in(dir: &Path) -> PhotoBrowserService {
    let fs = Arc::new(TokioFileSystem::with_directories(
        dir.join("cache"),
        dir.join("data"),
    ));
    let config = CoreConfig::builder()
        .transport_mode(TransportMode::fixture(fixture_dir()))
        .file_system(fs)
        .build()
        .expect("fixture config");

    PhotoBrowserService::new(config).await.expect("service")
}

#[tokio::test]
async fn search_caches_first_page() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path()).await;
    let mut events = service.subscribe_events();

    let outcome = service.search("Cats").await.unwrap();

    assert_eq!(outcome, PageFetch::Stored { page: 1, item_count: 50 });
    assert_eq!(service.item_count().await, DECLARED_TOTAL);
    assert_eq!(service.page_count().await, 1);
    assert!(service.page_exists(1).await);
    assert!(!service.page_exists(3).await);
    assert_eq!(service.current_search().await.as_deref(), Some("Cats"));

    assert_eq!(service.photo_at(0).await.unwrap().id, recorded_id(1, 0));
    assert_eq!(service.photo_at(49).await.unwrap().id, recorded_id(1, 49));
    assert!(service.photo_at(50).await.is_none());

    let mut saw_started = false;
    let mut saw_cached = false;
    while let Some(Ok(event)) = events.try_recv() {
        match event {
            CoreEvent::Search(SearchEvent::Started { search_term }) => {
                assert_eq!(search_term, "Cats");
                saw_started = true;
            }
            CoreEvent::Search(SearchEvent::PageCached { page, total, .. }) => {
                assert_eq!(page, 1);
                assert_eq!(total, DECLARED_TOTAL);
                saw_cached = true;
            }
            _ => {}
        }
    }
    assert!(saw_started && saw_cached);
}

#[tokio::test]
async fn blank_search_term_is_refused() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path()).await;

    assert!(matches!(
        service.search("   ").await,
        Err(CoreError::EmptySearchTerm)
    ));
    assert!(matches!(
        service.fetch_page(1).await,
        Err(CoreError::NoActiveSearch)
    ));
}

#[tokio::test]
async fn prefetch_fills_pages_in_order() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path()).await;
    service.search("Cats").await.unwrap();

    let report = service.prefetch(149).await.unwrap();

    assert_eq!(report.stored, vec![2, 3]);
    assert!(report.is_complete());
    assert_eq!(service.page_count().await, 3);
    assert_eq!(service.photo_at(120).await.unwrap().id, recorded_id(3, 20));
    assert_eq!(service.item_count().await, DECLARED_TOTAL);

    // Nothing left to fetch for indexes already cached.
    let again = service.prefetch(100).await.unwrap();
    assert!(again.stored.is_empty() && again.failed.is_empty());
}

#[tokio::test]
async fn prefetch_reports_missing_recordings() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path()).await;
    service.search("Cats").await.unwrap();

    let report = service.prefetch(160).await.unwrap();

    assert_eq!(report.stored, vec![2, 3]);
    assert_eq!(report.failed.len(), 1);
    let (page, error) = &report.failed[0];
    assert_eq!(*page, 4);
    assert!(matches!(error, CoreError::Request(e) if e.is_not_found()));
    assert_eq!(service.page_count().await, 3);
    assert_eq!(service.in_flight_requests(), 0);
}

#[tokio::test]
async fn out_of_order_page_is_rejected() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path()).await;
    service.search("Cats").await.unwrap();

    let result = service.fetch_page(3).await;

    assert!(matches!(
        result,
        Err(CoreError::Library(LibraryError::OutOfOrder {
            expected: 2,
            received: 3
        }))
    ));
    assert_eq!(service.page_count().await, 1);

    assert_eq!(
        service.fetch_page(2).await.unwrap(),
        PageFetch::Stored { page: 2, item_count: 50 }
    );
    assert_eq!(service.fetch_page(2).await.unwrap(), PageFetch::Cached);
}

#[tokio::test]
async fn new_search_clears_previous_results() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path()).await;
    service.search("Cats").await.unwrap();
    service.prefetch(60).await.unwrap();

    let result = service.search("Dogs").await;

    assert!(matches!(result, Err(CoreError::Request(RequestError::NotFound(_)))));
    assert_eq!(service.page_count().await, 0);
    assert_eq!(service.item_count().await, 0);
    assert!(service.photo_at(0).await.is_none());
}

#[tokio::test]
async fn thumbnail_is_fetched_once_then_cached() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path()).await;
    service.search("Cats").await.unwrap();

    let fetched = match service.fetch_thumbnail(0).await.unwrap() {
        ThumbnailFetch::Fetched(bytes) => bytes,
        other => panic!("expected a fetch, got {:?}", other),
    };
    assert_eq!(&fetched[..2], &[0xFF, 0xD8]);

    assert_eq!(
        service.fetch_thumbnail(0).await.unwrap(),
        ThumbnailFetch::Cached(fetched)
    );
    assert!(service.photo_at(0).await.unwrap().has_thumbnail());
    assert!(!service.photo_at(1).await.unwrap().has_thumbnail());
    assert_eq!(service.page_count().await, 1);
    assert_eq!(service.item_count().await, DECLARED_TOTAL);
}

#[tokio::test]
async fn thumbnail_of_uncached_item_is_an_error() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path()).await;
    service.search("Cats").await.unwrap();

    assert!(matches!(
        service.fetch_thumbnail(75).await,
        Err(CoreError::NoItem(75))
    ));

    service.prefetch(75).await.unwrap();
    // Page 2 has no recorded image archive.
    assert!(matches!(
        service.fetch_thumbnail(75).await,
        Err(CoreError::Request(e)) if e.is_not_found()
    ));
    assert!(!service.photo_at(75).await.unwrap().has_thumbnail());
}

#[tokio::test]
async fn favorites_keep_their_own_copy() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path()).await;
    service.search("Cats").await.unwrap();

    let favorite = service.add_favorite_at(1).await.unwrap();
    service.fetch_thumbnail(1).await.unwrap();

    assert!(service.photo_at(1).await.unwrap().has_thumbnail());
    assert!(!service.favorite_at(0).await.unwrap().has_thumbnail());
    assert_eq!(service.favorite_at(0).await.unwrap(), favorite);
    assert!(service.favorite_at(1).await.is_none());
}

#[tokio::test]
async fn duplicate_favorites_are_removed_together() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path()).await;
    service.search("Cats").await.unwrap();

    let photo = service.photo_at(5).await.unwrap();
    service.add_favorite(photo.clone()).await;
    service.add_favorite(photo.clone()).await;
    service.add_favorite_at(6).await.unwrap();

    assert_eq!(service.favorites_count().await, 3);
    assert!(service.is_favorite(&photo.id).await);

    assert_eq!(service.remove_favorite(&photo.id).await, 2);
    assert!(!service.is_favorite(&photo.id).await);
    assert_eq!(service.favorites_count().await, 1);
    assert_eq!(service.remove_favorite(&photo.id).await, 0);
}
