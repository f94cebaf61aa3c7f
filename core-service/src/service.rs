//! Photo browser façade
//!
//! [`PhotoBrowserService`] owns one search's [`PageCache`], the favorites
//! list and the request dispatcher. Every cache and favorites mutation goes
//! through the service's locks; fetches themselves run on dispatcher tasks
//! and never hold a lock while waiting.
//!
//! A page or thumbnail fetched for a term other than the current one is
//! dropped on arrival instead of being written into the new search's cache.
//! Repeating the current term keeps any fetch already outstanding for it.
//!
//! Overlapping prefetches share pages: a page whose predecessor is still
//! being fetched by another caller waits for that caller to settle before
//! it is appended.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use bridge_traits::lifecycle::LifecycleObserver;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_library::{
    FavoritesStore, LibraryError, LoadOutcome, PageCache, Photo, PhotoId, SaveOutcome,
    RESULTS_PER_PAGE,
};
use core_request::{
    Dispatch, FixtureTransport, LiveTransport, RejectReason, RequestDispatcher,
    ResourceDescriptor, SearchEndpoint, Ticket, Transport,
};
use core_runtime::config::{CoreConfig, TransportMode, FAVORITES_FILE_NAME};
use core_runtime::events::{CoreEvent, EventBus, EventStream, FavoritesEvent, SearchEvent};
use core_runtime::logging::strip_path;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::error::{CoreError, Result};

const SEARCH_CONTEXT: &str = "search";
const PAGE_CONTEXT: &str = "page";

/// What became of a request for one listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFetch {
    /// The page was already cached; nothing was fetched.
    Cached,
    /// The page was fetched and appended to the cache.
    Stored { page: u32, item_count: usize },
    /// A fetch for the page is already outstanding.
    InFlight,
    /// The fetch finished after a newer search started and was dropped.
    Superseded,
}

/// What became of a request for one item's thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailFetch {
    Cached(Bytes),
    Fetched(Bytes),
    /// The item has no small image URL.
    NoImage,
    InFlight,
    Superseded,
}

/// Per-page results of a [`PhotoBrowserService::prefetch`] call.
#[derive(Debug, Default)]
pub struct PrefetchReport {
    /// Pages fetched and appended, in order.
    pub stored: Vec<u32>,
    /// Pages already cached, already in flight, or superseded.
    pub skipped: Vec<u32>,
    pub failed: Vec<(u32, CoreError)>,
}

impl PrefetchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Default)]
struct SearchState {
    term: Option<String>,
    cache: PageCache,
}

impl SearchState {
    fn is_current(&self, term: &str) -> bool {
        self.term.as_deref() == Some(term)
    }
}

type PageKey = (String, u32);

/// Listing pages fetched but not yet settled into the cache.
#[derive(Default)]
struct PendingPages {
    pages: StdMutex<HashSet<PageKey>>,
    settled: Notify,
}

impl PendingPages {
    fn lock(&self) -> MutexGuard<'_, HashSet<PageKey>> {
        self.pages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim(self: &Arc<Self>, term: &str, page: u32) -> PendingPage {
        let key = (term.to_string(), page);
        self.lock().insert(key.clone());
        PendingPage {
            owner: Arc::clone(self),
            key,
        }
    }

    fn contains(&self, term: &str, page: u32) -> bool {
        self.lock().contains(&(term.to_string(), page))
    }
}

/// Releases its page and wakes waiting successors when dropped.
struct PendingPage {
    owner: Arc<PendingPages>,
    key: PageKey,
}

impl Drop for PendingPage {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.key);
        self.owner.settled.notify_waiters();
    }
}

enum PendingListing {
    Ready(PageFetch),
    Waiting {
        ticket: Ticket,
        term: String,
        claim: PendingPage,
    },
}

struct ServiceInner {
    dispatcher: RequestDispatcher,
    search: RwLock<SearchState>,
    pending: Arc<PendingPages>,
    favorites: Mutex<FavoritesStore>,
    events: EventBus,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
}

/// Entry point for host applications.
///
/// Cloning is cheap; clones share the same cache, favorites and in-flight
/// registry.
#[derive(Clone)]
pub struct PhotoBrowserService {
    inner: Arc<ServiceInner>,
}

fn build_transport(config: &CoreConfig) -> Result<Arc<dyn Transport>> {
    match &config.transport_mode {
        TransportMode::Live => {
            let client = config
                .http_client
                .clone()
                .ok_or_else(|| CoreError::CapabilityMissing {
                    capability: "HttpClient".to_string(),
                    message: "Live transport requires an HTTP client".to_string(),
                })?;
            Ok(Arc::new(LiveTransport::new(client)))
        }
        TransportMode::Fixture { directory } => Ok(Arc::new(FixtureTransport::new(
            Arc::clone(&config.file_system),
            directory.clone(),
        ))),
    }
}

/// 1-based page holding flat `index`.
fn page_of(index: usize) -> u32 {
    u32::try_from(index / RESULTS_PER_PAGE)
        .unwrap_or(u32::MAX)
        .saturating_add(1)
}

impl PhotoBrowserService {
    /// Build the service and restore any archived favorites.
    ///
    /// A favorites archive that cannot be read is logged and reported on the
    /// event bus; it does not fail construction.
    pub async fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let transport = build_transport(&config)?;
        let dispatcher = RequestDispatcher::new(
            transport,
            SearchEndpoint::new(&config.search_api),
            events.clone(),
        );

        let favorites_path = match &config.favorites_path {
            Some(path) => path.clone(),
            None => config
                .file_system
                .get_data_directory()
                .await?
                .join(FAVORITES_FILE_NAME),
        };
        let fs: Arc<dyn FileSystemAccess> = Arc::clone(&config.file_system);
        let favorites = FavoritesStore::new(fs, favorites_path);

        let archive = favorites.archive_path().to_string_lossy().into_owned();
        info!(
            transport = dispatcher.transport_name(),
            favorites = strip_path(&archive),
            "Photo browser core initialized"
        );

        let service = Self {
            inner: Arc::new(ServiceInner {
                dispatcher,
                search: RwLock::new(SearchState::default()),
                pending: Arc::new(PendingPages::default()),
                favorites: Mutex::new(favorites),
                events,
                lifecycle_observer: config.lifecycle_observer.clone(),
            }),
        };

        if let Err(e) = service.load_favorites().await {
            warn!(error = %e, "Favorites were not restored at startup");
        }

        Ok(service)
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn in_flight_requests(&self) -> usize {
        self.inner.dispatcher.in_flight_count()
    }

    pub(crate) fn lifecycle_observer(&self) -> Option<Arc<dyn LifecycleObserver>> {
        self.inner.lifecycle_observer.clone()
    }

    fn emit(&self, event: CoreEvent) {
        let _ = self.inner.events.emit(event);
    }

    // ------------------------------------------------------------------
    // Search results
    // ------------------------------------------------------------------

    /// Start a new search: drop every cached page, then fetch page 1.
    ///
    /// If page 1 of the same term is still being fetched, that fetch is kept
    /// and this call returns [`PageFetch::InFlight`].
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str) -> Result<PageFetch> {
        let term = term.trim();
        if term.is_empty() {
            return Err(CoreError::EmptySearchTerm);
        }

        {
            let mut state = self.inner.search.write().await;
            state.cache.clear();
            state.term = Some(term.to_string());
        }

        info!("Search started");
        self.emit(CoreEvent::Search(SearchEvent::Started {
            search_term: term.to_string(),
        }));

        let pending = self.begin_listing(1, SEARCH_CONTEXT).await?;
        self.finish_listing(pending, 1).await
    }

    /// Fetch 1-based `page` of the current search.
    ///
    /// The page is only stored if it is the next one the cache expects.
    #[instrument(skip(self))]
    pub async fn fetch_page(&self, page: u32) -> Result<PageFetch> {
        let pending = self.begin_listing(page, PAGE_CONTEXT).await?;
        self.finish_listing(pending, page).await
    }

    /// Make sure every page up to the one holding `last_index` is cached.
    ///
    /// All missing pages are requested at once and stored in page order as
    /// they complete. Indexes past the declared total are clamped to it.
    #[instrument(skip(self))]
    pub async fn prefetch(&self, last_index: usize) -> Result<PrefetchReport> {
        let pages = {
            let state = self.inner.search.read().await;
            if state.term.is_none() {
                return Err(CoreError::NoActiveSearch);
            }
            let total = usize::try_from(state.cache.item_count()).unwrap_or(usize::MAX);
            let last_index = if total > 0 {
                last_index.min(total - 1)
            } else {
                last_index
            };
            state.cache.missing_pages_through(last_index)
        };

        let mut pending = Vec::new();
        for page in pages {
            pending.push((page, self.begin_listing(page, PAGE_CONTEXT).await));
        }

        let mut report = PrefetchReport::default();
        for (page, begun) in pending {
            let outcome = match begun {
                Ok(listing) => self.finish_listing(listing, page).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(PageFetch::Stored { .. }) => report.stored.push(page),
                Ok(_) => report.skipped.push(page),
                Err(e) => report.failed.push((page, e)),
            }
        }

        debug!(
            stored = report.stored.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Prefetch finished"
        );
        Ok(report)
    }

    async fn begin_listing(&self, page: u32, context: &str) -> Result<PendingListing> {
        // The read lock is held until the page is claimed so that a waiting
        // successor never sees it accepted but unclaimed.
        let state = self.inner.search.read().await;
        let term = state.term.clone().ok_or(CoreError::NoActiveSearch)?;
        if state.cache.page_exists(page) {
            return Ok(PendingListing::Ready(PageFetch::Cached));
        }

        let descriptor = ResourceDescriptor::listing(term.clone(), page).with_busy_indicator(context);
        match self.inner.dispatcher.dispatch(descriptor) {
            Dispatch::Accepted(ticket) => {
                let claim = self.inner.pending.claim(&term, page);
                drop(state);
                Ok(PendingListing::Waiting { ticket, term, claim })
            }
            Dispatch::Rejected(RejectReason::AlreadyInFlight(_)) => {
                debug!(page, "Page is already being fetched");
                Ok(PendingListing::Ready(PageFetch::InFlight))
            }
            Dispatch::Rejected(reason) => Err(CoreError::NotDispatched(reason)),
        }
    }

    async fn finish_listing(&self, pending: PendingListing, page: u32) -> Result<PageFetch> {
        let (ticket, term, claim) = match pending {
            PendingListing::Ready(outcome) => return Ok(outcome),
            PendingListing::Waiting { ticket, term, claim } => (ticket, term, claim),
        };

        let completion = ticket.wait().await;

        let mut state = loop {
            // Registered before the check so a release in between still wakes us.
            let settled = self.inner.pending.settled.notified();
            let state = self.inner.search.write().await;
            let blocked = page > 1
                && state.is_current(&term)
                && !state.cache.page_exists(page - 1)
                && self.inner.pending.contains(&term, page - 1);
            if !blocked {
                break state;
            }
            drop(state);
            debug!(page, "Waiting for the preceding page");
            settled.await;
        };

        if !state.is_current(&term) {
            debug!(page, search_term = %term, "Dropping page from a previous search");
            return Ok(PageFetch::Superseded);
        }

        let stored = completion
            .result
            .map_err(CoreError::from)
            .and_then(|body| {
                state
                    .cache
                    .store_page(&body, page)
                    .map(|listing| listing.photos().len())
                    .map_err(CoreError::from)
            });

        match stored {
            Ok(item_count) => {
                let total = state.cache.item_count();
                let cached = state.cache.cached_item_count();
                drop(state);
                drop(claim);

                self.emit(CoreEvent::Search(SearchEvent::PageCached {
                    search_term: term,
                    page,
                    item_count: cached,
                    total,
                }));
                Ok(PageFetch::Stored { page, item_count })
            }
            Err(e) => {
                drop(state);
                drop(claim);
                warn!(page, error = %e, "Page was not cached");
                self.emit(CoreEvent::Search(SearchEvent::PageRejected {
                    search_term: term,
                    page,
                    reason: e.to_string(),
                }));
                Err(e)
            }
        }
    }

    /// Thumbnail bytes of the item at flat `index`, fetching them on first use.
    #[instrument(skip(self))]
    pub async fn fetch_thumbnail(&self, index: usize) -> Result<ThumbnailFetch> {
        let descriptor = {
            let state = self.inner.search.read().await;
            let term = state.term.clone().ok_or(CoreError::NoActiveSearch)?;
            let photo = state.cache.item_at(index).ok_or(CoreError::NoItem(index))?;

            if let Some(bytes) = &photo.thumbnail {
                return Ok(ThumbnailFetch::Cached(bytes.clone()));
            }
            let Some(url) = photo.thumbnail_url() else {
                debug!(index, photo_id = %photo.id, "Item has no thumbnail URL");
                return Ok(ThumbnailFetch::NoImage);
            };

            ResourceDescriptor::thumbnail(term, page_of(index), index, Some(url.to_string()))
        };

        let ticket = match self.inner.dispatcher.dispatch(descriptor) {
            Dispatch::Accepted(ticket) => ticket,
            Dispatch::Rejected(RejectReason::AlreadyInFlight(_)) => {
                return Ok(ThumbnailFetch::InFlight)
            }
            Dispatch::Rejected(reason) => return Err(CoreError::NotDispatched(reason)),
        };

        let completion = ticket.wait().await;
        let term = completion.args.search_term().to_string();
        let bytes = completion.result?;

        let mut state = self.inner.search.write().await;
        if !state.is_current(&term) {
            debug!(index, "Dropping thumbnail from a previous search");
            return Ok(ThumbnailFetch::Superseded);
        }

        let photo_id = state.cache.item_at(index).map(|photo| photo.id.to_string());
        if state.cache.set_thumbnail(index, bytes.clone()) {
            drop(state);
            if let Some(photo_id) = photo_id {
                self.emit(CoreEvent::Search(SearchEvent::ThumbnailCached { index, photo_id }));
            }
        }

        Ok(ThumbnailFetch::Fetched(bytes))
    }

    /// Copy of the cached item at flat `index`.
    pub async fn photo_at(&self, index: usize) -> Option<Photo> {
        self.inner.search.read().await.cache.item_at(index).cloned()
    }

    /// Total results the remote service declared for the current search.
    pub async fn item_count(&self) -> u64 {
        self.inner.search.read().await.cache.item_count()
    }

    pub async fn page_count(&self) -> usize {
        self.inner.search.read().await.cache.page_count()
    }

    pub async fn page_exists(&self, page: u32) -> bool {
        self.inner.search.read().await.cache.page_exists(page)
    }

    pub async fn current_search(&self) -> Option<String> {
        self.inner.search.read().await.term.clone()
    }

    // ------------------------------------------------------------------
    // Favorites
    // ------------------------------------------------------------------

    /// Add a copy of `photo`. Duplicates are kept.
    pub async fn add_favorite(&self, photo: Photo) -> usize {
        let photo_id = photo.id.to_string();
        let count = {
            let mut favorites = self.inner.favorites.lock().await;
            favorites.add(photo);
            favorites.count()
        };

        self.emit(CoreEvent::Favorites(FavoritesEvent::Added { photo_id, count }));
        count
    }

    /// Add a copy of the cached item at flat `index`.
    ///
    /// Later changes to the cached item (such as its thumbnail arriving) do
    /// not reach the copy.
    pub async fn add_favorite_at(&self, index: usize) -> Result<Photo> {
        let photo = self.photo_at(index).await.ok_or(CoreError::NoItem(index))?;
        self.add_favorite(photo.clone()).await;
        Ok(photo)
    }

    /// Remove every favorite with `id`; returns how many were removed.
    pub async fn remove_favorite(&self, id: &PhotoId) -> usize {
        let (removed, count) = {
            let mut favorites = self.inner.favorites.lock().await;
            let removed = favorites.remove(id);
            (removed, favorites.count())
        };

        if removed > 0 {
            self.emit(CoreEvent::Favorites(FavoritesEvent::Removed {
                photo_id: id.to_string(),
                removed,
                count,
            }));
        }
        removed
    }

    pub async fn is_favorite(&self, id: &PhotoId) -> bool {
        self.inner.favorites.lock().await.exists(id)
    }

    pub async fn favorites(&self) -> Vec<Photo> {
        self.inner.favorites.lock().await.list().to_vec()
    }

    pub async fn favorite_at(&self, index: usize) -> Option<Photo> {
        self.inner.favorites.lock().await.get(index).cloned()
    }

    pub async fn favorites_count(&self) -> usize {
        self.inner.favorites.lock().await.count()
    }

    /// Write favorites to the archive. An empty list is not written.
    #[instrument(skip(self))]
    pub async fn save_favorites(&self) -> Result<SaveOutcome> {
        let result = self.inner.favorites.lock().await.save().await;
        match &result {
            Ok(SaveOutcome::Saved(count)) => {
                self.emit(CoreEvent::Favorites(FavoritesEvent::Saved { count: *count }));
            }
            Ok(SaveOutcome::Skipped) => {}
            Err(e) => self.report_persistence_failure("save", e),
        }
        result.map_err(CoreError::from)
    }

    /// Restore favorites from the archive if none are held in memory.
    #[instrument(skip(self))]
    pub async fn load_favorites(&self) -> Result<LoadOutcome> {
        let result = self.inner.favorites.lock().await.load().await;
        match &result {
            Ok(LoadOutcome::Restored(count)) => {
                self.emit(CoreEvent::Favorites(FavoritesEvent::Restored { count: *count }));
            }
            Ok(_) => {}
            Err(e) => self.report_persistence_failure("load", e),
        }
        result.map_err(CoreError::from)
    }

    fn report_persistence_failure(&self, operation: &str, error: &LibraryError) {
        warn!(operation, error = %error, "Favorites persistence failed");
        self.emit(CoreEvent::Favorites(FavoritesEvent::PersistenceFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        }));
    }
}

impl std::fmt::Debug for PhotoBrowserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoBrowserService")
            .field("transport", &self.inner.dispatcher.transport_name())
            .field("in_flight", &self.inner.dispatcher.in_flight_count())
            .finish()
    }
}
