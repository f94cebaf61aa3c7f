//! Search API endpoint URLs.

use core_runtime::config::SearchApiConfig;

const SEARCH_METHOD: &str = "flickr.photos.search";
const EXTRAS: &str = "url_s,url_m,date_upload,views";

/// Builds listing URLs for the remote search API.
#[derive(Clone, PartialEq, Eq)]
pub struct SearchEndpoint {
    base_url: String,
    api_key: Option<String>,
    page_size: u32,
}

impl SearchEndpoint {
    pub fn new(config: &SearchApiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            page_size: config.page_size,
        }
    }

    /// URL of 1-based `page` of results for `search_term`.
    ///
    /// The term is percent-encoded here; callers pass it as typed.
    pub fn listing_url(&self, search_term: &str, page: u32) -> String {
        format!(
            "{}?method={}&api_key={}&text={}&extras={}&format=json&nojsoncallback=1\
             &sort=relevance&per_page={}&page={}",
            self.base_url,
            SEARCH_METHOD,
            urlencoding::encode(self.api_key.as_deref().unwrap_or_default()),
            urlencoding::encode(search_term),
            EXTRAS,
            self.page_size,
            page
        )
    }
}

impl std::fmt::Debug for SearchEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEndpoint")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}
