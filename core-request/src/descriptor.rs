//! Resource descriptors
//!
//! A descriptor says what to fetch and whether the host should show a busy
//! indicator while it is fetched. Resolving it to a [`Target`] does no I/O,
//! so the dispatcher can use the target both as the in-flight key and as the
//! transport address.

use std::fmt;

use core_runtime::logging::redact_url;

use crate::endpoint::SearchEndpoint;

/// Comparable identity of a fetchable resource (its absolute URL).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Target(String);

impl Target {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn url(&self) -> &str {
        &self.0
    }

    /// The URL with any API key removed, for logs and events.
    pub fn redacted(&self) -> String {
        redact_url(&self.0)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Target").field(&self.redacted()).finish()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Typed arguments of a descriptor, handed back unchanged on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetArgs {
    /// One page of search results.
    Listing { search_term: String, page: u32 },
    /// The small image of the item at flat `index`, which sits on `page`.
    Thumbnail {
        search_term: String,
        page: u32,
        index: usize,
        url: Option<String>,
    },
}

impl TargetArgs {
    pub fn search_term(&self) -> &str {
        match self {
            TargetArgs::Listing { search_term, .. } | TargetArgs::Thumbnail { search_term, .. } => {
                search_term
            }
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            TargetArgs::Listing { page, .. } | TargetArgs::Thumbnail { page, .. } => *page,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    args: TargetArgs,
    show_busy: bool,
    context: Option<String>,
}

impl ResourceDescriptor {
    pub fn listing(search_term: impl Into<String>, page: u32) -> Self {
        Self::from_args(TargetArgs::Listing {
            search_term: search_term.into(),
            page,
        })
    }

    pub fn thumbnail(
        search_term: impl Into<String>,
        page: u32,
        index: usize,
        url: Option<String>,
    ) -> Self {
        Self::from_args(TargetArgs::Thumbnail {
            search_term: search_term.into(),
            page,
            index,
            url,
        })
    }

    pub fn from_args(args: TargetArgs) -> Self {
        Self {
            args,
            show_busy: false,
            context: None,
        }
    }

    /// Ask for busy start/end signals tagged with `context`.
    pub fn with_busy_indicator(mut self, context: impl Into<String>) -> Self {
        self.show_busy = true;
        self.context = Some(context.into());
        self
    }

    pub fn args(&self) -> &TargetArgs {
        &self.args
    }

    pub fn into_args(self) -> TargetArgs {
        self.args
    }

    pub fn shows_busy(&self) -> bool {
        self.show_busy
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// The resource this descriptor names, or `None` when an argument is
    /// missing (blank search term, page 0, item without an image URL).
    pub fn resolve_target(&self, endpoint: &SearchEndpoint) -> Option<Target> {
        match &self.args {
            TargetArgs::Listing { search_term, page } => {
                if search_term.trim().is_empty() || *page == 0 {
                    return None;
                }
                Some(Target::new(endpoint.listing_url(search_term, *page)))
            }
            TargetArgs::Thumbnail { url, .. } => url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(Target::new),
        }
    }
}
