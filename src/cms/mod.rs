//! Content client boundary.
//!
//! Everything the generator knows about the CMS goes through
//! [`ContentClient`]. The driver and the paginator receive a client by
//! reference; there is no process-wide instance. [`HttpContentClient`] talks
//! to a Prismic-style REST API, and tests use an in-memory implementation.
//!
//! Every call returns a typed [`CmsError`] instead of panicking, so callers
//! can tell a missing document ([`CmsError::NotFound`]) apart from a broken
//! network ([`CmsError::is_network`]).

pub mod http;
pub mod rich_text;

pub use http::HttpContentClient;

use crate::types::{Document, SearchResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status { status: u16, url: String },
    #[error("no {doc_type} document with uid '{uid}'")]
    NotFound { doc_type: String, uid: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CmsError {
    /// True for failures worth retrying: transport errors, timeouts, 5xx.
    pub fn is_network(&self) -> bool {
        match self {
            CmsError::Request(_) => true,
            CmsError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CmsError::NotFound { .. })
    }
}

/// Sort direction over a document field, e.g. `[document.first_publication_date desc]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub field: String,
    pub descending: bool,
}

impl Ordering {
    pub fn by_publication_date(descending: bool) -> Self {
        Self {
            field: "document.first_publication_date".to_string(),
            descending,
        }
    }

    /// Render as the API's `orderings` parameter.
    pub fn to_param(&self) -> String {
        if self.descending {
            format!("[{} desc]", self.field)
        } else {
            format!("[{}]", self.field)
        }
    }
}

/// A search over one document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub doc_type: String,
    /// Field whitelist (`posts.title`, ...). Empty means "all fields".
    pub fetch: Vec<String>,
    pub page_size: u32,
    /// Content ref; `None` means the published (master) ref.
    pub reference: Option<String>,
    /// Only return documents that come after this document id in `ordering`.
    pub after: Option<String>,
    pub ordering: Option<Ordering>,
}

impl Query {
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            fetch: Vec::new(),
            page_size: 20,
            reference: None,
            after: None,
            ordering: None,
        }
    }

    pub fn fetch<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    pub fn reference(mut self, reference: Option<&str>) -> Self {
        self.reference = reference.map(str::to_string);
        self
    }

    pub fn after(mut self, id: impl Into<String>) -> Self {
        self.after = Some(id.into());
        self
    }

    pub fn ordering(mut self, ordering: Ordering) -> Self {
        self.ordering = Some(ordering);
        self
    }
}

/// The query interface of the headless CMS.
///
/// `Sync` because the driver fans detail-page generation out over rayon.
pub trait ContentClient: Sync {
    /// Run a search and return the first page of results.
    fn query(&self, query: &Query) -> Result<SearchResponse, CmsError>;

    /// Fetch one document by its UID, or [`CmsError::NotFound`].
    fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
        reference: Option<&str>,
    ) -> Result<Document, CmsError>;

    /// Fetch a page by the absolute `next_page` URL of a previous response.
    fn fetch_page(&self, url: &str) -> Result<SearchResponse, CmsError>;
}
