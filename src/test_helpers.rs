//! Shared test utilities for the quill-blog test suite.
//!
//! Provides a document builder and [`MemoryClient`], an in-memory
//! [`ContentClient`] that honours page size, `after`, ordering and preview
//! refs the way the real API does, and counts every call so tests can assert
//! that no request was made.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let client = MemoryClient::new(vec![
//!     post("first", "2021-01-01").title("First").build(),
//!     post("second", "2021-02-01").title("Second").build(),
//! ]);
//! let page = client.query(&Query::new("posts").page_size(1)).unwrap();
//! assert!(page.next_page.is_some());
//! ```

use crate::cms::{CmsError, ContentClient, Query};
use crate::types::{Banner, ContentSection, Document, PostData, RichTextBlock, SearchResponse};
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

// =========================================================================
// Document builder
// =========================================================================

pub struct PostBuilder {
    doc: Document,
}

/// Start a `posts` document with the given UID, published at noon UTC on
/// `date` (`YYYY-MM-DD`). The document id is `id-{uid}`.
pub fn post(uid: &str, date: &str) -> PostBuilder {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap_or_else(|e| panic!("bad fixture date '{date}': {e}"));
    let published = Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap());
    PostBuilder {
        doc: Document {
            id: format!("id-{uid}"),
            uid: Some(uid.to_string()),
            doc_type: Some("posts".to_string()),
            first_publication_date: Some(published),
            last_publication_date: Some(published),
            data: PostData::default(),
        },
    }
}

impl PostBuilder {
    pub fn title(mut self, title: &str) -> Self {
        self.doc.data.title = Some(title.to_string());
        self
    }

    pub fn subtitle(mut self, subtitle: &str) -> Self {
        self.doc.data.subtitle = Some(subtitle.to_string());
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.doc.data.author = Some(author.to_string());
        self
    }

    pub fn banner(mut self, url: &str) -> Self {
        self.doc.data.banner = Some(Banner {
            url: Some(url.to_string()),
            alt: None,
        });
        self
    }

    /// Append a section whose body is one paragraph per entry.
    pub fn section(mut self, heading: &str, paragraphs: &[&str]) -> Self {
        let section = ContentSection {
            heading: Some(heading.to_string()),
            body: paragraphs
                .iter()
                .map(|p| RichTextBlock::paragraph(*p))
                .collect(),
        };
        self.doc
            .data
            .content
            .get_or_insert_with(Vec::new)
            .push(section);
        self
    }

    pub fn build(self) -> Document {
        self.doc
    }
}

// =========================================================================
// In-memory content client
// =========================================================================

pub struct MemoryClient {
    published: Vec<Document>,
    previews: HashMap<String, Vec<Document>>,
    cursors: Mutex<HashMap<String, (Query, usize)>>,
    calls: AtomicUsize,
    refs_seen: Mutex<Vec<Option<String>>>,
    offline: AtomicBool,
}

impl MemoryClient {
    /// Documents are kept in the given order, which stands in for the CMS
    /// default ordering.
    pub fn new(published: Vec<Document>) -> Self {
        Self {
            published,
            previews: HashMap::new(),
            cursors: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            refs_seen: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Serve `docs` instead of the published set when queried with `reference`.
    pub fn with_preview(mut self, reference: &str, docs: Vec<Document>) -> Self {
        self.previews.insert(reference.to_string(), docs);
        self
    }

    /// Number of calls made so far, of any kind.
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// Refs passed to `query`/`get_by_uid`, in call order.
    pub fn refs_seen(&self) -> Vec<Option<String>> {
        self.refs_seen.lock().unwrap().clone()
    }

    /// While offline, every call fails with a 503.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    fn enter(&self, url: &str) -> Result<(), CmsError> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(CmsError::Status {
                status: 503,
                url: url.to_string(),
            });
        }
        Ok(())
    }

    fn documents(&self, reference: Option<&str>) -> &[Document] {
        reference
            .and_then(|r| self.previews.get(r))
            .unwrap_or(&self.published)
    }

    fn matching(&self, query: &Query) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents(query.reference.as_deref())
            .iter()
            .filter(|d| d.doc_type.as_deref() == Some(query.doc_type.as_str()))
            .cloned()
            .collect();
        if let Some(ordering) = &query.ordering {
            docs.sort_by_key(|d| d.first_publication_date);
            if ordering.descending {
                docs.reverse();
            }
        }
        if let Some(after) = &query.after {
            docs = match docs.iter().position(|d| &d.id == after) {
                Some(pos) => docs.split_off(pos + 1),
                None => Vec::new(),
            };
        }
        docs
    }

    fn page(&self, query: &Query, page: usize) -> SearchResponse {
        let docs = self.matching(query);
        let size = query.page_size.max(1) as usize;
        let total_pages = docs.len().div_ceil(size);
        let results: Vec<Document> = docs
            .iter()
            .skip((page - 1) * size)
            .take(size)
            .cloned()
            .collect();
        let next_page = (page < total_pages).then(|| {
            let url = format!("memory://search/{}/{}", query.doc_type, page + 1);
            self.cursors
                .lock()
                .unwrap()
                .insert(url.clone(), (query.clone(), page + 1));
            url
        });
        SearchResponse {
            page: page as u32,
            results_per_page: size as u32,
            total_results_size: docs.len() as u32,
            total_pages: total_pages as u32,
            next_page,
            prev_page: None,
            results,
        }
    }
}

impl ContentClient for MemoryClient {
    fn query(&self, query: &Query) -> Result<SearchResponse, CmsError> {
        self.enter("memory://search")?;
        self.refs_seen.lock().unwrap().push(query.reference.clone());
        Ok(self.page(query, 1))
    }

    fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
        reference: Option<&str>,
    ) -> Result<Document, CmsError> {
        self.enter("memory://uid")?;
        self.refs_seen
            .lock()
            .unwrap()
            .push(reference.map(str::to_string));
        self.documents(reference)
            .iter()
            .find(|d| d.doc_type.as_deref() == Some(doc_type) && d.uid.as_deref() == Some(uid))
            .cloned()
            .ok_or_else(|| CmsError::NotFound {
                doc_type: doc_type.to_string(),
                uid: uid.to_string(),
            })
    }

    fn fetch_page(&self, url: &str) -> Result<SearchResponse, CmsError> {
        self.enter(url)?;
        let cursor = self.cursors.lock().unwrap().get(url).cloned();
        match cursor {
            Some((query, page)) => Ok(self.page(&query, page)),
            None => Err(CmsError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

// =========================================================================
// Fixtures
// =========================================================================

/// Load a JSON fixture from `fixtures/`.
pub fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("fixture {} unreadable: {e}", path.display()))
}

/// Three posts, one per month starting January 2021, oldest first.
pub fn three_posts() -> Vec<Document> {
    vec![
        post("primeiro", "2021-01-01")
            .title("Primeiro post")
            .subtitle("O começo")
            .author("Ana")
            .section("Introdução", &["Um texto curto"])
            .build(),
        post("segundo", "2021-02-01")
            .title("Segundo post")
            .subtitle("O meio")
            .author("Bruno")
            .section("Meio", &["Outro texto curto"])
            .build(),
        post("terceiro", "2021-03-01")
            .title("Terceiro post")
            .subtitle("O fim")
            .author("Carla")
            .section("Fim", &["Último texto"])
            .build(),
    ]
}
