//! Post detail rendering: reading time, body markup and adjacent posts.
//!
//! ## Reading time
//!
//! Words are counted by splitting on single spaces, exactly like the blog has
//! always done: `"a  b"` is three words, `""` is one. Headings and the text of
//! every body block count; blocks without text (images, embeds) and missing
//! headings count zero. The total is divided by the reading speed and rounded
//! up, so any non-empty post takes at least one minute.
//!
//! ## Adjacent posts
//!
//! Neighbours are found with two one-result queries `after` the current
//! document id, ordered by first publication date:
//!
//! ```text
//! previous: orderings=[document.first_publication_date desc]  → next older post
//! next:     orderings=[document.first_publication_date]       → next newer post
//! ```
//!
//! Posts published at the same instant are ordered however the CMS breaks
//! the tie; no attempt is made to make that deterministic.

use crate::cms::rich_text;
use crate::cms::{CmsError, ContentClient, Ordering, Query};
use crate::config::SiteConfig;
use crate::types::{ContentSection, Document};
use chrono::{DateTime, Utc};
use maud::PreEscaped;
use serde::{Deserialize, Serialize};

pub fn word_count(text: &str) -> usize {
    text.split(' ').count()
}

/// Total words across all headings and block texts. `None` content is zero.
pub fn count_words(content: Option<&[ContentSection]>) -> usize {
    content
        .unwrap_or_default()
        .iter()
        .map(|section| {
            let heading = section.heading.as_deref().map_or(0, word_count);
            let body: usize = section
                .body
                .iter()
                .filter_map(|block| block.text.as_deref())
                .map(word_count)
                .sum();
            heading + body
        })
        .sum()
}

/// Minutes needed to read `content`, rounded up.
pub fn reading_time(content: Option<&[ContentSection]>, words_per_minute: u32) -> u32 {
    let words = count_words(content);
    words.div_ceil(words_per_minute.max(1) as usize) as u32
}

const EXCERPT_CHARS: usize = 160;

/// Plain text of the first section's body, joined on spaces and cut to
/// `max_chars`.
pub fn excerpt(content: Option<&[ContentSection]>, max_chars: usize) -> Option<String> {
    let first = content?.first()?;
    let text = rich_text::as_text(&first.body).replace('\n', " ");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(max_chars).collect())
}

#[derive(Debug, Clone)]
pub struct RenderedSection {
    pub heading: Option<String>,
    /// Serialized rich text; injected into the page without escaping.
    pub html: PreEscaped<String>,
}

pub fn render_sections(content: Option<&[ContentSection]>) -> Vec<RenderedSection> {
    content
        .unwrap_or_default()
        .iter()
        .map(|section| RenderedSection {
            heading: section.heading.clone(),
            html: PreEscaped(rich_text::as_html(&section.body)),
        })
        .collect()
}

/// Everything the detail template needs about one post.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub uid: String,
    pub published_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub banner_url: String,
    pub banner_alt: String,
    pub author: Option<String>,
    /// Plain text of the first section, shortened; `None` without body text.
    pub excerpt: Option<String>,
    pub reading_minutes: u32,
    pub sections: Vec<RenderedSection>,
}

impl PostDetail {
    /// Derive the presentation data for `doc`, degrading missing parts:
    /// no banner → the configured placeholder, no content → zero minutes.
    pub fn from_document(uid: &str, doc: &Document, config: &SiteConfig) -> Self {
        let content = doc.data.content.as_deref();
        let banner = doc.data.banner.as_ref();
        Self {
            uid: doc.uid.clone().unwrap_or_else(|| uid.to_string()),
            published_at: doc.first_publication_date,
            title: doc.data.title.clone(),
            subtitle: doc.data.subtitle.clone(),
            banner_url: banner
                .and_then(|b| b.url.clone())
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| config.site.placeholder_banner.clone()),
            banner_alt: banner
                .and_then(|b| b.alt.clone())
                .unwrap_or_else(|| "banner".to_string()),
            author: doc.data.author.clone(),
            excerpt: excerpt(content, EXCERPT_CHARS),
            reading_minutes: reading_time(content, config.detail.words_per_minute),
            sections: render_sections(content),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacentPostRef {
    pub uid: String,
    pub title: Option<String>,
}

impl AdjacentPostRef {
    fn from_first(results: &[Document]) -> Option<Self> {
        let doc = results.first()?;
        Some(Self {
            uid: doc.uid.clone()?,
            title: doc.data.title.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjacent {
    pub previous: Option<AdjacentPostRef>,
    pub next: Option<AdjacentPostRef>,
}

/// Look up the chronological neighbours of the document with id `doc_id`.
///
/// Both queries run in parallel; either failing fails the lookup.
pub fn resolve_adjacent<C: ContentClient + ?Sized>(
    client: &C,
    doc_type: &str,
    doc_id: &str,
    reference: Option<&str>,
) -> Result<Adjacent, CmsError> {
    let neighbour = |descending: bool| {
        let query = Query::new(doc_type)
            .page_size(1)
            .reference(reference)
            .after(doc_id)
            .ordering(Ordering::by_publication_date(descending));
        client.query(&query)
    };
    let (previous, next) = rayon::join(|| neighbour(true), || neighbour(false));
    Ok(Adjacent {
        previous: AdjacentPostRef::from_first(&previous?.results),
        next: AdjacentPostRef::from_first(&next?.results),
    })
}
