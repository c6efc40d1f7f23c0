//! List-view projection of post documents.
//!
//! The list page only needs five fields of each post. [`PostSummary::project`]
//! copies them out of a raw [`Document`] as-is: absent fields stay absent,
//! nothing is trimmed or defaulted, so a summary can always be traced back to
//! the document it came from.

use crate::types::{Document, format_date};
use chrono::{DateTime, Locale, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub uid: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
}

impl PostSummary {
    pub fn project(doc: &Document) -> Self {
        Self {
            uid: doc.uid.clone(),
            published_at: doc.first_publication_date,
            title: doc.data.title.clone(),
            subtitle: doc.data.subtitle.clone(),
            author: doc.data.author.clone(),
        }
    }

    /// Route of the post's detail page, when the document has a UID.
    pub fn href(&self) -> Option<String> {
        self.uid.as_deref().map(post_href)
    }

    pub fn display_date(&self, format: &str, locale: Locale) -> String {
        format_date(self.published_at, format, locale)
    }
}

impl From<&Document> for PostSummary {
    fn from(doc: &Document) -> Self {
        Self::project(doc)
    }
}

/// Project a whole result page, keeping its order.
pub fn project_all(docs: &[Document]) -> Vec<PostSummary> {
    docs.iter().map(PostSummary::project).collect()
}

/// Site-relative route of a post.
pub fn post_href(uid: &str) -> String {
    format!("/post/{uid}/")
}
