//! Raw CMS document shapes shared by every stage.
//!
//! These mirror the JSON the content API returns. Every field that a content
//! editor can leave blank is optional: a malformed or half-filled document
//! must deserialize, and the renderers decide how to degrade.

use chrono::{DateTime, Locale, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A single document as returned by the content API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Internal CMS id, used as the `after` cursor for adjacent lookups.
    pub id: String,
    /// Human-facing slug. Absent for documents without a UID field.
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default, rename = "type")]
    pub doc_type: Option<String>,
    #[serde(default, with = "publication_date")]
    pub first_publication_date: Option<DateTime<Utc>>,
    #[serde(default, with = "publication_date")]
    pub last_publication_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: PostData,
}

/// The custom fields of a `posts` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub banner: Option<Banner>,
    #[serde(default)]
    pub content: Option<Vec<ContentSection>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
}

/// One titled section of a post body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSection {
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: Vec<RichTextBlock>,
}

/// A structured text node: paragraph, heading, list item, image, embed...
///
/// `kind` is kept as the raw type string so unknown block types survive
/// deserialization; the serializer skips what it does not understand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichTextBlock {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub spans: Vec<Span>,
    /// Image blocks only.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    /// Embed blocks only.
    #[serde(default)]
    pub oembed: Option<Embed>,
}

impl RichTextBlock {
    /// Convenience constructor for a plain paragraph.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: "paragraph".to_string(),
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Inline formatting over a character range of a block's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<SpanData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    /// Label spans carry their class name here.
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
}

/// One page of query results.
///
/// `next_page` is the absolute URL of the following page, or `None` once the
/// result set is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results_per_page: u32,
    #[serde(default)]
    pub total_results_size: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub prev_page: Option<String>,
    #[serde(default)]
    pub results: Vec<Document>,
}

/// Format an optional publication date for display; absent dates render empty.
pub fn format_date(date: Option<DateTime<Utc>>, format: &str, locale: Locale) -> String {
    date.map(|d| d.format_localized(format, locale).to_string())
        .unwrap_or_default()
}

/// Lists the CMS sends as `null` deserialize as empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serde adapter for CMS timestamps.
///
/// The content API emits `2021-03-25T19:25:28+0000` (no colon in the offset),
/// which RFC 3339 parsing rejects, so both spellings are accepted. Anything
/// else is logged and treated as absent.
mod publication_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::warn;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&d.format("%Y-%m-%dT%H:%M:%S%z").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => match DateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%z")
                .or_else(|_| DateTime::parse_from_rfc3339(&s))
            {
                Ok(d) => Ok(Some(d.with_timezone(&Utc))),
                Err(e) => {
                    warn!(value = %s, error = %e, "ignoring unparseable publication date");
                    Ok(None)
                }
            },
        }
    }
}
