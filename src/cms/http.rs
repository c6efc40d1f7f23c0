//! HTTP implementation of [`ContentClient`] for a Prismic-style REST API.
//!
//! ```text
//! GET {endpoint}                                  → { refs: [...] }   (master ref)
//! GET {endpoint}/documents/search?ref=..&q=..     → SearchResponse
//! ```
//!
//! The master ref is looked up once per client and reused; a preview ref
//! passed on a query always wins over it. Every request carries the timeout
//! the client was built with, so a hung CMS fails the build instead of
//! stalling it.

use super::{CmsError, ContentClient, Query};
use crate::config::CmsConfig;
use crate::types::{Document, SearchResponse};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Deserialize)]
struct ApiInfo {
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default, rename = "isMasterRef")]
    is_master_ref: bool,
}

impl ApiInfo {
    fn master_ref(self) -> Result<String, CmsError> {
        self.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or_else(|| CmsError::InvalidResponse("API lists no master ref".into()))
    }
}

pub struct HttpContentClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    access_token: Option<String>,
    master_ref: Mutex<Option<String>>,
}

impl HttpContentClient {
    pub fn new(
        endpoint: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CmsError> {
        // Validate early so a typo in config.toml fails before the first query.
        Url::parse(endpoint)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_token: access_token.filter(|t| !t.is_empty()),
            master_ref: Mutex::new(None),
        })
    }

    /// Build a client from the `[cms]` config section, reading the access
    /// token from the environment variable it names.
    pub fn from_config(cms: &CmsConfig) -> Result<Self, CmsError> {
        let token = std::env::var(&cms.access_token_env).ok();
        Self::new(
            &cms.endpoint,
            token,
            Duration::from_secs(cms.timeout_secs),
        )
    }

    /// Build the search URL for `query` against `reference`.
    pub fn search_url(&self, query: &Query, reference: &str) -> Result<Url, CmsError> {
        self.search_url_with_predicate(&type_predicate(&query.doc_type), query, reference)
    }

    fn search_url_with_predicate(
        &self,
        predicate: &str,
        query: &Query,
        reference: &str,
    ) -> Result<Url, CmsError> {
        let mut url = Url::parse(&format!("{}/documents/search", self.endpoint))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ref", reference);
            pairs.append_pair("q", predicate);
            pairs.append_pair("pageSize", &query.page_size.to_string());
            if !query.fetch.is_empty() {
                pairs.append_pair("fetch", &query.fetch.join(","));
            }
            if let Some(after) = &query.after {
                pairs.append_pair("after", after);
            }
            if let Some(ordering) = &query.ordering {
                pairs.append_pair("orderings", &ordering.to_param());
            }
            if let Some(token) = &self.access_token {
                pairs.append_pair("access_token", token);
            }
        }
        Ok(url)
    }

    fn resolve_ref(&self, reference: Option<&str>) -> Result<String, CmsError> {
        match reference {
            Some(r) => Ok(r.to_string()),
            None => self.master_ref(),
        }
    }

    fn master_ref(&self) -> Result<String, CmsError> {
        let mut cached = self
            .master_ref
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(r) = cached.as_ref() {
            return Ok(r.clone());
        }

        let mut url = Url::parse(&self.endpoint)?;
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        let api: ApiInfo = self.get_json(url)?;
        let master = api.master_ref()?;
        info!(endpoint = %self.endpoint, "resolved master ref");
        *cached = Some(master.clone());
        Ok(master)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CmsError> {
        // Path only: the query string may carry the access token.
        debug!(path = url.path(), "GET");
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(CmsError::Status {
                status: status.as_u16(),
                url: format!("{}{}", url.origin().ascii_serialization(), url.path()),
            });
        }
        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl ContentClient for HttpContentClient {
    fn query(&self, query: &Query) -> Result<SearchResponse, CmsError> {
        let reference = self.resolve_ref(query.reference.as_deref())?;
        let url = self.search_url(query, &reference)?;
        self.get_json(url)
    }

    fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
        reference: Option<&str>,
    ) -> Result<Document, CmsError> {
        let reference = self.resolve_ref(reference)?;
        let query = Query::new(doc_type).page_size(1);
        let url =
            self.search_url_with_predicate(&uid_predicate(doc_type, uid), &query, &reference)?;
        let not_found = || CmsError::NotFound {
            doc_type: doc_type.to_string(),
            uid: uid.to_string(),
        };
        let response: SearchResponse = match self.get_json(url) {
            Err(CmsError::Status { status: 404, .. }) => return Err(not_found()),
            other => other?,
        };
        response.results.into_iter().next().ok_or_else(not_found)
    }

    fn fetch_page(&self, url: &str) -> Result<SearchResponse, CmsError> {
        self.get_json(Url::parse(url)?)
    }
}

fn type_predicate(doc_type: &str) -> String {
    format!("[[at(document.type,\"{}\")]]", escape_predicate(doc_type))
}

fn uid_predicate(doc_type: &str, uid: &str) -> String {
    format!(
        "[[at(my.{}.uid,\"{}\")]]",
        escape_predicate(doc_type),
        escape_predicate(uid)
    )
}

/// Quotes and backslashes would terminate the predicate string early.
fn escape_predicate(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::Ordering;
    use crate::test_helpers::fixture;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn client(token: Option<&str>) -> HttpContentClient {
        HttpContentClient::new(
            "https://blog.cdn.prismic.io/api/v2/",
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn params(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let result = HttpContentClient::new("not a url", None, Duration::from_secs(1));
        assert!(matches!(result, Err(CmsError::Url(_))));
    }

    #[test]
    fn search_url_for_list_page() {
        let q = Query::new("posts")
            .fetch(["posts.title", "posts.subtitle", "posts.author"])
            .page_size(1);
        let url = client(None).search_url(&q, "master-ref").unwrap();
        assert_eq!(url.path(), "/api/v2/documents/search");
        let p = params(&url);
        assert_eq!(p["ref"], "master-ref");
        assert_eq!(p["q"], "[[at(document.type,\"posts\")]]");
        assert_eq!(p["pageSize"], "1");
        assert_eq!(p["fetch"], "posts.title,posts.subtitle,posts.author");
        assert!(!p.contains_key("after"));
        assert!(!p.contains_key("access_token"));
    }

    #[test]
    fn search_url_for_adjacent_lookup() {
        let q = Query::new("posts")
            .page_size(1)
            .after("YDx4")
            .ordering(Ordering::by_publication_date(true));
        let p = params(&client(None).search_url(&q, "r").unwrap());
        assert_eq!(p["after"], "YDx4");
        assert_eq!(p["orderings"], "[document.first_publication_date desc]");
        assert!(!p.contains_key("fetch"));
    }

    #[test]
    fn search_url_carries_access_token() {
        let q = Query::new("posts");
        let p = params(&client(Some("secret")).search_url(&q, "r").unwrap());
        assert_eq!(p["access_token"], "secret");
    }

    #[test]
    fn empty_access_token_is_ignored() {
        let q = Query::new("posts");
        let p = params(&client(Some("")).search_url(&q, "r").unwrap());
        assert!(!p.contains_key("access_token"));
    }

    #[test]
    fn master_ref_picked_from_api_info() {
        let api: ApiInfo =
            serde_json::from_str(&crate::test_helpers::fixture("api.json")).unwrap();
        assert_eq!(api.master_ref().unwrap(), "YGRdThAAACIA6Kdk");
    }

    #[test]
    fn api_without_master_ref_is_invalid() {
        let api: ApiInfo = serde_json::from_str(r#"{"refs":[{"ref":"x"}]}"#).unwrap();
        assert!(matches!(api.master_ref(), Err(CmsError::InvalidResponse(_))));
    }

    #[test]
    fn uid_predicate_escapes_quotes() {
        assert_eq!(
            uid_predicate("posts", "a\"b"),
            "[[at(my.posts.uid,\"a\\\"b\")]]"
        );
    }

    // ------------------------------------------------------------------------
    // Against a local server
    // ------------------------------------------------------------------------

    fn read_request(stream: &mut TcpStream) {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
    }

    /// Answer one request per canned `(status, body)`, in order, and return
    /// the API endpoint to point a client at.
    fn serve(responses: Vec<(u16, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                read_request(&mut stream);
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).unwrap();
            }
        });
        format!("http://{addr}/api/v2")
    }

    fn local_client(endpoint: &str, timeout: Duration) -> HttpContentClient {
        HttpContentClient::new(endpoint, None, timeout).unwrap()
    }

    #[test]
    fn server_error_becomes_status() {
        let endpoint = serve(vec![(503, "{}".into())]);
        let client = local_client(&endpoint, Duration::from_secs(5));
        let err = client
            .query(&Query::new("posts").reference(Some("r")))
            .unwrap_err();
        match &err {
            CmsError::Status { status, url } => {
                assert_eq!(*status, 503);
                assert!(url.ends_with("/api/v2/documents/search"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert!(err.is_network());
    }

    #[test]
    fn client_error_is_not_network() {
        let endpoint = serve(vec![(400, "{}".into())]);
        let client = local_client(&endpoint, Duration::from_secs(5));
        let err = client
            .query(&Query::new("posts").reference(Some("r")))
            .unwrap_err();
        assert!(matches!(err, CmsError::Status { status: 400, .. }));
        assert!(!err.is_network());
    }

    #[test]
    fn uid_lookup_404_is_not_found() {
        let endpoint = serve(vec![(404, "{}".into())]);
        let client = local_client(&endpoint, Duration::from_secs(5));
        let err = client.get_by_uid("posts", "sumiu", Some("r")).unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_network());
    }

    #[test]
    fn uid_lookup_without_results_is_not_found() {
        let endpoint = serve(vec![(200, r#"{"page":1,"results":[]}"#.into())]);
        let client = local_client(&endpoint, Duration::from_secs(5));
        let err = client.get_by_uid("posts", "sumiu", Some("r")).unwrap_err();
        assert!(matches!(
            err,
            CmsError::NotFound { ref doc_type, ref uid } if doc_type == "posts" && uid == "sumiu"
        ));
    }

    #[test]
    fn master_ref_fetched_once_then_reused() {
        let endpoint = serve(vec![
            (200, fixture("api.json")),
            (200, fixture("search-posts.json")),
            (200, fixture("search-posts.json")),
        ]);
        let client = local_client(&endpoint, Duration::from_secs(5));
        let doc = client
            .get_by_uid("posts", "como-utilizar-hooks", None)
            .unwrap();
        assert_eq!(doc.uid.as_deref(), Some("como-utilizar-hooks"));

        // A second master lookup would consume this response as API info and fail.
        let page = client.query(&Query::new("posts")).unwrap();
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn malformed_body_is_json_error() {
        let endpoint = serve(vec![(200, "<html>".into())]);
        let client = local_client(&endpoint, Duration::from_secs(5));
        let err = client
            .query(&Query::new("posts").reference(Some("r")))
            .unwrap_err();
        assert!(matches!(err, CmsError::Json(_)));
    }

    #[test]
    fn silent_server_times_out_as_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(5));
        });

        let client = local_client(&format!("http://{addr}/api/v2"), Duration::from_secs(1));
        let err = client
            .query(&Query::new("posts").reference(Some("r")))
            .unwrap_err();
        match &err {
            CmsError::Request(e) => assert!(e.is_timeout()),
            other => panic!("expected request error, got {other:?}"),
        }
        assert!(err.is_network());
    }
}
