//! Static generation driver.
//!
//! Turns CMS content into files under the output directory and decides, per
//! route, whether a page can be served as-is or has to be (re)generated.
//!
//! # Routes
//!
//! | Route | File | Revalidation |
//! |-------|------|--------------|
//! | `/` | `index.html` | every `build`/`regenerate` |
//! | `/post/{slug}` | `post/{slug}/index.html` | after `detail.revalidate_secs` |
//! | `/404` | `404.html` | every `build` |
//!
//! # Detail page lifecycle
//!
//! ```text
//! build ─► PathsEnumerated ─► Building ─► Built ──(window elapses)──► Stale
//!                                           ▲                           │
//!                                           └──── rebuilt after serve ──┘
//! request for a slug outside the enumerated set:
//!   Fallback (placeholder served) ─► Building ─► Built | NotFound
//! ```
//!
//! A stale page is served unchanged and rebuilt right after
//! (stale-while-revalidate). If that rebuild fails the stale copy stays in
//! place and the failure is reported alongside the response.
//!
//! A slug the CMS does not know is [`Generation::NotFound`]: the route is
//! recorded as not found and `404.html` is served for it. Network failures are
//! [`GenerateError::Cms`] and fail the build, or the single request when there
//! is nothing older to serve.
//!
//! # Preview
//!
//! With a preview ref every CMS call uses that ref and every page carries the
//! exit-preview link. [`Driver::request`] in preview mode renders on demand and
//! never touches the output directory or the manifest.

use crate::cms::{CmsError, ContentClient, Query};
use crate::comments::CommentWidget;
use crate::config::{ConfigError, SiteConfig};
use crate::detail::{Adjacent, PostDetail, resolve_adjacent};
use crate::generate::{self, PageContext};
use crate::manifest::{BuildManifest, BuildStats, Freshness, PageStatus, WriteDecision};
use crate::summary::{PostSummary, project_all};
use chrono::{DateTime, Locale, Utc};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

const NOT_FOUND_FILE: &str = "404.html";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("{route}: {source}")]
    Cms {
        route: String,
        #[source]
        source: CmsError,
    },
    #[error("invalid slug '{0}'")]
    InvalidSlug(String),
}

impl GenerateError {
    /// True when the CMS could not be reached; worth retrying later.
    pub fn is_network(&self) -> bool {
        matches!(self, GenerateError::Cms { source, .. } if source.is_network())
    }
}

// ============================================================================
// Routes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    List,
    Post(String),
    NotFound,
}

impl Route {
    /// Detail route for `slug`. Slugs become directory names, so anything
    /// but letters, digits, `-` and `_` is rejected.
    pub fn post(slug: &str) -> Result<Self, GenerateError> {
        let valid = !slug.is_empty()
            && slug
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Route::Post(slug.to_string()))
        } else {
            Err(GenerateError::InvalidSlug(slug.to_string()))
        }
    }

    /// Manifest key.
    pub fn key(&self) -> String {
        match self {
            Route::List => "/".to_string(),
            Route::Post(slug) => format!("/post/{slug}"),
            Route::NotFound => "/404".to_string(),
        }
    }

    /// Output file relative to the output directory.
    pub fn file(&self) -> String {
        match self {
            Route::List => "index.html".to_string(),
            Route::Post(slug) => format!("post/{slug}/index.html"),
            Route::NotFound => NOT_FOUND_FILE.to_string(),
        }
    }

    /// Inverse of [`Route::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "/" => Some(Route::List),
            "/404" => Some(Route::NotFound),
            _ => key
                .strip_prefix("/post/")
                .and_then(|slug| Route::post(slug).ok()),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// ============================================================================
// Props
// ============================================================================

/// Result of generating content for a route.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation<T> {
    Found(T),
    NotFound,
}

#[derive(Debug, Clone)]
pub struct ListProps {
    pub posts: Vec<PostSummary>,
    pub next_page: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DetailProps {
    pub post: PostDetail,
    pub adjacent: Adjacent,
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Written,
    /// Regenerated, but the markup matched what was already on disk.
    Unchanged,
    /// Still inside its revalidation window; not regenerated.
    Fresh,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub route: Route,
    pub outcome: PageOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub pages: Vec<PageReport>,
    pub stats: BuildStats,
}

impl BuildReport {
    fn push(&mut self, route: Route, outcome: PageOutcome) {
        match outcome {
            PageOutcome::Written => self.stats.written += 1,
            PageOutcome::Unchanged => self.stats.unchanged += 1,
            PageOutcome::Fresh => self.stats.fresh += 1,
            PageOutcome::NotFound => self.stats.not_found += 1,
        }
        self.pages.push(PageReport { route, outcome });
    }
}

/// How a route was answered by [`Driver::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Built,
    /// Served past its revalidation window.
    Stale,
    /// Placeholder served while the page was generated.
    Fallback,
    NotFound,
}

#[derive(Debug)]
pub enum Revalidation {
    NotNeeded,
    Rebuilt(PageOutcome),
    /// The rebuild failed; what was served stays on disk.
    Failed(GenerateError),
}

#[derive(Debug)]
pub struct PageResponse {
    pub route: Route,
    pub state: PageState,
    pub status: u16,
    pub html: String,
    pub revalidation: Revalidation,
}

// ============================================================================
// Driver
// ============================================================================

pub struct Driver<'a, C: ContentClient + ?Sized> {
    client: &'a C,
    config: &'a SiteConfig,
    comments: &'a dyn CommentWidget,
    output_dir: &'a Path,
    preview: Option<&'a str>,
    locale: Locale,
}

impl<'a, C: ContentClient + ?Sized> Driver<'a, C> {
    pub fn new(
        client: &'a C,
        config: &'a SiteConfig,
        comments: &'a dyn CommentWidget,
        output_dir: &'a Path,
    ) -> Result<Self, GenerateError> {
        Ok(Self {
            client,
            config,
            comments,
            output_dir,
            preview: None,
            locale: config.site.locale()?,
        })
    }

    /// Query with `reference` instead of the published ref.
    pub fn with_preview(mut self, reference: Option<&'a str>) -> Self {
        self.preview = reference;
        self
    }

    fn doc_type(&self) -> &str {
        &self.config.cms.doc_type
    }

    fn context(&self) -> PageContext<'_> {
        PageContext {
            config: self.config,
            locale: self.locale,
            preview: self.preview.is_some(),
        }
    }

    fn revalidate_secs(&self, route: &Route) -> Option<u64> {
        match route {
            Route::Post(_) => Some(self.config.detail.revalidate_secs),
            Route::List | Route::NotFound => None,
        }
    }

    // ------------------------------------------------------------------------
    // CMS → props
    // ------------------------------------------------------------------------

    /// First page of summaries for the list page.
    pub fn list_props(&self) -> Result<ListProps, CmsError> {
        let doc_type = self.doc_type();
        let query = Query::new(doc_type)
            .fetch(["title", "subtitle", "author"].map(|f| format!("{doc_type}.{f}")))
            .page_size(self.config.list.page_size)
            .reference(self.preview);
        let page = self.client.query(&query)?;
        debug!(
            results = page.results.len(),
            more = page.next_page.is_some(),
            "fetched list page"
        );
        Ok(ListProps {
            posts: project_all(&page.results),
            next_page: page.next_page,
        })
    }

    /// Slugs to pre-render at build time.
    pub fn static_paths(&self) -> Result<Vec<String>, CmsError> {
        let query = Query::new(self.doc_type())
            .fetch(Vec::<String>::new())
            .page_size(self.config.paths.page_size)
            .reference(self.preview);
        let page = self.client.query(&query)?;
        Ok(page.results.into_iter().filter_map(|doc| doc.uid).collect())
    }

    pub fn detail_props(&self, slug: &str) -> Result<Generation<DetailProps>, CmsError> {
        let doc = match self.client.get_by_uid(self.doc_type(), slug, self.preview) {
            Ok(doc) => doc,
            Err(e) if e.is_not_found() => return Ok(Generation::NotFound),
            Err(e) => return Err(e),
        };
        let adjacent = resolve_adjacent(self.client, self.doc_type(), &doc.id, self.preview)?;
        Ok(Generation::Found(DetailProps {
            post: PostDetail::from_document(slug, &doc, self.config),
            adjacent,
        }))
    }

    // ------------------------------------------------------------------------
    // props → HTML
    // ------------------------------------------------------------------------

    pub fn render_list(&self, props: &ListProps) -> String {
        generate::render_list_page(&self.context(), &props.posts, props.next_page.as_deref())
            .into_string()
    }

    pub fn render_detail(&self, props: &DetailProps) -> String {
        generate::render_post_page(&self.context(), &props.post, &props.adjacent, self.comments)
            .into_string()
    }

    pub fn render_fallback(&self) -> String {
        generate::render_fallback_page(&self.context()).into_string()
    }

    pub fn render_not_found(&self) -> String {
        generate::render_not_found_page(&self.context()).into_string()
    }

    /// Fetch and render one route.
    pub fn generate(&self, route: &Route) -> Result<Generation<String>, GenerateError> {
        let cms_error = |source| GenerateError::Cms {
            route: route.key(),
            source,
        };
        match route {
            Route::List => {
                let props = self.list_props().map_err(cms_error)?;
                Ok(Generation::Found(self.render_list(&props)))
            }
            Route::Post(slug) => match self.detail_props(slug).map_err(cms_error)? {
                Generation::Found(props) => Ok(Generation::Found(self.render_detail(&props))),
                Generation::NotFound => Ok(Generation::NotFound),
            },
            Route::NotFound => Ok(Generation::Found(self.render_not_found())),
        }
    }

    // ------------------------------------------------------------------------
    // Output directory
    // ------------------------------------------------------------------------

    fn write_file(&self, file: &str, html: &str) -> io::Result<()> {
        let path = self.output_dir.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, html)
    }

    /// Write a generated route and record it in the manifest.
    fn commit(
        &self,
        manifest: &mut BuildManifest,
        route: &Route,
        generation: Generation<String>,
        now: DateTime<Utc>,
    ) -> io::Result<PageOutcome> {
        let key = route.key();
        let revalidate = self.revalidate_secs(route);
        match generation {
            Generation::Found(html) => {
                let file = route.file();
                let decision =
                    manifest.record(&key, &file, &html, PageStatus::Built, revalidate, now);
                if decision == WriteDecision::Unchanged && self.output_dir.join(&file).exists() {
                    debug!(%route, "unchanged");
                    return Ok(PageOutcome::Unchanged);
                }
                self.write_file(&file, &html)?;
                info!(%route, file = %file, "wrote page");
                Ok(PageOutcome::Written)
            }
            Generation::NotFound => {
                let html = self.render_not_found();
                if !self.output_dir.join(NOT_FOUND_FILE).exists() {
                    self.write_file(NOT_FOUND_FILE, &html)?;
                }
                // The post may have been built before and removed from the CMS since.
                let stale_copy = self.output_dir.join(route.file());
                if stale_copy.exists() {
                    fs::remove_file(&stale_copy)?;
                }
                manifest.record(&key, NOT_FOUND_FILE, &html, PageStatus::NotFound, revalidate, now);
                info!(%route, "no such document");
                Ok(PageOutcome::NotFound)
            }
        }
    }

    /// Generate detail routes in parallel, then commit them in order.
    fn generate_posts(
        &self,
        manifest: &mut BuildManifest,
        routes: Vec<Route>,
        now: DateTime<Utc>,
        report: &mut BuildReport,
    ) -> Result<(), GenerateError> {
        let generated = routes
            .into_par_iter()
            .map(|route| {
                let generation = self.generate(&route)?;
                Ok((route, generation))
            })
            .collect::<Result<Vec<_>, GenerateError>>()?;

        for (route, generation) in generated {
            let outcome = self.commit(manifest, &route, generation, now)?;
            report.push(route, outcome);
        }
        Ok(())
    }

    /// Enumerate and pre-render every page.
    pub fn build(&self, now: DateTime<Utc>) -> Result<BuildReport, GenerateError> {
        let mut manifest = BuildManifest::load(self.output_dir);
        let mut report = BuildReport::default();
        fs::create_dir_all(self.output_dir)?;

        let list = self.generate(&Route::List)?;
        report.push(Route::List, self.commit(&mut manifest, &Route::List, list, now)?);

        let not_found = self.generate(&Route::NotFound)?;
        report.push(
            Route::NotFound,
            self.commit(&mut manifest, &Route::NotFound, not_found, now)?,
        );

        let slugs = self.static_paths().map_err(|source| GenerateError::Cms {
            route: "paths".to_string(),
            source,
        })?;
        let mut enumerated = BTreeSet::new();
        let mut routes = Vec::new();
        for slug in slugs {
            let route = match Route::post(&slug) {
                Ok(route) => route,
                Err(e) => {
                    warn!(error = %e, "skipping document");
                    continue;
                }
            };
            if enumerated.insert(slug.clone()) {
                routes.push(route);
            } else {
                warn!(slug = %slug, "slug enumerated twice");
            }
        }
        info!(count = routes.len(), "enumerated detail pages");
        manifest.enumerated = enumerated;

        self.generate_posts(&mut manifest, routes, now, &mut report)?;
        manifest.save(self.output_dir)?;
        Ok(report)
    }

    /// Rebuild the list page and every detail page past its window.
    ///
    /// Without a previous build this is a full [`Driver::build`].
    pub fn regenerate(&self, now: DateTime<Utc>) -> Result<BuildReport, GenerateError> {
        let mut manifest = BuildManifest::load(self.output_dir);
        if manifest.pages.is_empty() {
            info!("no previous build, running a full build");
            return self.build(now);
        }
        let mut report = BuildReport::default();

        let list = self.generate(&Route::List)?;
        report.push(Route::List, self.commit(&mut manifest, &Route::List, list, now)?);

        if manifest.freshness(&Route::NotFound.key(), now, self.output_dir) == Freshness::Missing {
            let not_found = self.generate(&Route::NotFound)?;
            report.push(
                Route::NotFound,
                self.commit(&mut manifest, &Route::NotFound, not_found, now)?,
            );
        }

        let mut stale = Vec::new();
        for key in manifest.pages.keys() {
            let Some(route @ Route::Post(_)) = Route::from_key(key) else {
                continue;
            };
            match manifest.freshness(key, now, self.output_dir) {
                Freshness::Fresh => report.push(route, PageOutcome::Fresh),
                Freshness::Stale | Freshness::Missing => stale.push(route),
            }
        }
        info!(stale = stale.len(), fresh = report.stats.fresh, "revalidating");

        self.generate_posts(&mut manifest, stale, now, &mut report)?;
        manifest.save(self.output_dir)?;
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    /// Answer a request for `route` the way a static host with on-demand
    /// generation would.
    pub fn request(&self, route: &Route, now: DateTime<Utc>) -> Result<PageResponse, GenerateError> {
        if self.preview.is_some() {
            return self.request_preview(route);
        }

        let mut manifest = BuildManifest::load(self.output_dir);
        let key = route.key();
        let response = match manifest.freshness(&key, now, self.output_dir) {
            Freshness::Fresh => self.serve(&manifest, route, Revalidation::NotNeeded)?,
            Freshness::Stale => {
                let mut response = self.serve(&manifest, route, Revalidation::NotNeeded)?;
                if response.state == PageState::Built {
                    response.state = PageState::Stale;
                }
                response.revalidation = match self.rebuild(&mut manifest, route, now) {
                    Ok(outcome) => Revalidation::Rebuilt(outcome),
                    Err(e) => {
                        warn!(%route, error = %e, "revalidation failed, keeping stale page");
                        Revalidation::Failed(e)
                    }
                };
                response
            }
            Freshness::Missing => {
                let enumerated = match route {
                    Route::Post(slug) => manifest.is_enumerated(slug),
                    Route::List | Route::NotFound => true,
                };
                if enumerated {
                    self.rebuild(&mut manifest, route, now)?;
                    self.serve(&manifest, route, Revalidation::NotNeeded)?
                } else {
                    debug!(%route, "not pre-rendered, serving fallback");
                    let placeholder = self.render_fallback();
                    let outcome = self.rebuild(&mut manifest, route, now)?;
                    PageResponse {
                        route: route.clone(),
                        state: PageState::Fallback,
                        status: 200,
                        html: placeholder,
                        revalidation: Revalidation::Rebuilt(outcome),
                    }
                }
            }
        };
        manifest.save(self.output_dir)?;
        Ok(response)
    }

    fn rebuild(
        &self,
        manifest: &mut BuildManifest,
        route: &Route,
        now: DateTime<Utc>,
    ) -> Result<PageOutcome, GenerateError> {
        let generation = self.generate(route)?;
        Ok(self.commit(manifest, route, generation, now)?)
    }

    /// Read what is on disk for `route`.
    fn serve(
        &self,
        manifest: &BuildManifest,
        route: &Route,
        revalidation: Revalidation,
    ) -> Result<PageResponse, GenerateError> {
        let not_found = manifest
            .get(&route.key())
            .is_some_and(|e| e.status == PageStatus::NotFound);
        let (state, status, file) = if not_found {
            (PageState::NotFound, 404, NOT_FOUND_FILE.to_string())
        } else {
            (PageState::Built, 200, route.file())
        };
        let html = match fs::read_to_string(self.output_dir.join(&file)) {
            Ok(html) => html,
            Err(e) if e.kind() == io::ErrorKind::NotFound && not_found => self.render_not_found(),
            Err(e) => return Err(e.into()),
        };
        Ok(PageResponse {
            route: route.clone(),
            state,
            status,
            html,
            revalidation,
        })
    }

    fn request_preview(&self, route: &Route) -> Result<PageResponse, GenerateError> {
        let (state, status, html) = match self.generate(route)? {
            Generation::Found(html) => (PageState::Built, 200, html),
            Generation::NotFound => (PageState::NotFound, 404, self.render_not_found()),
        };
        Ok(PageResponse {
            route: route.clone(),
            state,
            status,
            html,
            revalidation: Revalidation::NotNeeded,
        })
    }
}
