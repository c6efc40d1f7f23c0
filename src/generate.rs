//! HTML page templates.
//!
//! Pure functions from view data to [`Markup`]; writing files is the
//! driver's job.
//!
//! ## Generated Pages
//!
//! - **List page** (`/index.html`): first page of post summaries and a
//!   "load more" button carrying the CMS `next_page` URL
//! - **Detail pages** (`/post/{slug}/index.html`): banner, title, date, author,
//!   reading time, body sections, previous/next links, comments
//! - **Fallback page**: loading placeholder served for a slug whose page is
//!   still being generated
//! - **Not-found page** (`/404.html`)
//!
//! ## CSS and JavaScript
//!
//! Static assets are embedded at compile time:
//! - `static/style.css`: base styles, inlined into every page
//! - `static/load-more.js`: list pagination in the browser
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating;
//! everything interpolated is escaped except the serialized rich text and the
//! embedded assets.

use crate::comments::CommentWidget;
use crate::config::SiteConfig;
use crate::detail::{Adjacent, AdjacentPostRef, PostDetail};
use crate::summary::{PostSummary, post_href};
use crate::types::format_date;
use chrono::Locale;
use maud::{DOCTYPE, Markup, PreEscaped, html};

const CSS: &str = include_str!("../static/style.css");
const LOAD_MORE_JS: &str = include_str!("../static/load-more.js");
/// Seconds before the fallback placeholder asks for the page again.
const FALLBACK_REFRESH_SECS: u32 = 2;

/// Settings every template needs.
pub struct PageContext<'a> {
    pub config: &'a SiteConfig,
    pub locale: Locale,
    /// Rendered with a preview ref: show the "exit preview" link.
    pub preview: bool,
}

impl<'a> PageContext<'a> {
    fn date(&self, date: Option<chrono::DateTime<chrono::Utc>>) -> String {
        format_date(date, &self.config.site.date_format, self.locale)
    }
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(
    ctx: &PageContext,
    title: &str,
    description: Option<&str>,
    refresh_secs: Option<u32>,
    content: Markup,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(ctx.config.site.lang) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                @if let Some(description) = description {
                    meta name="description" content=(description);
                }
                @if let Some(secs) = refresh_secs {
                    meta http-equiv="refresh" content=(secs);
                }
                style { (PreEscaped(CSS)) }
            }
            body {
                (site_header(ctx))
                (content)
                @if ctx.preview {
                    (preview_exit(ctx))
                }
            }
        }
    }
}

/// Logo link back to the list page.
fn site_header(ctx: &PageContext) -> Markup {
    html! {
        header.site-header {
            a.logo href="/" { (ctx.config.site.title) span { "." } }
        }
    }
}

fn preview_exit(ctx: &PageContext) -> Markup {
    html! {
        aside {
            a.preview-exit href=(ctx.config.preview.exit_url) { "Sair do modo Preview" }
        }
    }
}

fn summary_card(ctx: &PageContext, post: &PostSummary) -> Markup {
    html! {
        article.post-summary {
            a href=[post.href()] {
                strong { (post.title.as_deref().unwrap_or_default()) }
            }
            p { (post.subtitle.as_deref().unwrap_or_default()) }
            div.info {
                time { (ctx.date(post.published_at)) }
                span { (post.author.as_deref().unwrap_or_default()) }
            }
        }
    }
}

fn adjacent_link(post: &AdjacentPostRef, class: &str, label: &str) -> Markup {
    html! {
        a class=(class) href=(post_href(&post.uid)) {
            (post.title.as_deref().unwrap_or_default())
            span { (label) }
        }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Renders the post list with the first page of summaries.
pub fn render_list_page(
    ctx: &PageContext,
    posts: &[PostSummary],
    next_page: Option<&str>,
) -> Markup {
    let content = html! {
        main.post-list {
            div.post-list-items {
                @for post in posts {
                    (summary_card(ctx, post))
                }
            }
            @if let Some(url) = next_page {
                button.load-more type="button" data-next-page=(url)
                    data-retry-label="Não foi possível carregar. Tente novamente." {
                    "Carregar mais posts"
                }
                script { (PreEscaped(LOAD_MORE_JS)) }
            }
        }
    };
    base_document(ctx, &ctx.config.site.title, None, None, content)
}

/// Renders a post detail page.
pub fn render_post_page(
    ctx: &PageContext,
    post: &PostDetail,
    adjacent: &Adjacent,
    comments: &dyn CommentWidget,
) -> Markup {
    let title = post.title.as_deref().unwrap_or_default();
    let page_title = if title.is_empty() {
        ctx.config.site.title.clone()
    } else {
        format!("{} | {}", title, ctx.config.site.title)
    };

    let content = html! {
        img.banner src=(post.banner_url) alt=(post.banner_alt);
        main.post {
            header {
                h1 { (title) }
                div.info {
                    time { (ctx.date(post.published_at)) }
                    span { (post.author.as_deref().unwrap_or_default()) }
                    span.reading-time { (post.reading_minutes) " min" }
                }
            }
            @for section in &post.sections {
                article.post-section {
                    @if let Some(heading) = &section.heading {
                        h2 { (heading) }
                    }
                    div.post-body { (section.html) }
                }
            }
            @if adjacent.previous.is_some() || adjacent.next.is_some() {
                nav.adjacent {
                    @if let Some(previous) = &adjacent.previous {
                        (adjacent_link(previous, "previous", "Post anterior"))
                    }
                    @if let Some(next) = &adjacent.next {
                        (adjacent_link(next, "next", "Próximo post"))
                    }
                }
            }
            (comments.mount())
        }
    };
    let description = post.subtitle.as_deref().or(post.excerpt.as_deref());
    base_document(ctx, &page_title, description, None, content)
}

/// Placeholder returned while a page that was not pre-rendered is generated.
/// Reloads itself until the real page replaces it.
pub fn render_fallback_page(ctx: &PageContext) -> Markup {
    let content = html! {
        main.placeholder {
            span { "Carregando..." }
        }
    };
    base_document(
        ctx,
        &ctx.config.site.title,
        None,
        Some(FALLBACK_REFRESH_SECS),
        content,
    )
}

pub fn render_not_found_page(ctx: &PageContext) -> Markup {
    let content = html! {
        main.not-found {
            h1 { "Post não encontrado" }
            p { a href="/" { "Voltar para a lista de posts" } }
        }
    };
    base_document(ctx, &ctx.config.site.title, None, None, content)
}

// ============================================================================
// Tests
// ============================================================================
