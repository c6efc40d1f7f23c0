//! # Quill Blog
//!
//! A static site generator for a blog whose posts live in a headless CMS.
//! The CMS is the data source: every post document becomes a detail page,
//! and the list page shows the newest summaries with a "load more" button
//! that keeps paging through the CMS from the browser.
//!
//! # Architecture
//!
//! ```text
//! ContentClient ──► summary / detail ──► generate (maud) ──► dist/
//!       ▲                                                     │
//!       └────────────── driver (build, regenerate, request) ◄─┘
//!                               │
//!                        .build-manifest.json
//! ```
//!
//! The [`driver`] asks the CMS for props, renders them with the templates in
//! [`generate`], writes the result, and records each route in the build
//! [`manifest`]. The manifest remembers when every page was built so later
//! runs can serve a page as-is, rebuild it once its revalidation window
//! passes, or serve a placeholder for a post that was never pre-rendered.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`cms`] | `ContentClient` trait, HTTP client for a Prismic-style API, rich text serializer |
//! | [`summary`] | Projects post documents into list-view summaries |
//! | [`paginate`] | "Load more" pagination state over the post list |
//! | [`detail`] | Reading time, body markup and previous/next post lookup |
//! | [`generate`] | Maud page templates: list, detail, fallback, not found |
//! | [`comments`] | Comment widget capability and its Utterances implementation |
//! | [`driver`] | Static generation, revalidation and fallback handling per route |
//! | [`manifest`] | On-disk record of built routes, build times and content hashes |
//! | [`config`] | `config.toml` loading, validation and stock defaults |
//! | [`types`] | CMS document model shared by every stage |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## No global client
//!
//! The content client is constructed once by the binary and passed by
//! reference into the driver and the paginator. Tests pass an in-memory
//! client instead; nothing in the library reaches for the network on its own.
//!
//! ## Errors are values
//!
//! A post the CMS doesn't have is [`driver::Generation::NotFound`] and ends up
//! as a 404 page. An unreachable CMS is a [`cms::CmsError`] that fails the
//! build. Missing fields inside a document never fail anything: they degrade
//! to empty text, a placeholder banner, or zero minutes of reading time.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/). Templates are
//! checked at compile time and everything interpolated is escaped, which
//! matters here because titles and authors come straight from the CMS.

pub mod cms;
pub mod comments;
pub mod config;
pub mod detail;
pub mod driver;
pub mod generate;
pub mod manifest;
pub mod output;
pub mod paginate;
pub mod summary;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
