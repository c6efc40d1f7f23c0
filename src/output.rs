//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every line leads with what the reader cares about (the page or post) and
//! puts the file or status after it. Posts are listed with their positional
//! index and title, with the slug, date and author as an indented context line.
//!
//! # Output Format
//!
//! ## Build / regenerate
//!
//! ```text
//! Home → index.html (written)
//! Not found → 404.html (unchanged)
//! 001 primeiro → post/primeiro/index.html (written)
//! 002 segundo → post/segundo/index.html (still fresh)
//! 003 removido → 404.html (not found)
//!
//! Pages: 3 written, 1 unchanged, 1 still fresh, 1 not found (6 total)
//! ```
//!
//! ## Page request
//!
//! ```text
//! /post/segundo → 200 stale
//!     Revalidated: written
//! ```
//!
//! ## Posts
//!
//! ```text
//! 001 Primeiro post
//!     primeiro · 01 jan 2021 · Ana
//!     O começo
//!
//! 3 posts
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::driver::{BuildReport, PageOutcome, PageResponse, PageState, Revalidation, Route};
use crate::summary::PostSummary;
use chrono::Locale;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

fn outcome_label(outcome: PageOutcome) -> &'static str {
    match outcome {
        PageOutcome::Written => "written",
        PageOutcome::Unchanged => "unchanged",
        PageOutcome::Fresh => "still fresh",
        PageOutcome::NotFound => "not found",
    }
}

fn state_label(state: PageState) -> &'static str {
    match state {
        PageState::Built => "built",
        PageState::Stale => "stale",
        PageState::Fallback => "fallback",
        PageState::NotFound => "not found",
    }
}

// ============================================================================
// Build / regenerate
// ============================================================================

/// Format the pages touched by a build or regenerate run.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();
    let mut post_index = 0;

    for page in &report.pages {
        let file = if page.outcome == PageOutcome::NotFound {
            Route::NotFound.file()
        } else {
            page.route.file()
        };
        let label = outcome_label(page.outcome);
        let line = match &page.route {
            Route::List => format!("Home \u{2192} {} ({})", file, label),
            Route::NotFound => format!("Not found \u{2192} {} ({})", file, label),
            Route::Post(slug) => {
                post_index += 1;
                format!(
                    "{} {} \u{2192} {} ({})",
                    format_index(post_index),
                    slug,
                    file,
                    label
                )
            }
        };
        lines.push(line);
    }

    lines.push(String::new());
    lines.push(format!("Pages: {}", report.stats));
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Page request
// ============================================================================

/// Format how a single route request was answered.
pub fn format_page_response(response: &PageResponse) -> Vec<String> {
    let mut lines = vec![format!(
        "{} \u{2192} {} {}",
        response.route,
        response.status,
        state_label(response.state)
    )];
    match &response.revalidation {
        Revalidation::NotNeeded => {}
        Revalidation::Rebuilt(outcome) => {
            lines.push(format!("    Revalidated: {}", outcome_label(*outcome)));
        }
        Revalidation::Failed(err) => {
            lines.push(format!("    Revalidation failed: {}", err));
        }
    }
    lines
}

pub fn print_page_response(response: &PageResponse) {
    for line in format_page_response(response) {
        println!("{}", line);
    }
}

// ============================================================================
// Posts
// ============================================================================

/// Format loaded post summaries, in the order they were loaded.
pub fn format_posts(posts: &[PostSummary], date_format: &str, locale: Locale) -> Vec<String> {
    let mut lines = Vec::new();

    for (i, post) in posts.iter().enumerate() {
        let title = post.title.as_deref().unwrap_or("(untitled)");
        lines.push(format!("{} {}", format_index(i + 1), title));

        let mut context = vec![post.uid.clone().unwrap_or_else(|| "(no uid)".to_string())];
        if post.published_at.is_some() {
            context.push(post.display_date(date_format, locale));
        }
        if let Some(author) = post.author.as_deref().filter(|a| !a.is_empty()) {
            context.push(author.to_string());
        }
        lines.push(format!("    {}", context.join(" \u{b7} ")));

        if let Some(subtitle) = post.subtitle.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(format!("    {}", truncate(subtitle.trim(), 60)));
        }
    }

    lines.push(String::new());
    lines.push(match posts.len() {
        1 => "1 post".to_string(),
        n => format!("{} posts", n),
    });
    lines
}

pub fn print_posts(posts: &[PostSummary], date_format: &str, locale: Locale) {
    for line in format_posts(posts, date_format, locale) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
