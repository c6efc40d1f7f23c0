//! Comment widget embedding.
//!
//! Detail pages only know that a widget exists, not which vendor provides it:
//! they ask a [`CommentWidget`] for the markup of its mount point. The
//! [`Utterances`] widget renders an empty `<section>` describing the vendor
//! script, plus a loader (`static/comments.js`) that injects the script when
//! the page loads and removes everything it added on `pagehide`, so the
//! widget's lifetime is tied to the page's.

use crate::config::CommentsConfig;
use maud::{Markup, PreEscaped, html};

const LOADER_JS: &str = include_str!("../static/comments.js");

const UTTERANCES_SRC: &str = "https://utteranc.es/client.js";

pub trait CommentWidget: Sync {
    /// Markup placed under the post body. Empty for no widget.
    fn mount(&self) -> Markup;
}

/// No comments section at all.
pub struct NoComments;

impl CommentWidget for NoComments {
    fn mount(&self) -> Markup {
        html! {}
    }
}

/// GitHub-issue backed comments (utteranc.es).
#[derive(Debug, Clone)]
pub struct Utterances {
    pub repo: String,
    pub issue_term: String,
    pub label: String,
    pub theme: String,
}

impl CommentWidget for Utterances {
    fn mount(&self) -> Markup {
        html! {
            section.comments
                data-comment-src=(UTTERANCES_SRC)
                data-widget-repo=(self.repo)
                data-widget-issue-term=(self.issue_term)
                data-widget-label=(self.label)
                data-widget-theme=(self.theme) {}
            script { (PreEscaped(LOADER_JS)) }
        }
    }
}

/// Pick the widget described by the `[comments]` config section.
pub fn from_config(config: &CommentsConfig) -> Box<dyn CommentWidget> {
    if config.enabled {
        Box::new(Utterances {
            repo: config.repo.clone(),
            issue_term: config.issue_term.clone(),
            label: config.label.clone(),
            theme: config.theme.clone(),
        })
    } else {
        Box::new(NoComments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterances() -> Utterances {
        Utterances {
            repo: "owner/blog".into(),
            issue_term: "pathname".into(),
            label: "blog-comment".into(),
            theme: "github-dark".into(),
        }
    }

    #[test]
    fn utterances_mount_describes_script() {
        let html = utterances().mount().into_string();
        assert!(html.contains(r#"data-comment-src="https://utteranc.es/client.js""#));
        assert!(html.contains(r#"data-widget-repo="owner/blog""#));
        assert!(html.contains(r#"data-widget-issue-term="pathname""#));
        assert!(html.contains(r#"data-widget-label="blog-comment""#));
        assert!(html.contains(r#"data-widget-theme="github-dark""#));
    }

    #[test]
    fn utterances_mount_includes_loader_with_release() {
        let html = utterances().mount().into_string();
        assert!(html.contains("<script>"));
        assert!(html.contains("pagehide"));
    }

    #[test]
    fn repo_is_escaped() {
        let mut widget = utterances();
        widget.repo = "\"><script>".into();
        let html = widget.mount().into_string();
        assert!(html.contains("&quot;&gt;&lt;script&gt;"));
    }

    #[test]
    fn disabled_config_mounts_nothing() {
        let widget = from_config(&CommentsConfig::default());
        assert_eq!(widget.mount().into_string(), "");
    }

    #[test]
    fn enabled_config_mounts_utterances() {
        let config = CommentsConfig {
            enabled: true,
            repo: "owner/blog".into(),
            ..CommentsConfig::default()
        };
        let html = from_config(&config).mount().into_string();
        assert!(html.contains("owner/blog"));
    }
}
