//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the site directory (`--site`, default `.`) and is layered over the stock
//! defaults, so it only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! title = "spacetraveling"
//! lang = "pt-BR"
//! date_format = "%d %b %Y"
//! date_locale = "pt_BR"
//! placeholder_banner = "/images/banner-placeholder.png"
//!
//! [cms]
//! endpoint = "https://spacetraveling.cdn.prismic.io/api/v2"
//! access_token_env = "PRISMIC_ACCESS_TOKEN"
//! doc_type = "posts"
//! timeout_secs = 10
//!
//! [list]
//! page_size = 1             # Posts on the first list page; the rest load on demand
//!
//! [paths]
//! page_size = 10            # Detail pages pre-rendered at build time
//!
//! [detail]
//! revalidate_secs = 300     # Age after which a detail page is rebuilt
//! words_per_minute = 200    # Reading speed for the reading-time estimate
//!
//! [preview]
//! exit_url = "/api/exit-preview"
//!
//! [comments]
//! enabled = true
//! repo = "owner/blog-comments"
//! issue_term = "pathname"
//! label = "blog-comment"
//! theme = "github-dark"
//!
//! [processing]
//! max_processes = 4         # Max parallel page builds (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use chrono::Locale;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Presentation settings shared by every page.
    pub site: SiteSection,
    /// Content API connection.
    pub cms: CmsConfig,
    /// First list page.
    pub list: ListConfig,
    /// Build-time path enumeration for detail pages.
    pub paths: PathsConfig,
    /// Detail page revalidation and reading time.
    pub detail: DetailConfig,
    pub preview: PreviewConfig,
    /// Comment widget embedded under each post.
    pub comments: CommentsConfig,
    /// Parallel generation settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.list.page_size == 0 {
            return Err(ConfigError::Validation(
                "list.page_size must be at least 1".into(),
            ));
        }
        if self.paths.page_size == 0 {
            return Err(ConfigError::Validation(
                "paths.page_size must be at least 1".into(),
            ));
        }
        if self.detail.words_per_minute == 0 {
            return Err(ConfigError::Validation(
                "detail.words_per_minute must be non-zero".into(),
            ));
        }
        if self.cms.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "cms.timeout_secs must be non-zero".into(),
            ));
        }
        if self.cms.doc_type.is_empty() {
            return Err(ConfigError::Validation(
                "cms.doc_type must not be empty".into(),
            ));
        }
        self.site.locale()?;
        if self.comments.enabled && self.comments.repo.is_empty() {
            return Err(ConfigError::Validation(
                "comments.repo is required when comments are enabled".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSection {
    /// Shown in the `<title>` of the list page and as the header logo text.
    pub title: String,
    /// `lang` attribute of every page.
    pub lang: String,
    /// strftime-style format for publication dates.
    pub date_format: String,
    /// Locale for month names, e.g. `pt_BR`, `en_US`.
    pub date_locale: String,
    /// Banner shown when a post has none.
    pub placeholder_banner: String,
}

impl SiteSection {
    pub fn locale(&self) -> Result<Locale, ConfigError> {
        Locale::try_from(self.date_locale.as_str()).map_err(|_| {
            ConfigError::Validation(format!(
                "site.date_locale '{}' is not a known locale",
                self.date_locale
            ))
        })
    }
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            lang: "pt-BR".to_string(),
            date_format: "%d %b %Y".to_string(),
            date_locale: "pt_BR".to_string(),
            placeholder_banner: "/images/banner-placeholder.png".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CmsConfig {
    /// API root, e.g. `https://<repo>.cdn.prismic.io/api/v2`.
    pub endpoint: String,
    /// Name of the environment variable holding the access token.
    pub access_token_env: String,
    /// Custom type of blog posts.
    pub doc_type: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://spacetraveling.cdn.prismic.io/api/v2".to_string(),
            access_token_env: "PRISMIC_ACCESS_TOKEN".to_string(),
            doc_type: "posts".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListConfig {
    pub page_size: u32,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self { page_size: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub page_size: u32,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetailConfig {
    pub revalidate_secs: u64,
    pub words_per_minute: u32,
}

impl Default for DetailConfig {
    fn default() -> Self {
        Self {
            revalidate_secs: 300,
            words_per_minute: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    /// Link target of the "exit preview" aside.
    pub exit_url: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            exit_url: "/api/exit-preview".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommentsConfig {
    pub enabled: bool,
    /// GitHub repository that stores the comment issues.
    pub repo: String,
    pub issue_term: String,
    pub label: String,
    pub theme: String,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repo: String::new(),
            issue_term: "pathname".to_string(),
            label: "blog-comment".to_string(),
            theme: "github-dark".to_string(),
        }
    }
}

/// Parallel generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of detail pages generated at once.
    /// When absent, defaults to the number of CPU cores.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SiteConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from `config.toml` in the given directory, layered over the
/// stock defaults and validated.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let merged = match load_raw_config(root)? {
        Some(overlay) => merge_toml(stock_defaults_value()?, overlay),
        None => stock_defaults_value()?,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# quill-blog configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Site
# ---------------------------------------------------------------------------
[site]
title = "spacetraveling"
# <html lang="..."> of every page.
lang = "pt-BR"
# Publication date format (strftime) and the locale used for month names.
date_format = "%d %b %Y"
date_locale = "pt_BR"
# Banner image used when a post has none.
placeholder_banner = "/images/banner-placeholder.png"

# ---------------------------------------------------------------------------
# Content API
# ---------------------------------------------------------------------------
[cms]
endpoint = "https://spacetraveling.cdn.prismic.io/api/v2"
# The access token is read from this environment variable, never from this file.
access_token_env = "PRISMIC_ACCESS_TOKEN"
# Custom type holding blog posts.
doc_type = "posts"
# Every request to the API gives up after this many seconds.
timeout_secs = 10

# ---------------------------------------------------------------------------
# List page
# ---------------------------------------------------------------------------
[list]
# Posts rendered into index.html; the rest are loaded with "load more".
page_size = 1

# ---------------------------------------------------------------------------
# Detail pages
# ---------------------------------------------------------------------------
[paths]
# Number of posts whose pages are pre-rendered by `build`. Other posts are
# rendered on first request (`quill-blog page <slug>`).
page_size = 10

[detail]
# A built detail page older than this is rebuilt by `regenerate`.
revalidate_secs = 300
# Reading speed used for the "N min" estimate.
words_per_minute = 200

# ---------------------------------------------------------------------------
# Preview mode
# ---------------------------------------------------------------------------
[preview]
exit_url = "/api/exit-preview"

# ---------------------------------------------------------------------------
# Comments (utterances)
# ---------------------------------------------------------------------------
[comments]
enabled = false
# repo = "owner/blog-comments"
issue_term = "pathname"
label = "blog-comment"
theme = "github-dark"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum detail pages generated in parallel.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
