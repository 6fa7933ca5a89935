//! The article pipeline.
//!
//! Composition root sequencing the whole extraction:
//! validate URL → fetch (escalating if blocked) → parse raw HTML → detect
//! embeds → distill → reconcile → assemble the result. Data flows strictly
//! forward; the only loop in the system is the fetch orchestrator's single
//! escalation step.

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::embeds::detect_embeds;
use crate::extract::extract_article;
use crate::fetch::{Escalation, FetchConfig, fetch_page, validate_url};
use crate::parse::Document;
use crate::reconcile::reconcile;
use crate::Result;

#[cfg(feature = "browser")]
use crate::browser::{BrowserSettings, HeadlessRenderer};

/// The final article returned to the boundary layer.
///
/// Immutable once constructed; this is the only artifact the pipeline
/// hands out.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleResult {
    pub title: String,
    /// Distilled article body with embeds re-inserted, as HTML.
    pub content: String,
    pub excerpt: Option<String>,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    pub source_url: String,
}

/// Whether this pipeline run may escalate to browser automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutomationPolicy {
    /// Escalate when a renderer is available.
    #[default]
    Auto,
    /// Never escalate; the execution environment cannot run a browser.
    Disabled,
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub automation: AutomationPolicy,
    #[cfg(feature = "browser")]
    pub browser: BrowserSettings,
}

/// Extracts an article from a URL, preserving its embeds.
///
/// This is the single entry point consumed by the web/CLI layer. Any
/// failure surfaces as a typed [`crate::ArticuloError`].
pub async fn parse_article(url: &str, config: &PipelineConfig) -> Result<ArticleResult> {
    let fetched = {
        #[cfg(feature = "browser")]
        {
            match config.automation {
                AutomationPolicy::Disabled => {
                    fetch_page(url, &config.fetch, Escalation::RestrictedEnvironment).await?
                }
                AutomationPolicy::Auto => {
                    let renderer = HeadlessRenderer::new(config.browser.clone());
                    fetch_page(url, &config.fetch, Escalation::Renderer(&renderer)).await?
                }
            }
        }
        #[cfg(not(feature = "browser"))]
        {
            let escalation = match config.automation {
                AutomationPolicy::Disabled => Escalation::RestrictedEnvironment,
                AutomationPolicy::Auto => Escalation::NotProvisioned,
            };
            fetch_page(url, &config.fetch, escalation).await?
        }
    };
    debug!(strategy = ?fetched.strategy, status = fetched.status, "page fetched");

    assemble(url, &fetched.html)
}

/// Runs the post-fetch stages of the pipeline on already-retrieved HTML.
///
/// Useful when the caller has its own transport, and for exercising the
/// detection/extraction/reconciliation path without a network.
pub fn parse_article_from_html(url: &str, html: &str) -> Result<ArticleResult> {
    validate_url(url)?;
    assemble(url, html)
}

fn assemble(url: &str, html: &str) -> Result<ArticleResult> {
    let base = Url::parse(url).ok();
    let doc = Document::parse_with_base(html, base)?;

    // Detection runs on the raw page; distillation strips the embeds the
    // descriptors preserve.
    let embeds = detect_embeds(&doc)?;
    debug!(count = embeds.len(), "embeds detected");

    let extracted = extract_article(html, Some(url))?;
    let content = reconcile(&extracted.content, &embeds)?;

    Ok(ArticleResult {
        title: extracted.title,
        content,
        excerpt: extracted.excerpt,
        byline: extracted.byline,
        site_name: extracted.site_name,
        source_url: url.to_string(),
    })
}
