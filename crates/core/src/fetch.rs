//! Resilient page fetching.
//!
//! The orchestrator tries a plain HTTP GET first and escalates to a
//! headless-browser render only when the response looks like deliberate
//! blocking (403/500 or a forbidden-flavored error message). Escalation
//! happens at most once per call; there are no retries within a strategy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::AutomationReason;
use crate::{ArticuloError, Result};

/// Desktop Chrome user agent presented by both fetch strategies.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                                      (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP client configuration for the plain fetch strategy.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// User-Agent string sent with the request.
    pub user_agent: String,
    /// Referer header, when set. A search-engine referer makes the request
    /// read like a click-through rather than a cold scrape.
    pub referer: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: DESKTOP_USER_AGENT.to_string(),
            referer: Some("https://www.google.com/".to_string()),
        }
    }
}

/// Which strategy produced a fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Plain,
    BrowserAutomation,
}

/// The outcome of one successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub html: String,
    /// HTTP status of the final response. Synthesized from the navigation
    /// response for browser-driven fetches.
    pub status: u16,
    pub strategy: FetchStrategy,
    /// True when the plain attempt was classified as blocked and the
    /// result came from escalation.
    pub blocked: bool,
}

/// The output of one browser render.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub status: u16,
}

/// A headless-browser renderer the orchestrator can escalate to.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<RenderedPage>;
}

/// Whether, and how, escalation is available for this call.
pub enum Escalation<'a> {
    /// A renderer is available.
    Renderer(&'a dyn PageRenderer),
    /// Automation is disabled because the execution environment cannot run
    /// a browser.
    RestrictedEnvironment,
    /// No browser was ever provisioned for this build.
    NotProvisioned,
}

/// Validates that a URL parses and uses an HTTP scheme.
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| ArticuloError::InvalidUrl(e.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ArticuloError::InvalidUrl(format!("unsupported scheme: {}", parsed.scheme())));
    }

    Ok(parsed)
}

/// Fetches a page, escalating from plain HTTP to browser automation when
/// the site blocks the plain request.
pub async fn fetch_page(url: &str, config: &FetchConfig, escalation: Escalation<'_>) -> Result<FetchResult> {
    let parsed = validate_url(url)?;

    match plain_fetch(&parsed, config).await {
        Ok(result) => Ok(result),
        Err(err) if is_blocked(&err) => {
            debug!(url, error = %err, "plain fetch blocked, escalating");
            escalate(url, err, escalation).await
        }
        Err(err) => Err(err),
    }
}

/// A single plain GET with a realistic desktop header set, following
/// redirects.
async fn plain_fetch(url: &Url, config: &FetchConfig) -> Result<FetchResult> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(|e| ArticuloError::FetchFailed { status: None, message: e.to_string() })?;

    let mut request = client
        .get(url.clone())
        .header("User-Agent", &config.user_agent)
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .header("Upgrade-Insecure-Requests", "1");
    if let Some(referer) = &config.referer {
        request = request.header("Referer", referer);
    }

    let response = request.send().await.map_err(|e| ArticuloError::FetchFailed {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ArticuloError::FetchFailed {
            status: Some(status.as_u16()),
            message: format!("request to {url} returned status {status}"),
        });
    }

    let html = response.text().await.map_err(|e| ArticuloError::FetchFailed {
        status: Some(status.as_u16()),
        message: e.to_string(),
    })?;

    Ok(FetchResult { html, status: status.as_u16(), strategy: FetchStrategy::Plain, blocked: false })
}

/// Classifies a plain-fetch failure as blocked.
///
/// 403 and 500 responses are treated as blocking. The message scan only
/// applies when no status was received at all; a response with any other
/// status is an ordinary failure regardless of what its text mentions.
pub(crate) fn is_blocked(err: &ArticuloError) -> bool {
    match err {
        ArticuloError::FetchFailed { status: Some(403 | 500), .. } => true,
        ArticuloError::FetchFailed { status: Some(_), .. } => false,
        ArticuloError::FetchFailed { status: None, message } => {
            let message = message.to_lowercase();
            message.contains("forbidden") || message.contains("403") || message.contains("500")
        }
        _ => false,
    }
}

/// A 500-pattern failure during rendering.
///
/// Approximation: at this layer a transient upstream 500 is
/// indistinguishable from deliberate blocking, so both classify as
/// anti-bot.
fn is_server_error_pattern(err: &ArticuloError) -> bool {
    match err {
        ArticuloError::HttpError { status, .. } => *status >= 500,
        other => other.to_string().contains("500"),
    }
}

async fn escalate(url: &str, plain_err: ArticuloError, escalation: Escalation<'_>) -> Result<FetchResult> {
    match escalation {
        Escalation::Renderer(renderer) => match renderer.render(url).await {
            Ok(page) => Ok(FetchResult {
                html: page.html,
                status: page.status,
                strategy: FetchStrategy::BrowserAutomation,
                blocked: true,
            }),
            Err(render_err) if is_server_error_pattern(&render_err) => {
                Err(ArticuloError::LikelyAntiBot { url: url.to_string() })
            }
            Err(render_err) => Err(ArticuloError::BrowserAutomationFailed {
                message: render_err.to_string(),
                plain_error: plain_err.to_string(),
            }),
        },
        Escalation::RestrictedEnvironment => {
            Err(ArticuloError::AutomationUnavailable { reason: AutomationReason::RestrictedEnvironment })
        }
        Escalation::NotProvisioned => {
            Err(ArticuloError::AutomationUnavailable { reason: AutomationReason::NotProvisioned })
        }
    }
}
