//! Error types for Articulo operations.
//!
//! This module defines the main error type [`ArticuloError`] which represents
//! all possible errors that can occur while fetching a page, escalating to
//! browser automation, and extracting article content.

use thiserror::Error;

/// Why browser-automation escalation could not be attempted.
///
/// The two cases carry different remediation, so they are kept distinct
/// rather than folded into one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationReason {
    /// Automation was explicitly disabled because the current execution
    /// environment cannot run a headless browser.
    RestrictedEnvironment,
    /// No headless browser is available to this build.
    NotProvisioned,
}

impl std::fmt::Display for AutomationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutomationReason::RestrictedEnvironment => write!(
                f,
                "browser automation is disabled in this restricted execution environment; \
                 re-run from an environment that permits a headless browser"
            ),
            AutomationReason::NotProvisioned => write!(
                f,
                "no headless browser is provisioned; install Chromium and build with the `browser` feature"
            ),
        }
    }
}

/// Main error type for article extraction operations.
///
/// Best-effort sub-steps (modal dismissal, the content-ready wait) never
/// produce these errors; they log and continue. Everything else propagates
/// to the pipeline boundary unmodified, apart from message enrichment.
#[derive(Error, Debug)]
pub enum ArticuloError {
    /// Invalid URL provided.
    ///
    /// Returned when a URL cannot be parsed or uses a non-HTTP scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The plain fetch failed with a non-blocking transport or HTTP error.
    ///
    /// This covers everything that does not look like deliberate blocking
    /// (404s, DNS failures, timeouts). Blocked responses escalate instead.
    #[error("Fetch failed: {message}")]
    FetchFailed {
        /// HTTP status of the failed response, when one was received.
        status: Option<u16>,
        message: String,
    },

    /// The site blocked the plain request and no escalation path exists.
    #[error("Site blocked the request and {reason}")]
    AutomationUnavailable { reason: AutomationReason },

    /// Browser-automation escalation was attempted and failed.
    ///
    /// Carries the original plain-fetch error text for diagnostics.
    #[error("Browser automation failed: {message} (plain fetch previously failed with: {plain_error})")]
    BrowserAutomationFailed { message: String, plain_error: String },

    /// Escalation itself hit a 500-pattern error.
    ///
    /// Treated as a persistent site-level block rather than a transient
    /// fault. This is a heuristic, not a proven classifier.
    #[error("{url} appears to be protected by anti-bot measures; retry later or try a different URL")]
    LikelyAntiBot { url: String },

    /// Browser navigation produced no response object.
    #[error("Browser navigation returned no response")]
    NoResponse,

    /// The rendered page returned an error status that is not a challenge.
    #[error("Page returned HTTP {status}: {snippet}")]
    HttpError { status: u16, snippet: String },

    /// An anti-bot challenge did not resolve within the time budget.
    #[error("Anti-bot challenge did not resolve within the time budget: {snippet}")]
    ChallengeTimeout { snippet: String },

    /// A browser-driver operation failed (launch, navigation, capture).
    #[error("Browser rendering failed: {0}")]
    RenderFailed(String),

    /// The distillation collaborator returned no usable article.
    #[error("Content extraction failed: {0}")]
    ExtractionFailed(String),

    /// HTML parsing errors.
    ///
    /// Returned when HTML cannot be parsed, often due to invalid CSS selectors.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),
}

/// Result type alias for ArticuloError.
///
/// This is a convenience alias for `std::result::Result<T, ArticuloError>`.
pub type Result<T> = std::result::Result<T, ArticuloError>;
