#[cfg(feature = "browser")]
pub mod browser;
pub mod embeds;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod parse;
pub mod pipeline;
pub mod reconcile;

#[cfg(feature = "browser")]
pub use browser::{BrowserSettings, HeadlessRenderer, render_page};
pub use embeds::{EmbedDescriptor, EmbedKind, detect_embeds};
pub use error::{ArticuloError, AutomationReason, Result};
pub use extract::{ExtractedArticle, extract_article};
pub use fetch::{Escalation, FetchConfig, FetchResult, FetchStrategy, PageRenderer, RenderedPage, fetch_page};
pub use parse::{Document, Element};
pub use pipeline::{ArticleResult, AutomationPolicy, PipelineConfig, parse_article, parse_article_from_html};
pub use reconcile::reconcile;
