//! Content distillation boundary.
//!
//! Articulo treats readability-style extraction as an external
//! collaborator: raw HTML plus a base URL go in, a clean article body and
//! its metadata come out. The actual algorithm is `dom_smoothie`'s
//! Readability port; any failure or empty result is surfaced as
//! [`ArticuloError::ExtractionFailed`].

use dom_smoothie::Readability;

use crate::{ArticuloError, Result};

/// The distilled article a page reduces to.
#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    pub title: String,
    /// Clean article body as HTML.
    pub content: String,
    pub excerpt: Option<String>,
    pub byline: Option<String>,
    pub site_name: Option<String>,
}

/// Distills raw page HTML into a readable article.
///
/// `base_url` is optional but recommended; it lets the extractor resolve
/// relative links inside the article body.
pub fn extract_article(html: &str, base_url: Option<&str>) -> Result<ExtractedArticle> {
    let mut readability =
        Readability::new(html, base_url, None).map_err(|e| ArticuloError::ExtractionFailed(e.to_string()))?;

    let article = readability
        .parse()
        .map_err(|e| ArticuloError::ExtractionFailed(e.to_string()))?;

    let content = article.content.to_string();
    if content.trim().is_empty() {
        return Err(ArticuloError::ExtractionFailed("extractor returned empty content".to_string()));
    }

    Ok(ExtractedArticle {
        title: article.title,
        content,
        excerpt: article.excerpt,
        byline: article.byline,
        site_name: article.site_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_page() -> String {
        let paragraphs: String = (0..10)
            .map(|i| {
                format!(
                    "<p>Paragraph {i}: the quick brown fox jumps over the lazy dog while \
                     the reporter takes careful notes about everything that happened today.</p>"
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html><html><head><title>A Proper Headline</title></head>
               <body><article><h1>A Proper Headline</h1>{paragraphs}</article></body></html>"#
        )
    }

    #[test]
    fn test_extracts_title_and_content() {
        let extracted = extract_article(&article_page(), Some("https://example.com/post")).unwrap();

        assert!(extracted.title.contains("A Proper Headline"));
        assert!(extracted.content.contains("quick brown fox"));
    }

    #[test]
    fn test_empty_document_fails() {
        let result = extract_article("<html><body></body></html>", None);
        assert!(matches!(result, Err(ArticuloError::ExtractionFailed(_))));
    }
}
