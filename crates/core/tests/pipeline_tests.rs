//! End-to-end tests for the post-fetch pipeline stages.
//!
//! These exercise detection, distillation, and reconciliation together
//! through `parse_article_from_html`, with no network involved.

use articulo_core::{EmbedKind, detect_embeds, extract_article, parse_article_from_html, Document};

/// A page with enough prose for the extractor to find an article body.
fn article_page(extra_body: &str) -> String {
    let paragraphs: String = (0..10)
        .map(|i| {
            format!(
                "<p>Paragraph {i}: the city council voted on the new transit plan today after \
                 months of public hearings, and residents on both sides turned out in force.</p>"
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><title>Transit Plan Approved</title></head>
<body>
<article>
<h1>Transit Plan Approved</h1>
{paragraphs}
{extra_body}
</article>
</body>
</html>"#
    )
}

#[test]
fn video_embed_survives_extraction() {
    let html = article_page(r#"<iframe src="https://www.youtube.com/embed/abc12345678"></iframe>"#);

    let result = parse_article_from_html("https://example.com/post", &html).unwrap();

    assert!(result.title.contains("Transit Plan Approved"));
    assert_eq!(result.content.matches(r#"data-embed-kind="video""#).count(), 1);

    // The wrapper's frame must point at the same video.
    let content_doc = Document::parse(&result.content).unwrap();
    let frames = content_doc
        .select(r#"div[data-embed-kind="video"] iframe"#)
        .unwrap();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].attr("src").unwrap().ends_with("/embed/abc12345678"));
}

#[test]
fn page_without_embeds_returns_distilled_content_unchanged() {
    let html = article_page("");

    let result = parse_article_from_html("https://example.com/post", &html).unwrap();
    let distilled = extract_article(&html, Some("https://example.com/post")).unwrap();

    assert_eq!(result.content, distilled.content);
    assert!(!result.content.contains("data-embed-kind"));
}

#[test]
fn social_post_embed_survives_extraction() {
    let html = article_page(
        r#"<blockquote class="twitter-tweet"><p>Big news for riders!</p>
           <a href="https://twitter.com/transit/status/1234567890">view post</a></blockquote>
           <script async src="https://platform.twitter.com/widgets.js"></script>"#,
    );

    let result = parse_article_from_html("https://example.com/post", &html).unwrap();

    assert_eq!(result.content.matches(r#"data-embed-kind="social-post""#).count(), 1);
    assert!(result.content.contains("Big news for riders!"));
    // Loader scripts never survive reconciliation.
    assert!(!result.content.contains("widgets.js"));
}

#[test]
fn same_video_exposed_three_ways_appears_once() {
    let html = article_page(
        r#"<iframe src="https://www.youtube.com/embed/abc12345678"></iframe>
           <div data-youtube-id="abc12345678"></div>
           <p><a href="https://www.youtube.com/watch?v=abc12345678">watch</a></p>"#,
    );

    let doc = Document::parse(&html).unwrap();
    let embeds = detect_embeds(&doc).unwrap();
    let videos: Vec<_> = embeds.iter().filter(|e| e.kind == EmbedKind::Video).collect();
    assert_eq!(videos.len(), 1);

    let result = parse_article_from_html("https://example.com/post", &html).unwrap();
    assert_eq!(result.content.matches(r#"data-embed-kind="video""#).count(), 1);
}

#[test]
fn mixed_embeds_are_all_preserved() {
    let html = article_page(
        r#"<iframe src="https://www.youtube.com/embed/abc12345678"></iframe>
           <iframe src="https://www.youtube.com/embed/xyz98765432"></iframe>
           <blockquote class="twitter-tweet">
           <a href="https://twitter.com/u/status/42">post</a></blockquote>"#,
    );

    let result = parse_article_from_html("https://example.com/post", &html).unwrap();

    assert_eq!(result.content.matches(r#"data-embed-kind="video""#).count(), 2);
    assert_eq!(result.content.matches(r#"data-embed-kind="social-post""#).count(), 1);
}

#[test]
fn result_carries_source_url_and_metadata_fields() {
    let html = article_page("");
    let result = parse_article_from_html("https://example.com/post", &html).unwrap();

    assert_eq!(result.source_url, "https://example.com/post");
    // Excerpt/byline/site name are extractor-dependent; the fields just
    // have to be present and serializable.
    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("excerpt").is_some());
    assert!(json.get("byline").is_some());
    assert!(json.get("site_name").is_some());
}
