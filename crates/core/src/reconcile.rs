//! Embed re-insertion into distilled content.
//!
//! Generic readability extraction strips iframes and widget markup; this
//! module puts the detected embeds back. Each descriptor becomes one
//! block-level wrapper tagged with its kind, appended to the end of the
//! distilled content. Appending rather than restoring original position is
//! a deliberate simplification carried over from the detection contract:
//! descriptors do not record where in the article the embed sat.

use tracing::debug;

use crate::embeds::{EmbedDescriptor, EmbedKind};
use crate::parse::{Document, Element};
use crate::Result;

const WRAPPER_CLASS: &str = "article-embed";
const SOCIAL_MARKER_CLASS: &str = "twitter-tweet";

/// Re-inserts detected embeds into distilled article content.
///
/// With an empty embed list the distilled content is returned unchanged.
pub fn reconcile(content_html: &str, embeds: &[EmbedDescriptor<'_>]) -> Result<String> {
    if embeds.is_empty() {
        return Ok(content_html.to_string());
    }

    let mut output = String::from(content_html);
    for embed in embeds {
        let block = match embed.kind {
            EmbedKind::Video => video_block(embed)?,
            EmbedKind::SocialPost => social_block(embed)?,
        };
        debug!(id = %embed.canonical_id, kind = ?embed.kind, "re-inserting embed");
        output.push_str(&block);
    }

    Ok(output)
}

/// Builds the wrapper for a video embed.
///
/// Locates (or synthesizes) a single frame and wraps it in a
/// fixed-aspect-ratio container so it scales with width. When no frame can
/// be produced, the raw captured markup is rendered centered instead.
fn video_block(embed: &EmbedDescriptor<'_>) -> Result<String> {
    match locate_or_synthesize_frame(embed)? {
        Some(frame) => Ok(format!(
            r#"<div class="{WRAPPER_CLASS}" data-embed-kind="video"><div style="position:relative;padding-bottom:56.25%;height:0;overflow:hidden;">{frame}</div></div>"#
        )),
        None => Ok(format!(
            r#"<div class="{WRAPPER_CLASS}" data-embed-kind="video" style="text-align:center;">{}</div>"#,
            embed.markup
        )),
    }
}

fn locate_or_synthesize_frame(embed: &EmbedDescriptor<'_>) -> Result<Option<String>> {
    let fragment = Document::parse_fragment(&embed.markup)?;

    if let Some(frame) = fragment.select("iframe[src]")?.into_iter().next() {
        let src = frame.attr("src").unwrap_or_default();
        return Ok(Some(responsive_frame(src)));
    }

    // No frame in the captured markup; synthesize one when the canonical
    // id is a real video id rather than a hash fallback.
    if !embed.hashed_id {
        let src = format!("https://www.youtube.com/embed/{}", embed.canonical_id);
        return Ok(Some(responsive_frame(&src)));
    }

    Ok(None)
}

fn responsive_frame(src: &str) -> String {
    format!(
        r#"<iframe src="{}" style="position:absolute;top:0;left:0;width:100%;height:100%;" frameborder="0" allowfullscreen></iframe>"#,
        escape_attr(src)
    )
}

/// Builds the wrapper for a social-post embed.
///
/// Moves every non-script child of the captured markup into the wrapper.
/// Widget-loader scripts are dropped here: inserted via static markup they
/// never execute, so re-attaching the loader is the presentation layer's
/// job.
fn social_block(embed: &EmbedDescriptor<'_>) -> Result<String> {
    let fragment = Document::parse_fragment(&embed.markup)?;
    let mut inner = String::new();

    for child in fragment.root_children() {
        match child.tag_name().as_str() {
            "script" => continue,
            "blockquote" => inner.push_str(&rebuild_quote(&child, embed)?),
            "iframe" => inner.push_str(&normalized_social_frame(&child)),
            _ => inner.push_str(&child.outer_html()),
        }
    }

    Ok(format!(r#"<div class="{WRAPPER_CLASS}" data-embed-kind="social-post">{inner}</div>"#))
}

/// Re-serializes the quote element with the marker class and a bounded
/// width guaranteed, appending a minimal status link when the quote has no
/// outbound link for the live widget to hydrate from.
fn rebuild_quote(quote: &Element<'_>, embed: &EmbedDescriptor<'_>) -> Result<String> {
    let mut classes = quote.classes();
    if !classes.iter().any(|c| c == SOCIAL_MARKER_CLASS) {
        classes.push(SOCIAL_MARKER_CLASS.to_string());
    }

    let mut extra_attrs = String::new();
    for (name, value) in quote.attrs() {
        if name == "class" || name == "style" {
            continue;
        }
        extra_attrs.push_str(&format!(r#" {}="{}""#, name, escape_attr(&value)));
    }

    let mut inner = quote.inner_html();
    if !embed.hashed_id && quote.select("a[href]")?.is_empty() {
        inner.push_str(&format!(r#"<a href="https://twitter.com/i/status/{}"></a>"#, embed.canonical_id));
    }

    Ok(format!(
        r#"<blockquote class="{}" style="max-width:550px;margin:10px auto;"{}>{}</blockquote>"#,
        classes.join(" "),
        extra_attrs,
        inner
    ))
}

/// Re-serializes an embedded social frame with its sizing normalized.
fn normalized_social_frame(frame: &Element<'_>) -> String {
    let mut attrs = String::new();
    for (name, value) in frame.attrs() {
        if name == "style" || name == "width" || name == "height" {
            continue;
        }
        attrs.push_str(&format!(r#" {}="{}""#, name, escape_attr(&value)));
    }

    format!(r#"<iframe{attrs} style="max-width:100%;width:550px;"></iframe>"#)
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeds::detect_embeds;

    fn page(body: &str) -> String {
        format!("<html><head><title>t</title></head><body>{body}</body></html>")
    }

    fn embeds_for(html: &str) -> (Document, String) {
        (Document::parse(html).unwrap(), html.to_string())
    }

    #[test]
    fn test_empty_embed_list_returns_content_unchanged() {
        let content = "<div id=\"readability-page-1\"><p>Hello.</p></div>";
        let result = reconcile(content, &[]).unwrap();
        assert_eq!(result, content);
    }

    #[test]
    fn test_video_embed_appended_with_responsive_frame() {
        let html = page(r#"<iframe src="https://www.youtube.com/embed/abc12345678"></iframe>"#);
        let (doc, _) = embeds_for(&html);
        let embeds = detect_embeds(&doc).unwrap();

        let result = reconcile("<p>article</p>", &embeds).unwrap();

        assert!(result.starts_with("<p>article</p>"));
        assert_eq!(result.matches(r#"data-embed-kind="video""#).count(), 1);
        assert!(result.contains("/embed/abc12345678"));
        assert!(result.contains("padding-bottom:56.25%"));
    }

    #[test]
    fn test_synthesized_video_markup_reconciles_to_frame() {
        let html = page(r#"<div data-youtube-id="abc12345678"></div>"#);
        let (doc, _) = embeds_for(&html);
        let embeds = detect_embeds(&doc).unwrap();

        let result = reconcile("<p>a</p>", &embeds).unwrap();
        assert!(result.contains(r#"src="https://www.youtube.com/embed/abc12345678""#));
    }

    #[test]
    fn test_social_embed_drops_loader_script() {
        let html = page(
            r#"<blockquote class="twitter-tweet"><p>post text</p>
               <a href="https://twitter.com/user/status/1234567890">view</a></blockquote>
               <script async src="https://platform.twitter.com/widgets.js"></script>"#,
        );
        let (doc, _) = embeds_for(&html);
        let embeds = detect_embeds(&doc).unwrap();
        assert!(embeds[0].markup.contains("widgets.js"));

        let result = reconcile("<p>a</p>", &embeds).unwrap();

        assert!(result.contains(r#"data-embed-kind="social-post""#));
        assert!(result.contains("post text"));
        assert!(!result.contains("widgets.js"));
    }

    #[test]
    fn test_social_quote_gains_marker_class_and_width() {
        let html = page(
            r#"<blockquote class="twitter-tweet"><p>text</p>
               <a href="https://twitter.com/user/status/55">view</a></blockquote>"#,
        );
        let (doc, _) = embeds_for(&html);
        let embeds = detect_embeds(&doc).unwrap();

        let result = reconcile("", &embeds).unwrap();
        assert!(result.contains("twitter-tweet"));
        assert!(result.contains("max-width:550px"));
    }

    #[test]
    fn test_social_quote_without_link_gains_fallback_link() {
        // Build a descriptor with a real id but a quote lacking any anchor.
        let html = page(
            r#"<iframe src="https://platform.twitter.com/embed/Tweet.html?x=/status/777"></iframe>
               <blockquote class="twitter-tweet"><p>just text</p></blockquote>"#,
        );
        let doc = Document::parse(&html).unwrap();
        let mut embeds = detect_embeds(&doc).unwrap();

        // The frame descriptor (real id 777) with quote-only markup.
        let frame_descriptor = embeds.iter_mut().find(|e| e.canonical_id == "777").unwrap();
        frame_descriptor.markup = r#"<blockquote class="twitter-tweet"><p>just text</p></blockquote>"#.to_string();

        let result = reconcile("", std::slice::from_ref(&*frame_descriptor)).unwrap();
        assert!(result.contains(r#"href="https://twitter.com/i/status/777""#));
    }

    #[test]
    fn test_social_frame_sizing_normalized() {
        let html = page(r#"<iframe src="https://platform.twitter.com/embed/Tweet.html?x=/status/88" width="900" height="700"></iframe>"#);
        let doc = Document::parse(&html).unwrap();
        let embeds = detect_embeds(&doc).unwrap();

        let result = reconcile("", &embeds).unwrap();
        assert!(result.contains("max-width:100%"));
        assert!(!result.contains(r#"width="900""#));
    }

    #[test]
    fn test_hashed_id_quote_gets_no_fallback_link() {
        let html = page(r#"<blockquote class="twitter-tweet"><p>quote with no link</p></blockquote>"#);
        let doc = Document::parse(&html).unwrap();
        let embeds = detect_embeds(&doc).unwrap();
        assert!(embeds[0].hashed_id);

        let result = reconcile("", &embeds).unwrap();
        assert!(!result.contains("/i/status/"));
    }

    #[test]
    fn test_escape_attr_neutralizes_markup_chars() {
        assert_eq!(escape_attr(r#"a<b&c"d"#), "a&lt;b&amp;c&quot;d");
    }

    #[test]
    fn test_attr_values_escaped_in_rebuilt_quote() {
        let html = page(
            r#"<blockquote class="twitter-tweet" data-note='a<b&c"d'><p>text</p>
               <a href="https://twitter.com/user/status/55">view</a></blockquote>"#,
        );
        let doc = Document::parse(&html).unwrap();
        let embeds = detect_embeds(&doc).unwrap();

        let result = reconcile("", &embeds).unwrap();
        assert!(result.contains(r#"data-note="a&lt;b&amp;c&quot;d""#));
        assert!(!result.contains(r#"data-note="a<b"#));
    }

    #[test]
    fn test_multiple_embeds_appended_in_detection_order() {
        let html = page(
            r#"<iframe src="https://www.youtube.com/embed/abc12345678"></iframe>
               <blockquote class="twitter-tweet">
               <a href="https://twitter.com/u/status/9">p</a></blockquote>"#,
        );
        let doc = Document::parse(&html).unwrap();
        let embeds = detect_embeds(&doc).unwrap();

        let result = reconcile("<p>body</p>", &embeds).unwrap();
        let video_at = result.find(r#"data-embed-kind="video""#).unwrap();
        let social_at = result.find(r#"data-embed-kind="social-post""#).unwrap();
        assert!(video_at < social_at);
    }
}
