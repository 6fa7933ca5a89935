//! Rich-media embed detection.
//!
//! Scans a parsed page for video and social-post embeds before the page is
//! distilled, so they can be re-inserted afterwards. Several independent
//! strategies run in a fixed order over the same document; each threads an
//! explicit per-kind dedup set, keyed by canonical id, and later strategies
//! never override an earlier match.
//!
//! Descriptors borrow the document they were detected in. Their `markup`
//! is copied out eagerly, so it survives the document; the `source`
//! back-reference does not.

use std::collections::HashSet;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::parse::{Document, Element};
use crate::Result;

/// The kind of rich-media embed a descriptor represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedKind {
    Video,
    SocialPost,
}

/// One detected embed.
#[derive(Debug, Clone)]
pub struct EmbedDescriptor<'a> {
    pub kind: EmbedKind,
    /// Stable identifier of the source content (video id or post id),
    /// used as the deduplication key. Falls back to a content hash when
    /// no id can be derived; `hashed_id` marks that case.
    pub canonical_id: String,
    /// Captured or synthesized HTML for this embed.
    pub markup: String,
    /// Back-reference into the source document. Lookup only; invalid once
    /// the document is dropped.
    pub source: Option<Element<'a>>,
    /// True when `markup` was generated from a link or id rather than
    /// copied from the page.
    pub synthesized: bool,
    /// True when `canonical_id` is a content-hash fallback rather than a
    /// real video/post id.
    pub hashed_id: bool,
}

const VIDEO_ID_PATTERN: &str =
    r#"(?:youtube(?:-nocookie)?\.com/(?:embed/|shorts/|live/|watch\?[^\s'">]*?v=)|youtu\.be/)([A-Za-z0-9_-]{6,12})"#;

const STATUS_ID_PATTERN: &str = r"/status(?:es)?/(\d+)";

const WIDGET_SCRIPT_HOST: &str = "platform.twitter.com/widgets.js";

fn video_id_regex() -> Regex {
    Regex::new(VIDEO_ID_PATTERN).unwrap()
}

fn status_id_regex() -> Regex {
    Regex::new(STATUS_ID_PATTERN).unwrap()
}

/// Extracts a video id from any recognized watch, share, shorts, or embed URL.
fn extract_video_id(url: &str) -> Option<String> {
    video_id_regex().captures(url).map(|c| c[1].to_string())
}

/// Normalizes a video-identifier attribute value.
///
/// Accepts a bare id, a full watch URL, or a short-link form.
fn normalize_video_id(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if Regex::new(r"^[A-Za-z0-9_-]{6,12}$").unwrap().is_match(trimmed) {
        return Some(trimmed.to_string());
    }
    extract_video_id(trimmed)
}

/// Checks whether an element looks like an author-supplied embed wrapper.
///
/// Recognizes the common class-name convention and the data-attribute
/// convention. When a wrapper is present, detection copies the wrapper
/// rather than the frame so captions and styling survive.
fn is_embed_wrapper(el: &Element<'_>) -> bool {
    if let Some(class) = el.attr("class") {
        let marker = Regex::new(r"(?i)(?:^|[\s_-])(embed|video|youtube|media)(?:$|[\s_-])").unwrap();
        if marker.is_match(class) {
            return true;
        }
    }

    el.attrs().iter().any(|(name, _)| {
        name.starts_with("data-embed") || name == "data-video-id" || name == "data-youtube-id" || name == "data-oembed"
    })
}

/// Builds a standard embeddable frame for a video id.
fn synthesize_video_frame(id: &str) -> String {
    format!(
        r#"<iframe src="https://www.youtube.com/embed/{id}" frameborder="0" allow="accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture" allowfullscreen></iframe>"#
    )
}

/// Derives a deterministic fallback id from an element's leading text.
///
/// Near-duplicate leading text collapses to one id; that is an accepted
/// approximation, two such embeds are treated as the same post.
fn hashed_fallback_id(text: &str) -> String {
    let leading: String = text.trim().chars().take(64).collect();
    let digest = Sha256::digest(leading.as_bytes());
    let hex = format!("{:x}", digest);
    format!("text-{}", &hex[..16])
}

fn is_widget_script(el: &Element<'_>) -> bool {
    el.tag_name() == "script"
        && el
            .attr("src")
            .map(|src| src.contains(WIDGET_SCRIPT_HOST))
            .unwrap_or(false)
}

/// Detects all video and social-post embeds in a document.
///
/// Returns descriptors in strategy discovery order, not document order,
/// deduplicated by canonical id within each kind.
pub fn detect_embeds<'a>(doc: &'a Document) -> Result<Vec<EmbedDescriptor<'a>>> {
    let mut found = Vec::new();
    let mut seen_videos = HashSet::new();
    let mut seen_posts = HashSet::new();

    detect_video_frames(doc, &mut seen_videos, &mut found)?;
    detect_video_data_containers(doc, &mut seen_videos, &mut found)?;
    detect_video_anchors(doc, &mut seen_videos, &mut found)?;
    detect_video_oembed_links(doc, &mut seen_videos, &mut found)?;
    sweep_video_ids(doc, &mut seen_videos, &mut found);

    detect_social_quotes(doc, &mut seen_posts, &mut found)?;
    detect_social_frames(doc, &mut seen_posts, &mut found)?;
    detect_social_scripts(doc, &mut seen_posts, &mut found)?;

    Ok(found)
}

/// Video strategy A: embedded frames with a video-host source URL.
fn detect_video_frames<'a>(
    doc: &'a Document,
    seen: &mut HashSet<String>,
    found: &mut Vec<EmbedDescriptor<'a>>,
) -> Result<()> {
    for frame in doc.select("iframe[src]")? {
        let Some(id) = frame.attr("src").and_then(extract_video_id) else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }

        // Prefer the author's wrapper so captions and styling are kept.
        let (markup, source) = match frame.parent().filter(is_embed_wrapper) {
            Some(wrapper) => (wrapper.outer_html(), wrapper),
            None => (frame.outer_html(), frame.clone()),
        };

        found.push(EmbedDescriptor {
            kind: EmbedKind::Video,
            canonical_id: id,
            markup,
            source: Some(source),
            synthesized: false,
            hashed_id: false,
        });
    }
    Ok(())
}

/// Video strategy B: container elements carrying a video-identifier data
/// attribute but no frame child.
fn detect_video_data_containers<'a>(
    doc: &'a Document,
    seen: &mut HashSet<String>,
    found: &mut Vec<EmbedDescriptor<'a>>,
) -> Result<()> {
    for attr in ["data-youtube-id", "data-video-id", "data-yt-id"] {
        for container in doc.select(&format!("[{attr}]"))? {
            if !container.select("iframe")?.is_empty() {
                continue;
            }
            let Some(id) = container.attr(attr).and_then(normalize_video_id) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }

            found.push(EmbedDescriptor {
                kind: EmbedKind::Video,
                canonical_id: id.clone(),
                markup: synthesize_video_frame(&id),
                source: Some(container),
                synthesized: true,
                hashed_id: false,
            });
        }
    }
    Ok(())
}

/// Video strategy C: anchors linking to a watch or share URL.
fn detect_video_anchors<'a>(
    doc: &'a Document,
    seen: &mut HashSet<String>,
    found: &mut Vec<EmbedDescriptor<'a>>,
) -> Result<()> {
    for anchor in doc.select("a[href]")? {
        let Some(id) = anchor.attr("href").and_then(extract_video_id) else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }

        let descriptor = match anchor.parent().filter(is_embed_wrapper) {
            Some(wrapper) => EmbedDescriptor {
                kind: EmbedKind::Video,
                canonical_id: id,
                markup: wrapper.outer_html(),
                source: Some(wrapper),
                synthesized: false,
                hashed_id: false,
            },
            None => EmbedDescriptor {
                kind: EmbedKind::Video,
                canonical_id: id.clone(),
                markup: synthesize_video_frame(&id),
                source: Some(anchor),
                synthesized: true,
                hashed_id: false,
            },
        };
        found.push(descriptor);
    }
    Ok(())
}

/// Video strategy D: oEmbed discovery links pointing at a video-host URL.
fn detect_video_oembed_links<'a>(
    doc: &'a Document,
    seen: &mut HashSet<String>,
    found: &mut Vec<EmbedDescriptor<'a>>,
) -> Result<()> {
    let selector = r#"link[type="application/json+oembed"], link[type="text/xml+oembed"]"#;
    for link in doc.select(selector)? {
        let Some(href) = link.attr("href") else { continue };

        // The target URL usually rides in the `url` query parameter,
        // percent-encoded; fall back to scanning the href itself.
        let id = url::Url::parse(href)
            .ok()
            .and_then(|parsed| {
                parsed
                    .query_pairs()
                    .find(|(name, _)| name == "url")
                    .and_then(|(_, value)| extract_video_id(&value))
            })
            .or_else(|| extract_video_id(href));

        let Some(id) = id else { continue };
        if !seen.insert(id.clone()) {
            continue;
        }

        found.push(EmbedDescriptor {
            kind: EmbedKind::Video,
            canonical_id: id.clone(),
            markup: synthesize_video_frame(&id),
            source: Some(link),
            synthesized: true,
            hashed_id: false,
        });
    }
    Ok(())
}

/// Video strategy E: full-text sweep of the serialized document.
///
/// Recovers ids the structural strategies missed, such as identifiers
/// buried in inline scripts or JSON data blobs.
fn sweep_video_ids<'a>(doc: &Document, seen: &mut HashSet<String>, found: &mut Vec<EmbedDescriptor<'a>>) {
    let serialized = doc.as_string();
    for captures in video_id_regex().captures_iter(&serialized) {
        let id = captures[1].to_string();
        if !seen.insert(id.clone()) {
            continue;
        }

        found.push(EmbedDescriptor {
            kind: EmbedKind::Video,
            canonical_id: id.clone(),
            markup: synthesize_video_frame(&id),
            source: None,
            synthesized: true,
            hashed_id: false,
        });
    }
}

/// Canonical post id for a quote element, with the hash fallback.
fn quote_post_id(quote: &Element<'_>) -> Result<(String, bool)> {
    let status_re = status_id_regex();
    for anchor in quote.select("a[href]")? {
        if let Some(href) = anchor.attr("href")
            && let Some(captures) = status_re.captures(href)
        {
            return Ok((captures[1].to_string(), false));
        }
    }
    Ok((hashed_fallback_id(&quote.text()), true))
}

/// Finds the widget-loader script associated with a quote element.
///
/// Searches forward siblings, then backward siblings, then the parent
/// container.
fn find_widget_script<'a>(quote: &Element<'a>) -> Option<Element<'a>> {
    quote
        .next_sibling_elements()
        .into_iter()
        .find(is_widget_script)
        .or_else(|| quote.prev_sibling_elements().into_iter().find(is_widget_script))
        .or_else(|| {
            let parent = quote.parent()?;
            parent
                .select("script[src]")
                .ok()?
                .into_iter()
                .find(is_widget_script)
        })
}

/// Social strategy A: quote-style elements carrying the social-embed class.
fn detect_social_quotes<'a>(
    doc: &'a Document,
    seen: &mut HashSet<String>,
    found: &mut Vec<EmbedDescriptor<'a>>,
) -> Result<()> {
    for quote in doc.select("blockquote.twitter-tweet")? {
        let (id, hashed) = quote_post_id(&quote)?;
        if !seen.insert(id.clone()) {
            continue;
        }

        // Keep the loader script alongside the quote; the reconciler
        // decides whether it survives.
        let mut markup = quote.outer_html();
        if let Some(script) = find_widget_script(&quote) {
            markup.push_str(&script.outer_html());
        }

        found.push(EmbedDescriptor {
            kind: EmbedKind::SocialPost,
            canonical_id: id,
            markup,
            source: Some(quote),
            synthesized: false,
            hashed_id: hashed,
        });
    }
    Ok(())
}

/// Social strategy B: frames whose source is a social-host URL.
fn detect_social_frames<'a>(
    doc: &'a Document,
    seen: &mut HashSet<String>,
    found: &mut Vec<EmbedDescriptor<'a>>,
) -> Result<()> {
    let status_re = status_id_regex();
    for frame in doc.select("iframe[src]")? {
        let Some(src) = frame.attr("src") else { continue };
        let is_social_host =
            src.contains("twitter.com") || src.contains("//x.com") || src.contains("platform.twitter");
        if !is_social_host {
            continue;
        }

        let (id, hashed) = match status_re.captures(src) {
            Some(captures) => (captures[1].to_string(), false),
            None => (hashed_fallback_id(src), true),
        };
        if !seen.insert(id.clone()) {
            continue;
        }

        let (markup, source) = match frame.parent().filter(is_embed_wrapper) {
            Some(wrapper) => (wrapper.outer_html(), wrapper),
            None => (frame.outer_html(), frame.clone()),
        };

        found.push(EmbedDescriptor {
            kind: EmbedKind::SocialPost,
            canonical_id: id,
            markup,
            source: Some(source),
            synthesized: false,
            hashed_id: hashed,
        });
    }
    Ok(())
}

/// Social strategy C: script-first pairing.
///
/// Widget-loader scripts whose quote was missed by strategy A ordering are
/// paired with their nearest quote sibling in either direction.
fn detect_social_scripts<'a>(
    doc: &'a Document,
    seen: &mut HashSet<String>,
    found: &mut Vec<EmbedDescriptor<'a>>,
) -> Result<()> {
    for script in doc.select("script[src]")? {
        if !is_widget_script(&script) {
            continue;
        }

        let quote = script
            .next_sibling_elements()
            .into_iter()
            .find(|el| el.tag_name() == "blockquote" && el.has_class("twitter-tweet"))
            .or_else(|| {
                script
                    .prev_sibling_elements()
                    .into_iter()
                    .find(|el| el.tag_name() == "blockquote" && el.has_class("twitter-tweet"))
            });
        let Some(quote) = quote else { continue };

        let (id, hashed) = quote_post_id(&quote)?;
        if !seen.insert(id.clone()) {
            continue;
        }

        let mut markup = quote.outer_html();
        markup.push_str(&script.outer_html());

        found.push(EmbedDescriptor {
            kind: EmbedKind::SocialPost,
            canonical_id: id,
            markup,
            source: Some(quote),
            synthesized: false,
            hashed_id: hashed,
        });
    }
    Ok(())
}
