//! HTML parsing and DOM navigation.
//!
//! This module provides the [`Document`] and [`Element`] types for parsing
//! HTML and walking the DOM tree using CSS selectors. [`Element`] values
//! borrow the document they came from; copy any markup out with
//! [`Element::outer_html`] before the document is dropped.

use scraper::{CaseSensitivity, ElementRef, Html, Selector};
use url::Url;

use crate::{ArticuloError, Result};

/// Represents a parsed HTML document.
///
/// A Document wraps an HTML page and provides methods for querying elements
/// using CSS selectors and serializing the tree back to a string.
///
/// # Example
///
/// ```rust
/// use articulo_core::parse::Document;
///
/// let html = "<html><head><title>Test</title></head><body><p>Hello</p></body></html>";
/// let doc = Document::parse(html).unwrap();
/// assert_eq!(doc.title(), Some("Test".to_string()));
/// ```
pub struct Document {
    html: Html,
    base_url: Option<Url>,
}

impl Document {
    /// Parses a full HTML document from a string.
    pub fn parse(html: &str) -> Result<Self> {
        let html = Html::parse_document(html);
        Ok(Self { html, base_url: None })
    }

    /// Parses a full HTML document, remembering the base URL it came from.
    pub fn parse_with_base(html: &str, base_url: Option<Url>) -> Result<Self> {
        let html = Html::parse_document(html);
        Ok(Self { html, base_url })
    }

    /// Parses an HTML fragment (markup without a surrounding document).
    ///
    /// Used for captured embed markup, which is a sequence of top-level
    /// nodes rather than a complete page. Iterate the fragment's nodes
    /// with [`Document::root_children`].
    pub fn parse_fragment(html: &str) -> Result<Self> {
        let html = Html::parse_fragment(html);
        Ok(Self { html, base_url: None })
    }

    /// Gets the base URL this document was parsed with.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Gets the entire document serialized back to an HTML string.
    pub fn as_string(&self) -> String {
        self.html.html()
    }

    /// Selects elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`ArticuloError::HtmlParseError`] if the selector is invalid.
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel =
            Selector::parse(selector).map_err(|e| ArticuloError::HtmlParseError(format!("Invalid selector: {}", e)))?;

        Ok(self.html.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// Gets the title of the document.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
    }

    /// Gets all text content from the document.
    pub fn text_content(&self) -> String {
        self.html.root_element().text().collect()
    }

    /// Gets the direct element children of the document root.
    ///
    /// For fragments this yields the fragment's top-level elements.
    pub fn root_children(&self) -> Vec<Element<'_>> {
        self.html
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .map(|element| Element { element })
            .collect()
    }
}

/// A wrapper around scraper's ElementRef for DOM navigation.
///
/// Element represents a single node in the HTML document tree and provides
/// access to attributes, text content, markup, and nearby elements.
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    /// Gets the inner HTML of this element.
    pub fn inner_html(&self) -> String {
        self.element.inner_html()
    }

    /// Gets the outer HTML of this element, including its own tags.
    pub fn outer_html(&self) -> String {
        self.element.html()
    }

    /// Gets the text content of this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets the value of an attribute, or `None` if it is not present.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets all attributes of this element as (name, value) pairs.
    pub fn attrs(&self) -> Vec<(String, String)> {
        self.element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    /// Gets the lowercase tag name of this element.
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Gets the classes of this element.
    pub fn classes(&self) -> Vec<String> {
        self.element.value().classes().map(str::to_string).collect()
    }

    /// Checks whether this element carries the given class.
    pub fn has_class(&self, class: &str) -> bool {
        self.element
            .value()
            .has_class(class, CaseSensitivity::AsciiCaseInsensitive)
    }

    /// Gets the parent element, if the parent node is an element.
    pub fn parent(&self) -> Option<Element<'a>> {
        self.element
            .parent()
            .and_then(ElementRef::wrap)
            .map(|element| Element { element })
    }

    /// Gets preceding sibling elements, nearest first.
    pub fn prev_sibling_elements(&self) -> Vec<Element<'a>> {
        self.element
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .map(|element| Element { element })
            .collect()
    }

    /// Gets following sibling elements, nearest first.
    pub fn next_sibling_elements(&self) -> Vec<Element<'a>> {
        self.element
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .map(|element| Element { element })
            .collect()
    }

    /// Selects descendant elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`ArticuloError::HtmlParseError`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel =
            Selector::parse(selector).map_err(|e| ArticuloError::HtmlParseError(format!("Invalid selector: {}", e)))?;

        Ok(self.element.select(&sel).map(|el| Element { element: el }).collect())
    }
}
