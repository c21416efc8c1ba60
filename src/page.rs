use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{Result, ScrapeError};

/// A parsed document plus the URL it was loaded from and any embedded
/// frame documents the caller made available.
pub struct Page {
    document: Html,
    url: Url,
    base: Url,
    frames: Vec<Frame>,
}

struct Frame {
    key: FrameKey,
    document: Html,
}

#[derive(PartialEq)]
enum FrameKey {
    /// Position of an `<iframe srcdoc>` among the page's iframes
    Inline(usize),
    Src(Url),
}

/// What the resolver may see behind an `<iframe>`.
pub enum FrameAccess<'p> {
    Document(&'p Html),
    CrossOrigin(String),
    Unavailable,
}

impl Page {
    pub fn parse(html: &str, url: Url) -> Self {
        let document = Html::parse_document(html);

        // <base href> overrides the page URL for relative links
        let base = Selector::parse("base[href]")
            .ok()
            .and_then(|selector| {
                document
                    .select(&selector)
                    .next()
                    .and_then(|base| base.value().attr("href"))
                    .and_then(|href| url.join(href.trim()).ok())
            })
            .unwrap_or_else(|| url.clone());

        let mut frames = Vec::new();
        if let Ok(selector) = Selector::parse("iframe") {
            for (index, iframe) in document.select(&selector).enumerate() {
                if let Some(srcdoc) = iframe.value().attr("srcdoc") {
                    frames.push(Frame {
                        key: FrameKey::Inline(index),
                        document: Html::parse_document(srcdoc),
                    });
                }
            }
        }

        Self {
            document,
            url,
            base,
            frames,
        }
    }

    /// Register the document behind an `<iframe src>`.
    pub fn with_frame(mut self, src: &str, html: &str) -> Self {
        if let Ok(resolved) = self.base.join(src) {
            self.frames.push(Frame {
                key: FrameKey::Src(resolved),
                document: Html::parse_document(html),
            });
        }
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.document.root_element()
    }

    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.document
            .select(&selector)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
    }

    /// Every element of the main document in document order.
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.root().descendants().filter_map(ElementRef::wrap)
    }

    /// Resolve a selector-like pattern against the main document.
    pub fn select(&self, selector: &str) -> Result<Vec<ElementRef<'_>>> {
        select_in(&self.document, selector)
    }

    /// Look behind an iframe. Cross-origin frames are never entered, even
    /// when a document was registered for them.
    pub fn frame_access(&self, iframe: ElementRef<'_>) -> FrameAccess<'_> {
        if let Some(index) = self.iframe_index(iframe) {
            if let Some(frame) = self
                .frames
                .iter()
                .find(|f| f.key == FrameKey::Inline(index))
            {
                return FrameAccess::Document(&frame.document);
            }
        }

        let Some(src) = iframe.value().attr("src") else {
            return FrameAccess::Unavailable;
        };
        let Ok(resolved) = self.base.join(src.trim()) else {
            return FrameAccess::Unavailable;
        };

        if resolved.origin() != self.url.origin() {
            return FrameAccess::CrossOrigin(resolved.to_string());
        }

        self.frames
            .iter()
            .find(|f| f.key == FrameKey::Src(resolved.clone()))
            .map(|f| FrameAccess::Document(&f.document))
            .unwrap_or(FrameAccess::Unavailable)
    }

    fn iframe_index(&self, iframe: ElementRef<'_>) -> Option<usize> {
        self.elements()
            .filter(|el| tag(*el) == "iframe")
            .position(|el| el == iframe)
    }
}

pub fn select_in<'d>(document: &'d Html, selector: &str) -> Result<Vec<ElementRef<'d>>> {
    let parsed = Selector::parse(selector).map_err(|e| ScrapeError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })?;
    Ok(document.select(&parsed).collect())
}

pub fn tag<'a>(el: ElementRef<'a>) -> &'a str {
    el.value().name()
}

/// Concatenated, trimmed text content.
pub fn text_of(el: ElementRef<'_>) -> String {
    let text: String = el.text().collect();
    text.trim().to_string()
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

pub fn ancestor_elements(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    el.ancestors().filter_map(ElementRef::wrap)
}

pub fn child_elements(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    el.children().filter_map(ElementRef::wrap)
}

/// Descendant elements in document order, excluding `el` itself.
pub fn descendant_elements(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    el.descendants().skip(1).filter_map(ElementRef::wrap)
}

/// Descendant `<a href>` elements.
pub fn anchors(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    descendant_elements(el).filter(|a| tag(*a) == "a" && a.value().attr("href").is_some())
}

pub fn href(el: ElementRef<'_>) -> Option<&str> {
    el.value().attr("href").map(str::trim)
}

pub fn class_attr(el: ElementRef<'_>) -> String {
    el.value().attr("class").unwrap_or_default().to_lowercase()
}

pub fn first_class(el: ElementRef<'_>) -> Option<&str> {
    el.value().classes().next()
}
