use regex::Regex;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use crate::config::{EngineConfig, MarkerLinkConfig};
use crate::noise::{
    class_has_token, class_mentions, in_chrome, is_furniture, is_navigation_list,
    is_pagination_list, is_qualifying_anchor,
};
use crate::page::{
    anchors, ancestor_elements, char_len, child_elements, class_attr, descendant_elements,
    parent_element, tag, text_of, truncate_chars, Page,
};

const PREVIEW_CHARS: usize = 100;

static SEARCH_PHRASES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        "当前搜索到",
        "搜索结果",
        "找到.*结果",
        "共.*条",
        "(?i)search.*result",
        "相关结果",
        "网站内容",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("hardcoded regex pattern is valid"))
    .collect()
});

static CSS_IDENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?[A-Za-z_][A-Za-z0-9_-]*$").expect("hardcoded regex pattern is valid")
});

static MARKER_TEXT_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^一-龥a-zA-Z0-9\s【】（）]").expect("hardcoded regex pattern is valid")
});

const LIST_KEYWORDS: &[&str] = &["list", "result", "search"];
const FALLBACK_CLASS_MARKERS: &[&str] = &["list-item", "result-item", "search-result"];
const FALLBACK_SKIP_TOKENS: &[&str] = &["ad", "banner", "footer"];

/// How a caller addresses a container found by detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SelectorDescriptor {
    Css(String),
    /// The ancestor grouping all marker links, recomputed on every resolve
    MarkerGroup,
}

impl SelectorDescriptor {
    pub const MARKER_TOKEN: &'static str = "marker-link-container";

    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == Self::MARKER_TOKEN {
            Self::MarkerGroup
        } else {
            Self::Css(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(selector) => selector,
            Self::MarkerGroup => Self::MARKER_TOKEN,
        }
    }
}

impl fmt::Display for SelectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for SelectorDescriptor {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<SelectorDescriptor> for String {
    fn from(descriptor: SelectorDescriptor) -> Self {
        descriptor.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    SearchWrapper,
    SearchList,
    KeywordList,
    RepeatedSiblings,
    MarkerGroup,
    Table,
    List,
    Container,
}

impl CandidateKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SearchWrapper => "search results (link wrapper)",
            Self::SearchList => "search results list",
            Self::KeywordList => "result list",
            Self::RepeatedSiblings => "repeated items",
            Self::MarkerGroup => "search results (marker links)",
            Self::Table => "table",
            Self::List => "list",
            Self::Container => "container",
        }
    }
}

/// A proposed list container. Lower `priority` ranks first.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate<'p> {
    #[serde(skip)]
    pub container: ElementRef<'p>,
    pub selector: SelectorDescriptor,
    pub item_count: usize,
    pub preview: String,
    pub kind: CandidateKind,
    pub priority: i32,
}

impl Candidate<'_> {
    pub fn description(&self) -> String {
        format!(
            "{} - {} items - {}",
            self.kind.label(),
            self.item_count,
            truncate_chars(&self.preview, 50)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    SearchRegion,
    KeywordList,
    RepeatedSiblings,
    MarkerGroup,
    Fallback,
}

impl Tier {
    const ORDER: [Tier; 5] = [
        Tier::SearchRegion,
        Tier::KeywordList,
        Tier::RepeatedSiblings,
        Tier::MarkerGroup,
        Tier::Fallback,
    ];

    fn name(self) -> &'static str {
        match self {
            Tier::SearchRegion => "A (search region)",
            Tier::KeywordList => "B (keyword list)",
            Tier::RepeatedSiblings => "C (repeated siblings)",
            Tier::MarkerGroup => "D (marker links)",
            Tier::Fallback => "E (fallback sweep)",
        }
    }

    fn run<'p>(self, detector: &ListDetector<'_>, page: &'p Page) -> Vec<Candidate<'p>> {
        match self {
            Tier::SearchRegion => detector.search_region(page),
            Tier::KeywordList => detector.keyword_lists(page),
            Tier::RepeatedSiblings => detector.repeated_siblings(page),
            Tier::MarkerGroup => detector.marker_candidates(page),
            Tier::Fallback => detector.fallback_sweep(page),
        }
    }
}

/// Runs the detection tiers in order; the first tier that proposes anything ends the run.
pub struct ListDetector<'c> {
    config: &'c EngineConfig,
}

impl<'c> ListDetector<'c> {
    pub fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }

    /// Run the tiers in order and return the first non-empty, ranked set.
    pub fn collect<'p>(&self, page: &'p Page) -> Vec<Candidate<'p>> {
        for tier in Tier::ORDER {
            let mut found = tier.run(self, page);
            if found.is_empty() {
                log::debug!("Tier {} proposed nothing", tier.name());
                continue;
            }

            // stable: equal keys keep first-seen order
            found.sort_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| b.item_count.cmp(&a.item_count))
            });
            log::info!(
                "Tier {} proposed {} candidate(s), best: {} ({} items)",
                tier.name(),
                found.len(),
                found[0].selector,
                found[0].item_count
            );
            return found;
        }

        log::info!("No list candidates found");
        Vec::new()
    }

    /// The highest-ranked candidate of the first tier that finds one.
    pub fn best<'p>(&self, page: &'p Page) -> Option<Candidate<'p>> {
        self.collect(page).into_iter().next()
    }

    // Tier A

    fn search_region<'p>(&self, page: &'p Page) -> Vec<Candidate<'p>> {
        let thresholds = &self.config.thresholds;
        let Some(region) = find_search_region(page, thresholds.search_wrapper_links) else {
            return Vec::new();
        };
        log::debug!("Search region found at <{}>", tag(region));

        let scope: Vec<ElementRef<'p>> = std::iter::once(region)
            .chain(descendant_elements(region))
            .collect();

        // The innermost div holding enough result links. Outer wrappers
        // always hold at least as many, chrome included.
        let mut wrapper: Option<(ElementRef<'p>, Vec<ElementRef<'p>>, usize)> = None;
        for div in scope.iter().copied().filter(|el| tag(*el) == "div") {
            if is_navigation_list(div) {
                continue;
            }
            let links: Vec<ElementRef<'p>> = anchors(div)
                .filter(|a| is_qualifying_anchor(*a) && !under_heading(*a) && !in_chrome(*a))
                .collect();
            if links.len() < thresholds.search_wrapper_links {
                continue;
            }
            let depth = ancestor_elements(div).count();
            let better = match &wrapper {
                None => true,
                Some((_, best_links, best_depth)) => {
                    depth > *best_depth
                        || (depth == *best_depth && links.len() > best_links.len())
                }
            };
            if better {
                wrapper = Some((div, links, depth));
            }
        }

        if let Some((div, links, _)) = wrapper {
            let selector = format!("{} a[href]", synthesize_selector(page, div));
            return vec![Candidate {
                container: div,
                selector: SelectorDescriptor::Css(selector),
                item_count: links.len(),
                preview: first_preview(&links),
                kind: CandidateKind::SearchWrapper,
                priority: -1,
            }];
        }

        for list in scope.iter().copied().filter(|el| matches!(tag(*el), "ul" | "ol")) {
            // short result titles can look like a menu here, so only chrome
            // and explicit pagers are ruled out
            if in_chrome(list) || class_has_token(list, "pagination") {
                continue;
            }
            let items: Vec<ElementRef<'p>> =
                descendant_elements(list).filter(|el| tag(*el) == "li").collect();
            if items.len() < thresholds.search_list_items {
                continue;
            }
            let valid: Vec<ElementRef<'p>> =
                items.into_iter().filter(|li| is_valid_list_item(*li)).collect();
            if valid.len() >= thresholds.search_list_items {
                return vec![Candidate {
                    container: list,
                    selector: SelectorDescriptor::Css(synthesize_selector(page, list)),
                    item_count: valid.len(),
                    preview: first_preview(&valid),
                    kind: CandidateKind::SearchList,
                    priority: 0,
                }];
            }
        }

        Vec::new()
    }

    // Tier B

    fn keyword_lists<'p>(&self, page: &'p Page) -> Vec<Candidate<'p>> {
        let min_items = self.config.thresholds.keyword_list_items;
        let mut found = Vec::new();

        for list in page.elements().filter(|el| matches!(tag(*el), "ul" | "ol")) {
            let id = list.value().id().unwrap_or_default().to_lowercase();
            let classes = class_attr(list);
            if !LIST_KEYWORDS.iter().any(|k| id.contains(k) || classes.contains(k)) {
                continue;
            }
            if is_navigation_list(list) {
                log::debug!("Skipping navigation list {}", synthesize_selector(page, list));
                continue;
            }
            if is_pagination_list(list) {
                log::debug!("Skipping pagination list {}", synthesize_selector(page, list));
                continue;
            }

            let valid: Vec<ElementRef<'p>> = descendant_elements(list)
                .filter(|el| tag(*el) == "li" && is_valid_list_item(*el))
                .collect();
            if valid.len() >= min_items {
                found.push(Candidate {
                    container: list,
                    selector: SelectorDescriptor::Css(synthesize_selector(page, list)),
                    item_count: valid.len(),
                    preview: first_preview(&valid),
                    kind: CandidateKind::KeywordList,
                    priority: 1,
                });
            }
        }

        found
    }

    // Tier C

    fn repeated_siblings<'p>(&self, page: &'p Page) -> Vec<Candidate<'p>> {
        let min_siblings = self.config.thresholds.repeat_siblings;
        let mut found = Vec::new();

        for parent in page.elements() {
            if in_chrome(parent) {
                continue;
            }

            // (tag, class token) -> qualifying siblings, in first-seen order
            let mut groups: Vec<((&str, String), Vec<ElementRef<'p>>)> = Vec::new();
            for child in child_elements(parent) {
                if !wraps_qualifying_anchor(child) || char_len(&text_of(child)) < 20 {
                    continue;
                }
                for token in child.value().classes() {
                    let key = (tag(child), token.to_string());
                    match groups.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, members)) => members.push(child),
                        None => groups.push((key, vec![child])),
                    }
                }
            }

            let mut best: Option<&Vec<ElementRef<'p>>> = None;
            for (_, members) in &groups {
                if best.is_none_or(|b| members.len() > b.len()) {
                    best = Some(members);
                }
            }
            let Some(members) = best.filter(|m| m.len() >= min_siblings) else {
                continue;
            };

            found.push(Candidate {
                container: parent,
                selector: SelectorDescriptor::Css(synthesize_selector(page, parent)),
                item_count: members.len(),
                preview: truncate_chars(&text_of(members[0]), PREVIEW_CHARS),
                kind: CandidateKind::RepeatedSiblings,
                priority: 2,
            });
        }

        found
    }

    // Tier D

    fn marker_candidates<'p>(&self, page: &'p Page) -> Vec<Candidate<'p>> {
        let Some((group, count)) = self.marker_group(page) else {
            return Vec::new();
        };
        let preview = marker_links(group, &self.config.marker)
            .first()
            .map(|a| filter_marker_text(&text_of(*a)))
            .unwrap_or_default();

        vec![Candidate {
            container: group,
            selector: SelectorDescriptor::MarkerGroup,
            item_count: count,
            preview: truncate_chars(&preview, PREVIEW_CHARS),
            kind: CandidateKind::MarkerGroup,
            priority: 3,
        }]
    }

    /// Nearest ancestor of the first marker link that groups the markers,
    /// with the number of markers it holds.
    pub fn marker_group<'p>(&self, page: &'p Page) -> Option<(ElementRef<'p>, usize)> {
        let marker = &self.config.marker;
        let min_links = self.config.thresholds.marker_links;
        let all = marker_links(page.root(), marker);
        if all.len() < min_links {
            return None;
        }

        let mut current = parent_element(*all.first()?);
        for _ in 0..marker.max_depth {
            let node = current?;
            let count = marker_links(node, marker).len();
            if count == all.len() || count >= min_links {
                log::debug!("Marker links grouped under <{}> ({} links)", tag(node), count);
                return Some((node, count));
            }
            current = parent_element(node);
        }

        None
    }

    // Tier E

    fn fallback_sweep<'p>(&self, page: &'p Page) -> Vec<Candidate<'p>> {
        let thresholds = &self.config.thresholds;
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for el in page.elements() {
            let name = tag(el);
            let classes = class_attr(el);
            let classed = FALLBACK_CLASS_MARKERS.iter().any(|m| classes.contains(m));
            if !(matches!(name, "table" | "ul") || classed) {
                continue;
            }

            if in_chrome(el) || is_furniture(el) {
                continue;
            }
            if FALLBACK_SKIP_TOKENS.iter().any(|t| class_has_token(el, t)) {
                continue;
            }
            if name == "table" && class_mentions(el, "detail") {
                let rows = descendant_elements(el).filter(|r| tag(*r) == "tr").count();
                if rows < thresholds.detail_table_rows {
                    log::debug!("Skipping detail table with {} rows", rows);
                    continue;
                }
            }
            if name == "ul" && (is_navigation_list(el) || is_pagination_list(el)) {
                continue;
            }

            let item_count = estimate_item_count(el);
            if item_count < thresholds.fallback_items {
                continue;
            }

            let selector = synthesize_selector(page, el);
            if !seen.insert(selector.clone()) {
                continue;
            }

            let preview = child_elements(el)
                .next()
                .map(text_of)
                .unwrap_or_else(|| text_of(el));

            found.push(Candidate {
                container: el,
                selector: SelectorDescriptor::Css(selector),
                item_count,
                preview: truncate_chars(&preview, PREVIEW_CHARS),
                kind: match name {
                    "table" => CandidateKind::Table,
                    "ul" => CandidateKind::List,
                    _ => CandidateKind::Container,
                },
                priority: 10,
            });
        }

        found
    }
}

/// Rough count of the entries a container holds. Used for ranking only.
pub fn estimate_item_count(el: ElementRef<'_>) -> usize {
    match tag(el) {
        "table" => descendant_elements(el)
            .filter(|row| tag(*row) == "tr")
            .filter(|row| child_elements(*row).filter(|c| tag(*c) == "td").count() >= 2)
            .count(),
        "ul" => descendant_elements(el)
            .filter(|li| tag(*li) == "li" && char_len(&text_of(*li)) > 10)
            .count(),
        _ => child_elements(el)
            .filter(|child| {
                char_len(&text_of(*child)) > 20
                    || anchors(*child).next().is_some()
                    || descendant_elements(*child).any(|d| class_mentions(d, "item"))
            })
            .count(),
    }
}

/// A CSS selector that resolves to exactly `el` in `page`.
///
/// Prefers a unique `#id`, then a unique `tag.class`, then an
/// `nth-of-type` path from the nearest uniquely identified ancestor.
pub fn synthesize_selector(page: &Page, el: ElementRef<'_>) -> String {
    if let Some(selector) = unique_id_selector(page, el) {
        return selector;
    }

    if let Some(class) = el.value().classes().find(|c| CSS_IDENT.is_match(c)) {
        let selector = format!("{}.{}", tag(el), class);
        if match_count(page, &selector) == 1 {
            return selector;
        }
    }

    let mut segments = Vec::new();
    let mut current = el;
    loop {
        let Some(parent) = parent_element(current) else {
            segments.push(tag(current).to_string());
            break;
        };
        let position = child_elements(parent)
            .filter(|sibling| tag(*sibling) == tag(current))
            .position(|sibling| sibling == current)
            .unwrap_or(0);
        segments.push(format!("{}:nth-of-type({})", tag(current), position + 1));

        if let Some(anchor) = unique_id_selector(page, parent) {
            segments.push(anchor);
            break;
        }
        current = parent;
    }

    segments.reverse();
    segments.join(" > ")
}

fn unique_id_selector(page: &Page, el: ElementRef<'_>) -> Option<String> {
    let id = el.value().id().filter(|id| CSS_IDENT.is_match(id))?;
    let selector = format!("#{id}");
    (match_count(page, &selector) == 1).then_some(selector)
}

fn match_count(page: &Page, selector: &str) -> usize {
    page.select(selector).map(|found| found.len()).unwrap_or(0)
}

/// Marker links under `root`, in document order.
pub fn marker_links<'p>(root: ElementRef<'p>, marker: &MarkerLinkConfig) -> Vec<ElementRef<'p>> {
    descendant_elements(root)
        .filter(|el| is_marker_link(*el, marker))
        .collect()
}

pub fn is_marker_link(el: ElementRef<'_>, marker: &MarkerLinkConfig) -> bool {
    tag(el) == "a" && el.value().attr(&marker.attribute) == Some(marker.value.as_str())
}

/// Keep CJK, ASCII alphanumerics, whitespace and `【】（）`.
pub fn filter_marker_text(text: &str) -> String {
    MARKER_TEXT_NOISE.replace_all(text, "").trim().to_string()
}

/// Deepest element whose text mentions a search-result phrase, widened to
/// the first ancestor holding enough links. Falls back to the document root.
fn find_search_region(page: &Page, min_links: usize) -> Option<ElementRef<'_>> {
    let root = page.root();

    for phrase in SEARCH_PHRASES.iter() {
        if !phrase.is_match(&text_of(root)) {
            continue;
        }

        let mut deepest = root;
        while let Some(child) = child_elements(deepest).find(|c| phrase.is_match(&text_of(*c))) {
            deepest = child;
        }
        log::debug!("Search phrase {:?} found in <{}>", phrase.as_str(), tag(deepest));

        let region = std::iter::once(deepest)
            .chain(ancestor_elements(deepest))
            .find(|el| anchors(*el).count() >= min_links)
            .unwrap_or(root);
        return Some(region);
    }

    None
}

fn first_preview(items: &[ElementRef<'_>]) -> String {
    let text = items.first().map(|el| text_of(*el)).unwrap_or_default();
    truncate_chars(&text, PREVIEW_CHARS)
}

fn under_heading(a: ElementRef<'_>) -> bool {
    parent_element(a).is_some_and(|p| matches!(tag(p), "h1" | "h2" | "h3"))
}

fn wraps_qualifying_anchor(el: ElementRef<'_>) -> bool {
    (tag(el) == "a" && is_qualifying_anchor(el)) || anchors(el).any(is_qualifying_anchor)
}

/// A list entry with a link and more than a few characters of text.
pub fn is_valid_list_item(li: ElementRef<'_>) -> bool {
    anchors(li).next().is_some() && char_len(&text_of(li)) > 10
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page(body: &str) -> Page {
        Page::parse(
            &format!("<html><head><title>t</title></head><body>{body}</body></html>"),
            Url::parse("https://example.com/list").unwrap(),
        )
    }

    fn result_list(count: usize) -> String {
        let items: String = (1..=count)
            .map(|n| format!(r#"<li><a href="https://x.com/{n}">Title {n} is long enough</a> 2024-01-02</li>"#))
            .collect();
        format!(r#"<ul id="result-list">{items}</ul>"#)
    }

    #[test]
    fn test_keyword_list_tier() {
        let p = page(&result_list(8));
        let config = EngineConfig::default();
        let found = ListDetector::new(&config).collect(&p);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].selector, SelectorDescriptor::Css("#result-list".to_string()));
        assert_eq!(found[0].item_count, 8);
        assert_eq!(found[0].kind, CandidateKind::KeywordList);
        assert!(found[0].preview.starts_with("Title 1"));
    }

    #[test]
    fn test_nav_lists_never_proposed() {
        let nav_items: String = ["首页", "关于", "新闻", "联系", "登录", "注册", "服务", "政策", "公开", "互动"]
            .iter()
            .map(|t| format!(r#"<li><a href="/{t}">{t}</a></li>"#))
            .collect();
        let p = page(&format!(r#"<nav><ul class="menu-list">{nav_items}</ul></nav>"#));
        let config = EngineConfig::default();
        assert!(ListDetector::new(&config).collect(&p).is_empty());
    }

    #[test]
    fn test_search_region_prefers_link_wrapper() {
        let links: String = (1..=6)
            .map(|n| format!(r#"<p><a href="/doc/{n}.html">Search hit number {n} with a title</a></p>"#))
            .collect();
        let p = page(&format!(
            r#"<div class="results"><h3><a href="/all">网站内容 overview link</a></h3><div class="hits">{links}</div></div>"#
        ));
        let config = EngineConfig::default();
        let found = ListDetector::new(&config).collect(&p);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, CandidateKind::SearchWrapper);
        assert_eq!(found[0].priority, -1);
        assert_eq!(found[0].item_count, 6);
        assert_eq!(found[0].selector.as_str(), "div.hits a[href]");
    }

    #[test]
    fn test_search_wrapper_skips_page_chrome() {
        let hits: String = (1..=6)
            .map(|n| format!(r#"<p><a href="/doc/{n}.html">Search hit number {n} with a title</a></p>"#))
            .collect();
        let p = page(&format!(
            r#"<div id="wrap">
                 <nav><a href="/">Home</a><a href="/docs">Docs</a><a href="/blog">Blog</a></nav>
                 <h2>Search results</h2>
                 <div class="hits">{hits}</div>
                 <footer><a href="/privacy">Privacy policy and data protection statement</a>
                   <a href="/terms">Terms of service for all registered users</a></footer>
               </div>"#
        ));
        let config = EngineConfig::default();
        let found = ListDetector::new(&config).collect(&p);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, CandidateKind::SearchWrapper);
        assert_eq!(found[0].selector.as_str(), "div.hits a[href]");
        assert_eq!(found[0].item_count, 6);
    }

    #[test]
    fn test_zero_marker_threshold_without_markers() {
        let p = page("<p>nothing here at all</p>");
        let mut config = EngineConfig::default();
        config.thresholds.marker_links = 0;
        let detector = ListDetector::new(&config);

        assert!(detector.marker_group(&p).is_none());
        assert!(detector.collect(&p).is_empty());
    }

    #[test]
    fn test_search_region_list() {
        let items: String = (1..=5)
            .map(|n| format!(r#"<li><a href="/r/{n}">Hit {n}</a> some description text</li>"#))
            .collect();
        let p = page(&format!(
            r#"<div id="main"><p>搜索结果 共 5 条</p><ul class="hits">{items}</ul></div>"#
        ));
        let config = EngineConfig::default();
        let found = ListDetector::new(&config).collect(&p);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, CandidateKind::SearchList);
        assert_eq!(found[0].priority, 0);
        assert_eq!(found[0].item_count, 5);
    }

    #[test]
    fn test_repeated_sibling_cards() {
        let cards: String = (1..=5)
            .map(|n| {
                format!(
                    r#"<div class="card"><a href="/a/{n}">Card headline number {n}</a><span>2024-02-0{n}</span></div>"#
                )
            })
            .collect();
        let p = page(&format!(r#"<section id="feed">{cards}</section>"#));
        let config = EngineConfig::default();
        let found = ListDetector::new(&config).collect(&p);

        assert_eq!(found[0].kind, CandidateKind::RepeatedSiblings);
        assert_eq!(found[0].selector.as_str(), "#feed");
        assert_eq!(found[0].item_count, 5);
    }

    #[test]
    fn test_marker_group() {
        let rows: String = (1..=3)
            .map(|n| format!(r#"<div class="r"><a name="docpuburl" href="/d/{n}">【通知】文件 {n}！</a></div>"#))
            .collect();
        let p = page(&format!(r#"<div id="wrap"><div id="hits">{rows}</div></div>"#));
        let config = EngineConfig::default();
        let found = ListDetector::new(&config).collect(&p);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].selector, SelectorDescriptor::MarkerGroup);
        assert_eq!(found[0].item_count, 3);
        assert_eq!(found[0].preview, "【通知】文件 1");
        assert_eq!(found[0].container.value().id(), Some("hits"));
    }

    #[test]
    fn test_fallback_table() {
        let rows: String = (1..=4)
            .map(|n| format!(r#"<tr><td><a href="/t/{n}">Row {n}</a></td><td>2024-03-0{n}</td></tr>"#))
            .collect();
        let p = page(&format!(r#"<div><table>{rows}</table></div>"#));
        let config = EngineConfig::default();
        let found = ListDetector::new(&config).collect(&p);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, CandidateKind::Table);
        assert_eq!(found[0].item_count, 4);
        assert_eq!(found[0].priority, 10);
    }

    #[test]
    fn test_estimate_item_count() {
        let p = page(
            r#"<table id="t"><tr><th>h</th><th>h</th></tr><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></table>
               <ul id="u"><li>short</li><li>long enough text</li></ul>
               <div id="d"><p>tiny</p><p><a href="/x">x</a></p><p>a paragraph longer than twenty</p></div>"#,
        );
        let get = |s: &str| p.select(s).unwrap()[0];
        assert_eq!(estimate_item_count(get("#t")), 1);
        assert_eq!(estimate_item_count(get("#u")), 1);
        assert_eq!(estimate_item_count(get("#d")), 2);
    }

    #[test]
    fn test_synthesized_selectors_resolve_to_their_element() {
        let p = page(
            r#"<div id="a"><ul><li>x</li></ul><ul class="dup"><li>y</li></ul></div>
               <div><ul class="dup"><li>z</li></ul><ul class="only"><li>w</li></ul></div>"#,
        );
        for ul in p.select("ul").unwrap() {
            let selector = synthesize_selector(&p, ul);
            let resolved = p.select(&selector).unwrap();
            assert_eq!(resolved, vec![ul], "selector {selector} is not exact");
        }

        let only = p.select("ul.only").unwrap()[0];
        assert_eq!(synthesize_selector(&p, only), "ul.only");
        let first = p.select("#a > ul").unwrap()[0];
        assert_eq!(synthesize_selector(&p, first), "#a > ul:nth-of-type(1)");
    }

    #[test]
    fn test_descriptor_token() {
        assert_eq!(SelectorDescriptor::parse("marker-link-container"), SelectorDescriptor::MarkerGroup);
        assert_eq!(
            SelectorDescriptor::parse(" #list "),
            SelectorDescriptor::Css("#list".to_string())
        );
        assert_eq!(SelectorDescriptor::MarkerGroup.to_string(), "marker-link-container");
    }
}
