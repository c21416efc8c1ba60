use regex::Regex;
use scraper::ElementRef;
use std::sync::LazyLock;

use crate::page::{anchors, char_len, class_attr, descendant_elements, href, tag, text_of};

const CHROME_CLASS_MARKERS: &[&str] = &["nav", "menu", "footer"];
const NAV_IDS: &[&str] = &["headbanner"];
const NAV_KEYWORDS: &[&str] = &["首页", "关于", "联系", "登录", "注册", "更多"];
const NAV_KEYWORD_MIN: usize = 4;

const PAGER_WORDS: &[&str] = &[
    "上一页", "下一页", "上页", "下页", "首页", "尾页", "末页", "prev", "previous", "next", "first",
    "last", "«", "»", "‹", "›",
];

/// Item classes that mark page furniture rather than content.
const FURNITURE_TOKENS: &[&str] = &["ad", "banner", "footer", "header", "nav", "tab"];
const FURNITURE_TAGS: &[&str] = &[
    "script", "style", "meta", "link", "noscript", "thead", "th", "button",
];

/// Leading phrases of UI controls ("more", "next", "apply online"...).
const BOILERPLATE_PREFIXES: &[&str] = &[
    "查看", "更多", "下一", "上一", "全部", "在线办理", "more", "next", "previous", "prev",
    "view all", "view more", "read more", "load more", "show more", "apply online",
];

const NO_RESULT_MARKERS: &[&str] = &["没有相关", "no results", "no matching"];

static PAGINATION_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(共|第)\s*\d+\s*(页|条|记录)|\bpage\s*\d+\s*(/|of)\s*\d+")
        .expect("hardcoded regex pattern is valid")
});

/// Anchor minimum text for "qualifying" links.
pub const QUALIFYING_ANCHOR_TEXT: usize = 10;

/// True when `keyword` appears in the element's class list as a whole
/// hyphen/underscore segment, or as the start or end of one
/// (`navbar`, `mainnav`, `menu-top`).
pub fn class_mentions(el: ElementRef<'_>, keyword: &str) -> bool {
    class_segments(&class_attr(el)).any(|seg| seg.starts_with(keyword) || seg.ends_with(keyword))
}

/// True when a class segment is exactly `keyword` (or its plural).
pub fn class_has_token(el: ElementRef<'_>, keyword: &str) -> bool {
    class_segments(&class_attr(el))
        .any(|seg| seg == keyword || seg.strip_suffix('s') == Some(keyword))
}

fn class_segments(classes: &str) -> impl Iterator<Item = &str> {
    classes
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|s| !s.is_empty())
}

/// Header, nav, footer or menu chrome at or above `el`.
///
/// A `header` or `footer` inside an `article` or `section` belongs to that
/// entry and is not page chrome.
pub fn in_chrome(el: ElementRef<'_>) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .any(|node| {
            is_chrome_tag(node) || CHROME_CLASS_MARKERS.iter().any(|m| class_mentions(node, m))
        })
}

fn is_chrome_tag(node: ElementRef<'_>) -> bool {
    match tag(node) {
        "nav" => true,
        "header" | "footer" => !node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| matches!(tag(a), "article" | "section")),
        _ => false,
    }
}

pub fn is_navigation_list(list: ElementRef<'_>) -> bool {
    if in_chrome(list) {
        return true;
    }

    let id = list.value().id().unwrap_or_default().to_lowercase();
    if NAV_IDS.contains(&id.as_str())
        || class_has_token(list, "nav")
        || class_has_token(list, "menu")
    {
        return true;
    }

    let links: Vec<String> = anchors(list).map(text_of).collect();
    if let Some(first) = links.first() {
        let first_len = char_len(first);

        if first_len < 15 {
            let short = links
                .iter()
                .filter(|t| !t.is_empty() && char_len(t) < 20)
                .count();
            if short as f64 / links.len() as f64 > 0.7 {
                return true;
            }
        }

        // A long first link is a content title, not a menu entry
        if first_len > 50 {
            return false;
        }
    }

    let text = text_of(list).to_lowercase();
    NAV_KEYWORDS.iter().filter(|k| text.contains(*k)).count() >= NAV_KEYWORD_MIN
}

pub fn is_pagination_list(list: ElementRef<'_>) -> bool {
    if PAGINATION_COUNT.is_match(&text_of(list)) {
        return true;
    }

    std::iter::once(list)
        .chain(descendant_elements(list))
        .filter(|el| matches!(tag(*el), "a" | "button"))
        .any(|control| is_pager_label(&text_of(control)))
}

fn is_pager_label(text: &str) -> bool {
    let text = text.to_lowercase();
    PAGER_WORDS.iter().any(|word| {
        if text == *word {
            return true;
        }
        let bounded = |rest: &str, at_start: bool| {
            let next = if at_start { rest.chars().next() } else { rest.chars().last() };
            next.is_some_and(|c| !c.is_alphanumeric())
        };
        text.strip_prefix(word).is_some_and(|rest| bounded(rest, true))
            || text.strip_suffix(word).is_some_and(|rest| bounded(rest, false))
    })
}

fn is_script_href(value: &str) -> bool {
    let lower = value.to_lowercase();
    value.is_empty() || value == "#" || lower.starts_with("javascript:")
}

/// An anchor with a followable href and enough text to be a title.
pub fn is_qualifying_anchor(a: ElementRef<'_>) -> bool {
    let Some(target) = href(a) else {
        return false;
    };
    if is_script_href(target) {
        return false;
    }
    let text = text_of(a);
    char_len(&text) >= QUALIFYING_ANCHOR_TEXT && !is_no_result_text(&text)
}

pub fn is_no_result_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    NO_RESULT_MARKERS.iter().any(|m| lower.contains(m))
}

pub fn starts_with_boilerplate(text: &str) -> bool {
    let head: String = text.trim().chars().take(12).collect::<String>().to_lowercase();
    BOILERPLATE_PREFIXES.iter().any(|prefix| {
        let Some(rest) = head.strip_prefix(prefix) else {
            return false;
        };
        // Latin phrases must end on a word boundary ("more" but not "moreover")
        !prefix.is_ascii() || rest.chars().next().is_none_or(|c| !c.is_alphanumeric())
    })
}

/// Script/style/header-cell elements and ad/banner/nav/tab-classed items.
pub fn is_furniture(el: ElementRef<'_>) -> bool {
    FURNITURE_TAGS.contains(&tag(el)) || FURNITURE_TOKENS.iter().any(|t| class_has_token(el, t))
}
