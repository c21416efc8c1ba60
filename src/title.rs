use regex::Regex;
use scraper::ElementRef;
use std::sync::LazyLock;

use crate::page::{anchors, char_len, child_elements, href, parent_element, text_of, truncate_chars};

static DATE_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}[-年]\d{1,2}[-月]\d{1,2}").expect("hardcoded regex pattern is valid")
});

static DATE_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}[-年/]\d{1,2}[-月/]\d{1,2}日?").expect("hardcoded regex pattern is valid")
});

static LEADING_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[一-龥]{2,6}\s+").expect("hardcoded regex pattern is valid")
});

static TRAILING_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+[一-龥]{2,6}$").expect("hardcoded regex pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("hardcoded regex pattern is valid"));

static FULL_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://\S+$").expect("hardcoded regex pattern is valid"));

static FIRST_SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^。！？\n]+").expect("hardcoded regex pattern is valid"));

const DETAIL_HREF_MARKERS: &[&str] = &["detail", "article", "news", "content", "view", "show"];
const SENTENCE_TERMINATORS: [char; 3] = ['。', '！', '？'];

const LONG_TITLE: usize = 200;
const HARD_TRUNCATE: usize = 100;

/// Pick the anchor most likely to be an item's title.
///
/// Every anchor is scored with [`score_title_link`]; the highest score wins
/// and ties keep the earliest anchor.
pub fn select_title_link(item: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let links: Vec<ElementRef<'_>> = anchors(item).collect();
    select_title_link_among(&links)
}

/// [`select_title_link`] over an already narrowed set of anchors.
pub fn select_title_link_among<'p>(links: &[ElementRef<'p>]) -> Option<ElementRef<'p>> {
    if links.len() <= 1 {
        return links.first().copied();
    }

    let mut best: Option<(ElementRef<'p>, i32)> = None;
    for (index, link) in links.iter().enumerate() {
        let score = score_title_link(*link, index);
        log::debug!("Title link candidate #{} scored {}", index, score);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((*link, score));
        }
    }

    best.map(|(link, _)| link)
}

pub fn score_title_link(link: ElementRef<'_>, index: usize) -> i32 {
    let text = text_of(link);
    let target = href(link).unwrap_or_default().to_lowercase();
    let len = char_len(&text);
    let mut score = 0;

    if index == 0 {
        score += 15;
    }

    score += match len {
        10..=150 => 25,
        6..=9 => 5,
        151..=299 => 10,
        300.. => -20,
        _ => 0,
    };

    let dates = DATE_IN_TEXT.find_iter(&text).count();
    if dates == 1 && len < 100 {
        score += 5;
    } else if dates > 1 || (dates == 1 && len > 200) {
        score -= 10;
    }

    if DETAIL_HREF_MARKERS.iter().any(|m| target.contains(m)) {
        score += 8;
    }

    if text.starts_with("http://") || text.starts_with("https://") {
        score -= 25;
    }

    if FULL_URL.is_match(&text) {
        score -= 20;
    }

    if text.split(SENTENCE_TERMINATORS).count() > 3 && len > 200 {
        score -= 15;
    }

    let first_child = parent_element(link).and_then(|parent| child_elements(parent).next());
    if first_child == Some(link) {
        score += 10;
    }

    score
}

/// Normalize anchor text into a title.
///
/// Date-like substrings and short category tags at either end are removed,
/// whitespace is collapsed and overlong text is cut to its first sentence
/// or to 100 characters. If stripping leaves fewer than
/// `max(5, 0.3 * original length)` characters the trimmed input is returned
/// unchanged.
pub fn clean_title_text(text: &str) -> String {
    let original = text.trim();
    let floor = (0.3 * char_len(original) as f64).max(5.0);
    let keeps = |s: &str| char_len(s) as f64 >= floor;

    let undated = DATE_LIKE.replace_all(original, "");
    let undated = undated.trim();
    if !keeps(undated) {
        return original.to_string();
    }

    let untagged = strip_tags(undated);
    if !keeps(&untagged) {
        return original.to_string();
    }

    let mut cleaned = collapse_whitespace(&untagged);
    if !keeps(&cleaned) {
        return original.to_string();
    }

    if char_len(&cleaned) > LONG_TITLE {
        let cut = match FIRST_SENTENCE.find(&cleaned) {
            Some(m) if (10..=150).contains(&char_len(m.as_str().trim())) => {
                m.as_str().trim().to_string()
            }
            _ => truncate_chars(&cleaned, HARD_TRUNCATE).trim().to_string(),
        };
        // the cut may end on a fresh category tag
        cleaned = collapse_whitespace(&strip_tags(&cut));
    }

    cleaned
}

fn strip_tags(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let next = LEADING_TAG.replace(&current, "");
        let next = TRAILING_TAG.replace(&next, "").trim().to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;
    use url::Url;

    fn page(body: &str) -> Page {
        Page::parse(
            &format!("<html><body>{body}</body></html>"),
            Url::parse("https://example.com/").unwrap(),
        )
    }

    #[test]
    fn test_bare_url_text_loses_to_short_title() {
        let long_url = format!("https://example.com/{}", "a".repeat(380));
        let p = page(&format!(
            r#"<div class="item"><span><a href="{long_url}">{long_url}</a></span><p><a href="/news/1">A twenty char title.</a></p></div>"#
        ));
        let item = p.select("div.item").unwrap()[0];
        let chosen = select_title_link(item).unwrap();
        assert_eq!(text_of(chosen), "A twenty char title.");
    }

    #[test]
    fn test_summary_anchor_loses_to_short_title() {
        let sentence = "这是一段用于测试的摘要文字内容，描述了政策的主要背景和实施范围以及申报条件等信息，内容较长较长较长较长较长较长较长较长较长较长较长较长较长较长较长较长较长较长较长。";
        let summary = format!("{sentence}{sentence}{sentence}");
        assert!(char_len(&summary) > 200 && char_len(&summary) < 300);

        let p = page(&format!(
            r#"<div class="card"><a href="/a/1">关于春耕补贴的通知文件</a><a href="/a/1">{summary}</a></div>"#
        ));
        let item = p.select("div.card").unwrap()[0];
        let chosen = select_title_link(item).unwrap();
        assert_eq!(text_of(chosen), "关于春耕补贴的通知文件");
    }

    #[test]
    fn test_single_link_needs_no_scoring() {
        let p = page(r#"<li><a href="/x">only</a></li>"#);
        let li = p.select("li").unwrap()[0];
        assert_eq!(text_of(select_title_link(li).unwrap()), "only");
    }

    #[test]
    fn test_clean_strips_dates_and_tags() {
        assert_eq!(
            clean_title_text("通知公告 关于做好2024年春耕备耕工作的通知 2024-03-01"),
            "关于做好2024年春耕备耕工作的通知"
        );
        assert_eq!(
            clean_title_text("  Title 3 is long enough\n\t 2024-01-02 "),
            "Title 3 is long enough"
        );
    }

    #[test]
    fn test_clean_rolls_back_when_too_short() {
        assert_eq!(clean_title_text("2024-01-02 新闻"), "2024-01-02 新闻");
        assert_eq!(clean_title_text("通知 公告"), "通知 公告");
    }

    #[test]
    fn test_clean_cuts_long_text() {
        let long = format!("第一句话是标题内容足够长了。{}", "后续摘要内容".repeat(40));
        assert_eq!(clean_title_text(&long), "第一句话是标题内容足够长了");

        let unbroken = "x".repeat(250);
        assert_eq!(clean_title_text(&unbroken), "x".repeat(100));

        let short_lead = format!("短句。{}", "z".repeat(240));
        assert_eq!(clean_title_text(&short_lead), truncate_chars(&short_lead, 100));
    }

    #[test]
    fn test_clean_is_idempotent() {
        let samples = [
            "通知 公告 关于印发实施方案的通知 2024年3月1日 政务",
            "Title 1 is long enough 2024-01-02",
            "2024-01-02 新闻",
            "   spaced    out   words   ",
        ];
        for sample in samples {
            let once = clean_title_text(sample);
            assert_eq!(clean_title_text(&once), once, "not idempotent for {sample:?}");
        }
    }
}
