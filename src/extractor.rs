use regex::Regex;
use scraper::ElementRef;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

use crate::config::EngineConfig;
use crate::list_detector::{filter_marker_text, is_marker_link};
use crate::page::{
    anchors, ancestor_elements, char_len, child_elements, class_attr, descendant_elements, href,
    parent_element, tag, text_of, truncate_chars, Page,
};
use crate::title::{clean_title_text, collapse_whitespace, select_title_link_among};
use crate::urls::absolute_http_url;

static ANCHOR_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}[-年]\d{1,2}[-月]\d{1,2}日?").expect("hardcoded regex pattern is valid")
});

static CELL_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{1,2}-\d{1,2}|\d{4}年\d{1,2}月\d{1,2}日?")
        .expect("hardcoded regex pattern is valid")
});

static PAREN_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(([\d年月日号自起施行\-]+)\)").expect("hardcoded regex pattern is valid")
});

static CARD_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}|\d{4}/\d{2}/\d{2}|\d{4}年\d{1,2}月\d{1,2}日")
        .expect("hardcoded regex pattern is valid")
});

static CARD_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(涉农补贴|政务动态|领导同志活动|公告[、、]公示)\s*").expect("hardcoded regex pattern is valid")
});

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("hardcoded regex pattern is valid"));

const DOWNLOAD_WORDS: &[&str] = &["下载", "download"];
const SUMMARY_CLASSES: &[&str] = &["content", "desc", "summary"];
const PUBLISHER_CLASSES: &[&str] = &["publisher", "source"];

const MAX_SUMMARY: usize = 300;
const MAX_TEXT: usize = 500;
const MAX_FALLBACK_TITLE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemShape {
    /// Carries a marker link; only that link is read
    Marker,
    BareAnchor,
    TableRow,
    ListItem,
    DivCard,
    Generic,
}

/// Everything extracted from one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRecord {
    pub shape: ItemShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Indexed extra fields (`column_2`, `download_1_url`, `url_3`...) in
    /// the order they were found
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "serialize_extras")]
    pub extras: Vec<(String, String)>,
}

impl ItemRecord {
    fn new(shape: ItemShape) -> Self {
        Self {
            shape,
            title: None,
            href: None,
            date: None,
            sequence: None,
            tag_type: None,
            summary: None,
            publisher: None,
            text: None,
            extras: Vec::new(),
        }
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn push_extra(&mut self, key: String, value: String) {
        self.extras.push((key, value));
    }
}

fn serialize_extras<S: Serializer>(
    extras: &[(String, String)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(extras.iter().map(|(k, v)| (k, v)))
}

/// The record handed back from a scrape. `location` is reserved and left
/// empty here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub href: Option<String>,
    pub location: Option<String>,
}

/// Classifies each item into an [`ItemShape`] once and applies that shape's field rules.
pub struct RecordExtractor<'a> {
    config: &'a EngineConfig,
    base: &'a Url,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(config: &'a EngineConfig, page: &'a Page) -> Self {
        Self {
            config,
            base: page.base_url(),
        }
    }

    pub fn classify(&self, item: ElementRef<'_>) -> ItemShape {
        if self.marker_fields(item).is_some() {
            return ItemShape::Marker;
        }
        if tag(item) == "a" && char_len(&text_of(item)) > 10 && self.link_url(item).is_some() {
            return ItemShape::BareAnchor;
        }
        match tag(item) {
            "tr" => ItemShape::TableRow,
            "li" => ItemShape::ListItem,
            "div" => ItemShape::DivCard,
            _ => ItemShape::Generic,
        }
    }

    /// Full extraction of one item.
    pub fn extract(&self, item: ElementRef<'_>) -> ItemRecord {
        let shape = self.classify(item);

        let mut record = match shape {
            ItemShape::Marker => {
                let mut record = ItemRecord::new(shape);
                if let Some((title, href)) = self.marker_fields(item) {
                    record.title = Some(title);
                    record.href = Some(href);
                }
                // marker items carry nothing beyond the link
                return record;
            }
            ItemShape::BareAnchor => self.bare_anchor(item),
            ItemShape::TableRow => self.table_row(item),
            ItemShape::ListItem => self.list_item(item),
            ItemShape::DivCard => self.div_card(item),
            ItemShape::Generic => self.generic(item),
        };

        if record.summary.is_none() {
            record.text =
                free_text(&text_of(item), record.title.as_deref(), record.date.as_deref());
        }
        record
    }

    /// Extraction narrowed to `{title, href, location}`. Items with neither
    /// a title nor a link produce nothing.
    pub fn extract_record(&self, item: ElementRef<'_>) -> Option<Record> {
        let record = self.extract(item);
        let title = record
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| {
                truncate_chars(&text_of(item), MAX_FALLBACK_TITLE).trim().to_string()
            });

        if title.is_empty() && record.href.is_none() {
            log::debug!("Dropping item without title or link");
            return None;
        }

        Some(Record {
            title,
            href: record.href,
            location: None,
        })
    }

    fn link_url(&self, link: ElementRef<'_>) -> Option<String> {
        let raw = href(link)?;
        let url = absolute_http_url(raw, self.base, &self.config.urls.redirectors);
        if url.is_none() {
            log::debug!("Ignoring unusable link {:?}", raw);
        }
        url
    }

    fn marker_fields(&self, item: ElementRef<'_>) -> Option<(String, String)> {
        let marker = &self.config.marker;
        let link = std::iter::once(item)
            .chain(descendant_elements(item))
            .find(|el| is_marker_link(*el, marker))?;
        let href = self.link_url(link)?;
        let title = filter_marker_text(&text_of(link));
        (!title.is_empty()).then_some((title, href))
    }

    fn bare_anchor(&self, item: ElementRef<'_>) -> ItemRecord {
        let mut record = ItemRecord::new(ItemShape::BareAnchor);
        record.title = Some(clean_title_text(&text_of(item)));
        record.href = self.link_url(item);
        record.date = parent_element(item)
            .and_then(|parent| ANCHOR_DATE.find(&text_of(parent)).map(|m| m.as_str().to_string()));
        record
    }

    fn table_row(&self, row: ElementRef<'_>) -> ItemRecord {
        let mut record = ItemRecord::new(ItemShape::TableRow);
        let cells: Vec<_> = descendant_elements(row).filter(|c| tag(*c) == "td").collect();
        let Some((first, rest)) = cells.split_first() else {
            return record;
        };

        let first_text = text_of(*first);
        match anchors(*first).next() {
            Some(link) => {
                record.href = self.link_url(link);
                let link_text = text_of(link);
                record.title = if link_text.is_empty() {
                    first_text.lines().next().map(|line| line.trim().to_string())
                } else {
                    Some(link_text)
                };
            }
            None => record.title = Some(first_text),
        }

        for (offset, cell) in rest.iter().enumerate() {
            let column = offset + 1;
            let cell_text = text_of(*cell);
            if cell_text.is_empty() {
                continue;
            }

            if record.date.is_none() {
                if let Some(date) = CELL_DATE.find(&cell_text) {
                    record.date = Some(date.as_str().to_string());
                    continue;
                }
            }

            let url = anchors(*cell).next().and_then(|link| self.link_url(link));
            record.push_extra(format!("column_{column}"), cell_text);
            if let Some(url) = url {
                record.push_extra(format!("column_{column}_url"), url);
            }
        }

        record
    }

    fn list_item(&self, li: ElementRef<'_>) -> ItemRecord {
        let mut record = ItemRecord::new(ItemShape::ListItem);

        record.sequence = child_elements(li)
            .next()
            .map(text_of)
            .filter(|t| DIGITS.is_match(t))
            .and_then(|t| t.parse().ok());

        // the first link is the title, no scoring
        if let Some(link) = anchors(li).next() {
            record.href = self.link_url(link);
            let link_text = text_of(link);
            if !link_text.is_empty() {
                record.title = Some(clean_title_text(&link_text));
            }
        }

        record.date = PAREN_DATE
            .captures(&text_of(li))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string());

        let mut index = 1;
        for link in anchors(li) {
            let link_text = text_of(link);
            let lower = link_text.to_lowercase();
            if !DOWNLOAD_WORDS.iter().any(|w| lower.contains(w)) {
                continue;
            }
            if let Some(url) = self.link_url(link) {
                record.push_extra(format!("download_{index}"), link_text);
                record.push_extra(format!("download_{index}_url"), url);
                index += 1;
            }
        }

        record
    }

    fn div_card(&self, card: ElementRef<'_>) -> ItemRecord {
        let mut record = ItemRecord::new(ItemShape::DivCard);

        if let Some(link) = card_title_link(card) {
            record.href = self.link_url(link);
            let title = CARD_LABEL.replace(&text_of(link), "").trim().to_string();
            if char_len(&title) > 5 {
                record.title = Some(title);
            }
        }

        record.tag_type = first_classed(card, &["tag"]).map(text_of).filter(|t| !t.is_empty());

        record.summary = first_classed(card, SUMMARY_CLASSES)
            .map(text_of)
            .filter(|t| char_len(t) > 10)
            .map(|t| truncate_chars(&t, MAX_SUMMARY));

        record.date = match first_classed(card, &["date"]).map(text_of).filter(|t| !t.is_empty()) {
            Some(date) => Some(date),
            None => CARD_DATE.find(&text_of(card)).map(|m| m.as_str().to_string()),
        };

        record.publisher = first_classed(card, PUBLISHER_CLASSES)
            .map(text_of)
            .filter(|t| !t.is_empty());

        record
    }

    fn generic(&self, item: ElementRef<'_>) -> ItemRecord {
        let mut record = ItemRecord::new(ItemShape::Generic);
        let links = std::iter::once(item)
            .filter(|el| tag(*el) == "a")
            .chain(anchors(item))
            .filter(|el| el.value().attr("href").is_some());

        let mut seen: Vec<String> = Vec::new();
        for link in links {
            let Some(url) = self.link_url(link) else {
                continue;
            };
            if seen.contains(&url) {
                continue;
            }
            let link_text = text_of(link);

            if seen.is_empty() {
                if !link_text.is_empty() {
                    record.title = Some(link_text);
                }
                record.href = Some(url.clone());
            } else {
                let n = seen.len() + 1;
                if !link_text.is_empty() && record.title.as_deref() != Some(link_text.as_str()) {
                    record.push_extra(format!("url_{n}_text"), link_text);
                }
                record.push_extra(format!("url_{n}"), url.clone());
            }
            seen.push(url);
        }

        record.date = date_element(item)
            .or_else(|| CELL_DATE.find(&text_of(item)).map(|m| m.as_str().to_string()));
        record
    }
}

/// `a.title`, then a link inside a title-classed element, then the best
/// scoring absolute link.
fn card_title_link(card: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let links: Vec<_> = anchors(card).collect();

    if let Some(link) = links
        .iter()
        .find(|a| a.value().classes().any(|c| c.eq_ignore_ascii_case("title")))
    {
        return Some(*link);
    }

    if let Some(link) = links.iter().find(|a| {
        ancestor_elements(**a)
            .take_while(|el| *el != card)
            .any(|el| class_attr(el).contains("title"))
    }) {
        return Some(*link);
    }

    let absolute: Vec<_> = links
        .into_iter()
        .filter(|a| href(*a).is_some_and(|h| h.contains("http")))
        .collect();
    select_title_link_among(&absolute)
}

fn first_classed<'p>(item: ElementRef<'p>, markers: &[&str]) -> Option<ElementRef<'p>> {
    descendant_elements(item).find(|el| {
        let classes = class_attr(*el);
        markers.iter().any(|m| classes.contains(m))
    })
}

fn date_element(item: ElementRef<'_>) -> Option<String> {
    let matchers: [fn(ElementRef<'_>) -> bool; 4] = [
        |el| class_attr(el).contains("date"),
        |el| class_attr(el).contains("time"),
        |el| tag(el) == "time",
        |el| el.value().attr("datetime").is_some(),
    ];

    matchers.iter().find_map(|matches| {
        descendant_elements(item)
            .find(|el| matches(*el))
            .map(text_of)
            .filter(|t| !t.is_empty())
    })
}

/// Item text without the title and date, whitespace collapsed.
fn free_text(full: &str, title: Option<&str>, date: Option<&str>) -> Option<String> {
    if full.is_empty() {
        return None;
    }

    let mut rest = full.to_string();
    for part in [title, date].into_iter().flatten().filter(|p| !p.is_empty()) {
        rest = rest.replacen(part, "", 1);
    }

    let rest = collapse_whitespace(&rest);
    if rest.is_empty() {
        Some(truncate_chars(full, MAX_TEXT))
    } else {
        Some(truncate_chars(&rest, MAX_TEXT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Page {
        Page::parse(
            &format!("<html><body>{body}</body></html>"),
            Url::parse("https://example.com/news/index.html").unwrap(),
        )
    }

    fn extract(p: &Page, selector: &str) -> ItemRecord {
        let config = EngineConfig::default();
        let item = p.select(selector).unwrap()[0];
        RecordExtractor::new(&config, p).extract(item)
    }

    #[test]
    fn test_list_item_fields() {
        let p = page(
            r#"<ul><li><span>3</span><a href="detail/3.html">关于印发农业补贴实施方案的通知</a>(2024年3月1日起施行)
               <a href="/files/3.pdf">附件下载</a></li></ul>"#,
        );
        let record = extract(&p, "li");

        assert_eq!(record.shape, ItemShape::ListItem);
        assert_eq!(record.sequence, Some(3));
        assert_eq!(record.title.as_deref(), Some("关于印发农业补贴实施方案的通知"));
        assert_eq!(record.href.as_deref(), Some("https://example.com/news/detail/3.html"));
        assert_eq!(record.date.as_deref(), Some("2024年3月1日起施行"));
        assert_eq!(record.extra("download_1"), Some("附件下载"));
        assert_eq!(record.extra("download_1_url"), Some("https://example.com/files/3.pdf"));
    }

    #[test]
    fn test_table_row_columns() {
        let p = page(
            r#"<table><tr>
                <td><a href="/doc/1">Annual budget report</a></td>
                <td>2024-03-01</td>
                <td><a href="/dept/finance">Finance office</a></td>
                <td>Approved</td>
            </tr></table>"#,
        );
        let record = extract(&p, "tr");

        assert_eq!(record.shape, ItemShape::TableRow);
        assert_eq!(record.title.as_deref(), Some("Annual budget report"));
        assert_eq!(record.href.as_deref(), Some("https://example.com/doc/1"));
        assert_eq!(record.date.as_deref(), Some("2024-03-01"));
        assert_eq!(record.extra("column_2"), Some("Finance office"));
        assert_eq!(record.extra("column_2_url"), Some("https://example.com/dept/finance"));
        assert_eq!(record.extra("column_3"), Some("Approved"));
    }

    #[test]
    fn test_marker_item_is_only_title_and_href() {
        let p = page(
            r#"<div class="r"><a name="docpuburl" href="/d/1">【通知】春耕补贴发放！</a>
               <span class="date">2024-01-01</span><p class="summary">A long summary that is ignored here</p></div>"#,
        );
        let record = extract(&p, "div.r");

        assert_eq!(record.shape, ItemShape::Marker);
        assert_eq!(record.title.as_deref(), Some("【通知】春耕补贴发放"));
        assert_eq!(record.href.as_deref(), Some("https://example.com/d/1"));
        assert_eq!(record.date, None);
        assert_eq!(record.summary, None);
        assert_eq!(record.text, None);
    }

    #[test]
    fn test_bare_anchor_with_parent_date() {
        let p = page(r#"<p><a href="/n/1">Council approves new park plan</a> 2024年5月6日</p>"#);
        let record = extract(&p, "a");

        assert_eq!(record.shape, ItemShape::BareAnchor);
        assert_eq!(record.title.as_deref(), Some("Council approves new park plan"));
        assert_eq!(record.date.as_deref(), Some("2024年5月6日"));
    }

    #[test]
    fn test_div_card_fields() {
        let p = page(
            r#"<div class="card">
                <span class="tag">政策</span>
                <h3 class="card-title"><a href="/a/9">政务动态 县政府召开春耕生产工作会议</a></h3>
                <div class="desc">会议部署了今年春耕生产的各项重点工作任务和要求。</div>
                <span class="source">县农业农村局</span>
                <span>2024-04-02</span>
            </div>"#,
        );
        let record = extract(&p, "div.card");

        assert_eq!(record.shape, ItemShape::DivCard);
        assert_eq!(record.title.as_deref(), Some("县政府召开春耕生产工作会议"));
        assert_eq!(record.href.as_deref(), Some("https://example.com/a/9"));
        assert_eq!(record.tag_type.as_deref(), Some("政策"));
        assert_eq!(record.summary.as_deref(), Some("会议部署了今年春耕生产的各项重点工作任务和要求。"));
        assert_eq!(record.publisher.as_deref(), Some("县农业农村局"));
        assert_eq!(record.date.as_deref(), Some("2024-04-02"));
        assert_eq!(record.text, None);
    }

    #[test]
    fn test_div_card_scores_absolute_links() {
        let summary = "这是一段用于测试的摘要文字内容，描述了政策的主要背景和实施范围以及申报条件等信息，内容较长较长较长较长较长较长较长较长较长较长较长较长较长较长较长较长较长较长较长。".repeat(3);
        let p = page(&format!(
            r#"<div class="entry"><a href="https://example.com/a/1">关于春耕补贴的通知文件</a><a href="https://example.com/a/1">{summary}</a></div>"#
        ));
        let record = extract(&p, "div.entry");

        assert_eq!(record.title.as_deref(), Some("关于春耕补贴的通知文件"));
    }

    #[test]
    fn test_generic_extra_urls() {
        let p = page(
            r#"<section><a href="/p/1">Primary headline text</a> by <a href="/u/jo">Jo Writer</a>
               <a href="/p/1">Primary headline text</a> <time>2024-06-01</time></section>"#,
        );
        let record = extract(&p, "section");

        assert_eq!(record.shape, ItemShape::Generic);
        assert_eq!(record.title.as_deref(), Some("Primary headline text"));
        assert_eq!(record.extra("url_2"), Some("https://example.com/u/jo"));
        assert_eq!(record.extra("url_2_text"), Some("Jo Writer"));
        assert_eq!(record.extra("url_3"), None);
        assert_eq!(record.date.as_deref(), Some("2024-06-01"));
        assert_eq!(record.text.as_deref(), Some("by Jo Writer Primary headline text"));
    }

    #[test]
    fn test_narrowed_record() {
        let p = page(
            r#"<ul><li><a href="javascript:void(0)">Entry without a usable link</a></li>
               <li><a href="https://x.com/1">Title 1 is long enough</a> 2024-01-02</li></ul>"#,
        );
        let config = EngineConfig::default();
        let extractor = RecordExtractor::new(&config, &p);
        let items = p.select("li").unwrap();

        let first = extractor.extract_record(items[0]).unwrap();
        assert_eq!(first.title, "Entry without a usable link");
        assert_eq!(first.href, None);

        let second = extractor.extract_record(items[1]).unwrap();
        assert_eq!(
            second,
            Record {
                title: "Title 1 is long enough".to_string(),
                href: Some("https://x.com/1".to_string()),
                location: None,
            }
        );
    }

    #[test]
    fn test_extras_serialize_as_ordered_map() {
        let mut record = ItemRecord::new(ItemShape::TableRow);
        record.title = Some("t".to_string());
        record.push_extra("column_2".to_string(), "b".to_string());
        record.push_extra("column_1".to_string(), "a".to_string());

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"shape":"table_row","title":"t","extras":{"column_2":"b","column_1":"a"}}"#
        );
    }
}
