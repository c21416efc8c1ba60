use scraper::ElementRef;
use std::collections::HashSet;

use crate::config::EngineConfig;
use crate::error::{Result, ScrapeError};
use crate::list_detector::marker_links;
use crate::noise::{in_chrome, is_furniture, is_qualifying_anchor, starts_with_boilerplate};
use crate::page::{
    anchors, ancestor_elements, char_len, child_elements, class_attr, descendant_elements,
    parent_element, tag, text_of, Page,
};
use crate::resolver::Container;

type ItemMatcher = fn(ElementRef<'_>) -> bool;

/// Descendant patterns tried in order when the container is not itself a
/// list or a table. The first pattern with any match supplies the items.
const ITEM_MATCHERS: &[(&str, ItemMatcher)] = &[
    ("list/result item class", is_classed_result),
    ("li", is_li),
    ("item/product/card div", is_card_div),
    ("article/section", is_article_or_section),
    ("grid cell div", is_grid_cell),
];

/// Splits a committed container into item elements.
pub struct ItemSegmenter<'c> {
    config: &'c EngineConfig,
}

impl<'c> ItemSegmenter<'c> {
    pub fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }

    /// Ordered item elements of `container`, with chrome and boilerplate
    /// filtered out.
    pub fn segment<'p>(
        &self,
        page: &'p Page,
        container: &Container<'p>,
    ) -> Result<Vec<ElementRef<'p>>> {
        let raw = match container {
            Container::Selector(selector) => self.from_selector(page, selector)?,
            Container::Element(el) => self.from_element(*el),
        };
        let total = raw.len();

        let mut seen = HashSet::new();
        let items: Vec<ElementRef<'p>> = raw
            .into_iter()
            .filter(|item| seen.insert(item.id()))
            .filter(|item| self.keep(*item))
            .collect();
        let items = drop_chrome(items);

        log::info!("Segmented {} item(s), {} kept after filtering", total, items.len());
        if items.is_empty() {
            return Err(ScrapeError::NoItemsFound(container.describe()));
        }
        Ok(items)
    }

    fn from_selector<'p>(&self, page: &'p Page, selector: &str) -> Result<Vec<ElementRef<'p>>> {
        let matched = page.select(selector)?;
        let Some(first) = matched.first().copied() else {
            return Ok(Vec::new());
        };

        match tag(first) {
            "a" => {
                let links: Vec<_> = matched
                    .iter()
                    .copied()
                    .filter(|a| is_qualifying_anchor(*a) && !in_chrome(*a))
                    .collect();
                if !links.is_empty() {
                    log::debug!("Selector matched {} usable links", links.len());
                    return Ok(links);
                }
            }
            "ul" | "ol" => {
                let entries: Vec<_> = matched
                    .iter()
                    .flat_map(|list| descendant_elements(*list).filter(|el| tag(*el) == "li"))
                    .collect();
                if !entries.is_empty() {
                    return Ok(entries);
                }
            }
            "div" | "section" | "article" => {
                let entries: Vec<_> = matched
                    .iter()
                    .flat_map(|block| self.block_entries(*block))
                    .collect();
                if !entries.is_empty() {
                    return Ok(entries);
                }
            }
            _ => {}
        }

        Ok(matched)
    }

    /// Entries inside a div-like block matched by a selector.
    fn block_entries<'p>(&self, block: ElementRef<'p>) -> Vec<ElementRef<'p>> {
        let nested: Vec<_> = descendant_elements(block)
            .filter(|el| tag(*el) == "li" && inside_list(*el, block))
            .collect();
        if !nested.is_empty() {
            return nested;
        }

        let min_links = self.config.thresholds.segment_anchors;
        let links: Vec<_> = anchors(block).collect();
        if links.len() >= min_links {
            let usable: Vec<_> = links.into_iter().filter(|a| is_qualifying_anchor(*a)).collect();
            return if usable.len() >= min_links { usable } else { Vec::new() };
        }

        child_elements(block)
            .filter(|child| char_len(&text_of(*child)) > 10 && anchors(*child).next().is_some())
            .collect()
    }

    fn from_element<'p>(&self, container: ElementRef<'p>) -> Vec<ElementRef<'p>> {
        let marked = self.marker_items(container);
        if !marked.is_empty() && marked.len() >= self.config.thresholds.marker_links {
            log::debug!("Using {} marker link rows", marked.len());
            return marked;
        }

        match tag(container) {
            "ul" | "ol" => {
                let entries: Vec<_> =
                    descendant_elements(container).filter(|el| tag(*el) == "li").collect();
                if !entries.is_empty() {
                    return entries;
                }
            }
            "table" => {
                let rows = data_rows(container);
                if !rows.is_empty() {
                    return rows;
                }
            }
            _ => {}
        }

        if let Some(table) = descendant_elements(container).find(|t| self.is_data_table(*t)) {
            log::debug!("Using rows of an inner table");
            return data_rows(table);
        }

        for (label, matches) in ITEM_MATCHERS {
            let found: Vec<_> = descendant_elements(container).filter(|el| matches(*el)).collect();
            if !found.is_empty() {
                log::debug!("Item matcher '{}' matched {} element(s)", label, found.len());
                return found;
            }
        }

        let blocks: Vec<_> = child_elements(container)
            .filter(|child| matches!(tag(*child), "div" | "article" | "section"))
            .collect();
        if blocks.len() >= 2 {
            let linked: Vec<_> = blocks
                .into_iter()
                .filter(|b| anchors(*b).next().is_some() && char_len(&text_of(*b)) > 20)
                .collect();
            if linked.len() >= 2 {
                return linked;
            }
        }

        child_elements(container).collect()
    }

    /// Rows (or parents) of marker links: a link inside a cell stands for
    /// its whole table row.
    fn marker_items<'p>(&self, container: ElementRef<'p>) -> Vec<ElementRef<'p>> {
        let marker = &self.config.marker;
        let links = marker_links(container, marker);
        if links.len() < self.config.thresholds.marker_links {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for link in links {
            let mut current = parent_element(link);
            for _ in 0..marker.max_depth {
                let Some(node) = current else { break };
                if tag(node) == "td" {
                    current = parent_element(node);
                    continue;
                }
                if seen.insert(node.id()) {
                    items.push(node);
                }
                break;
            }
        }
        items
    }

    fn is_data_table(&self, table: ElementRef<'_>) -> bool {
        if tag(table) != "table" {
            return false;
        }
        let rows: Vec<_> = descendant_elements(table).filter(|r| tag(*r) == "tr").collect();
        let detail = class_attr(table).contains("detail");
        if detail && rows.len() < self.config.thresholds.detail_table_rows {
            log::debug!("Skipping inner detail table with {} rows", rows.len());
            return false;
        }
        rows.len() >= 2 && rows.iter().any(|r| has_cell(*r))
    }

    fn keep(&self, item: ElementRef<'_>) -> bool {
        let text = text_of(item);
        if char_len(&text) < self.config.thresholds.min_item_text {
            log::debug!("Dropping short item: {:?}", text);
            return false;
        }
        if starts_with_boilerplate(&text) {
            log::debug!("Dropping control text item: {:?}", text);
            return false;
        }
        if is_furniture(item) {
            log::debug!("Dropping furniture <{}>", tag(item));
            return false;
        }
        true
    }
}

/// Items under header, nav or footer chrome are dropped, unless the whole
/// container sits in chrome.
fn drop_chrome(items: Vec<ElementRef<'_>>) -> Vec<ElementRef<'_>> {
    if items.iter().all(|item| in_chrome(*item)) {
        return items;
    }
    items.into_iter().filter(|item| !in_chrome(*item)).collect()
}

fn data_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    descendant_elements(table)
        .filter(|row| tag(*row) == "tr" && has_cell(*row))
        .collect()
}

fn has_cell(row: ElementRef<'_>) -> bool {
    descendant_elements(row).any(|c| tag(c) == "td")
}

/// `li` under a `ul`/`ol` that is itself inside `block`.
fn inside_list(li: ElementRef<'_>, block: ElementRef<'_>) -> bool {
    ancestor_elements(li)
        .take_while(|a| *a != block)
        .any(|a| matches!(tag(a), "ul" | "ol"))
}

fn is_classed_result(el: ElementRef<'_>) -> bool {
    let classes = class_attr(el);
    ["list-item", "result-item", "search-result"]
        .iter()
        .any(|m| classes.contains(m))
}

fn is_li(el: ElementRef<'_>) -> bool {
    tag(el) == "li"
}

fn is_card_div(el: ElementRef<'_>) -> bool {
    let classes = class_attr(el);
    tag(el) == "div" && ["item", "product", "card"].iter().any(|m| classes.contains(m))
}

fn is_article_or_section(el: ElementRef<'_>) -> bool {
    matches!(tag(el), "article" | "section")
}

fn is_grid_cell(el: ElementRef<'_>) -> bool {
    let classes = class_attr(el);
    tag(el) == "div" && (classes.contains("col") || classes.contains("cell"))
}
