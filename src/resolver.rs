use scraper::ElementRef;

use crate::config::EngineConfig;
use crate::error::{Result, ScrapeError};
use crate::list_detector::{CandidateKind, ListDetector, SelectorDescriptor};
use crate::page::{
    anchors, char_len, descendant_elements, select_in, tag, text_of, FrameAccess, Page,
};

/// The committed list container.
#[derive(Debug, Clone, PartialEq)]
pub enum Container<'p> {
    Element(ElementRef<'p>),
    /// A selector matching every item (or item wrapper) directly;
    /// enumeration is left to the segmenter.
    Selector(String),
}

impl Container<'_> {
    pub fn describe(&self) -> String {
        match self {
            Container::Element(el) => format!("<{}>", tag(*el)),
            Container::Selector(selector) => format!("selector {}", selector),
        }
    }
}

pub struct ContainerResolver<'c> {
    config: &'c EngineConfig,
}

impl<'c> ContainerResolver<'c> {
    pub fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }

    /// Commit to one container, either from an explicit selector or by
    /// running detection. `Ok(None)` means the page has no list.
    pub fn resolve<'p>(
        &self,
        page: &'p Page,
        selector: Option<&SelectorDescriptor>,
    ) -> Result<Option<Container<'p>>> {
        let detector = ListDetector::new(self.config);

        match selector {
            Some(SelectorDescriptor::MarkerGroup) => {
                if let Some((group, count)) = detector.marker_group(page) {
                    log::info!("Using marker link container ({} links)", count);
                    return Ok(Some(Container::Element(group)));
                }
                log::warn!("Marker links are no longer grouped, running detection instead");
            }
            Some(SelectorDescriptor::Css(selector)) => {
                if let Some(container) = self.resolve_css(page, selector)? {
                    return Ok(Some(container));
                }
                log::warn!("Selector {} matched nothing, running detection instead", selector);
            }
            None => {}
        }

        let Some(best) = detector.best(page) else {
            return Ok(None);
        };

        let container = match (best.kind, &best.selector) {
            (CandidateKind::SearchWrapper, SelectorDescriptor::Css(selector)) => {
                Container::Selector(selector.clone())
            }
            _ => Container::Element(best.container),
        };
        log::info!("Detected list container: {}", container.describe());
        Ok(Some(container))
    }

    fn resolve_css<'p>(&self, page: &'p Page, selector: &str) -> Result<Option<Container<'p>>> {
        let matches = page.select(selector)?;
        log::debug!("Selector {} matched {} element(s)", selector, matches.len());

        match matches.as_slice() {
            [] => Ok(None),
            [iframe] if tag(*iframe) == "iframe" => enter_frame(page, *iframe).map(Some),
            [single] => Ok(Some(Container::Element(*single))),
            [first, ..] => {
                let first_tag = tag(*first);
                let all_lists = matches!(first_tag, "ul" | "ol")
                    && matches.iter().all(|m| tag(*m) == first_tag);
                if all_lists {
                    if let Some(best) = richest_list(&matches) {
                        return Ok(Some(Container::Element(best)));
                    }
                }
                Ok(Some(Container::Selector(selector.to_string())))
            }
        }
    }
}

/// Among several lists, the one with the most substantial linked entries.
/// Broad selectors also match cloned header or footer lists; those rarely
/// carry entries with real text.
fn richest_list<'p>(lists: &[ElementRef<'p>]) -> Option<ElementRef<'p>> {
    let mut best = None;
    let mut best_count = 0;

    for list in lists {
        let count = descendant_elements(*list)
            .filter(|li| tag(*li) == "li")
            .filter(|li| anchors(*li).next().is_some() && char_len(&text_of(*li)) > 30)
            .count();
        if count > best_count {
            best_count = count;
            best = Some(*list);
        }
    }

    if best.is_some() {
        log::info!("Picked list with {} substantial entries", best_count);
    }
    best
}

fn enter_frame<'p>(page: &'p Page, iframe: ElementRef<'p>) -> Result<Container<'p>> {
    match page.frame_access(iframe) {
        FrameAccess::CrossOrigin(src) => {
            log::warn!("Refusing to read cross-origin frame {}", src);
            Err(ScrapeError::CrossOriginAccess { src })
        }
        FrameAccess::Document(document) => {
            let list = select_in(document, "ul")?.into_iter().next().filter(|ul| {
                descendant_elements(*ul).filter(|li| tag(*li) == "li").count() >= 2
            });
            if let Some(ul) = list {
                log::info!("Using list inside frame");
                return Ok(Container::Element(ul));
            }

            let table = select_in(document, "table")?.into_iter().next().filter(|table| {
                descendant_elements(*table).filter(|tr| tag(*tr) == "tr").count() >= 2
            });
            if let Some(table) = table {
                log::info!("Using table inside frame");
                return Ok(Container::Element(table));
            }

            Ok(Container::Element(iframe))
        }
        FrameAccess::Unavailable => {
            log::warn!("Frame content is not available, using the frame element itself");
            Ok(Container::Element(iframe))
        }
    }
}
