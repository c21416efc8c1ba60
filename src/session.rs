use chrono::Local;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Result, ScrapeError};
use crate::extractor::{ItemRecord, Record, RecordExtractor};
use crate::list_detector::{Candidate, ListDetector, SelectorDescriptor};
use crate::page::Page;
use crate::resolver::{Container, ContainerResolver};
use crate::segmenter::ItemSegmenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
    Completed,
}

/// Describes what to scrape. Only list scraping exists, so the profile
/// carries a name for reporting and the item cap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScraperProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub max_items: Option<usize>,
}

impl ScraperProfile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            max_items: None,
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }
}

/// State of one scrape call. Created when scraping starts and consumed
/// into a [`ScrapeOutcome`] when it ends.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSession {
    pub id: Uuid,
    pub started_at: String,
    pub state: SessionState,
    pub max_items: Option<usize>,
    pub current_index: usize,
    pub records: Vec<Record>,
    pub selector_override: Option<String>,
}

impl ScrapeSession {
    fn new(max_items: Option<usize>, selector_override: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Local::now().to_rfc3339(),
            state: SessionState::Idle,
            max_items,
            current_index: 0,
            records: Vec::new(),
            selector_override: selector_override.map(str::to_string),
        }
    }

    fn is_full(&self) -> bool {
        self.max_items.is_some_and(|max| self.current_index >= max)
    }

    fn into_outcome(self) -> ScrapeOutcome {
        ScrapeOutcome {
            session_id: self.id,
            started_at: self.started_at,
            state: self.state,
            count: self.records.len(),
            records: self.records,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOutcome {
    pub session_id: Uuid,
    pub started_at: String,
    pub state: SessionState,
    pub records: Vec<Record>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopAck {
    pub stopped: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub url: String,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub has_list: bool,
    pub list_items_count: usize,
}

/// Handle shared between a running scrape and `stop_scraping`.
#[derive(Debug)]
struct SessionControl {
    session_id: Uuid,
    stop: AtomicBool,
}

type ActiveSlot = Mutex<Option<Arc<SessionControl>>>;

/// Empties the active slot when a scrape ends, however it ends.
struct ActiveGuard<'a> {
    slot: &'a ActiveSlot,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// The list scraping engine.
///
/// Detection, resolution and segmentation are stateless and recomputed per
/// call. The only state kept between calls is the control handle of the
/// scrape currently running, so at most one scrape runs per engine.
pub struct ListScraper {
    config: EngineConfig,
    active: ActiveSlot,
}

impl Default for ListScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl ListScraper {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Every list-like region detection finds, best first.
    pub fn get_list_options<'p>(&self, page: &'p Page) -> Vec<Candidate<'p>> {
        ListDetector::new(&self.config).collect(page)
    }

    pub fn find_list_container<'p>(
        &self,
        page: &'p Page,
        selector: Option<&str>,
    ) -> Result<Option<Container<'p>>> {
        let descriptor = selector.map(SelectorDescriptor::parse);
        ContainerResolver::new(&self.config).resolve(page, descriptor.as_ref())
    }

    pub fn get_list_items<'p>(
        &self,
        page: &'p Page,
        container: &Container<'p>,
    ) -> Result<Vec<ElementRef<'p>>> {
        ItemSegmenter::new(&self.config).segment(page, container)
    }

    pub fn extract_item_data(&self, page: &Page, item: ElementRef<'_>) -> ItemRecord {
        RecordExtractor::new(&self.config, page).extract(item)
    }

    pub fn get_page_info(&self, page: &Page) -> Result<PageInfo> {
        let container = self.find_list_container(page, None)?;
        let list_items_count = match &container {
            Some(container) => match self.get_list_items(page, container) {
                Ok(items) => items.len(),
                Err(ScrapeError::NoItemsFound(_)) => 0,
                Err(e) => return Err(e),
            },
            None => 0,
        };

        Ok(PageInfo {
            url: page.url().to_string(),
            title: page.title(),
            domain: page.url().host_str().map(str::to_string),
            has_list: container.is_some(),
            list_items_count,
        })
    }

    pub fn start_scraping(
        &self,
        page: &Page,
        profile: &ScraperProfile,
        selector: Option<&str>,
    ) -> Result<ScrapeOutcome> {
        self.start_scraping_with(page, profile, selector, |_, _| {})
    }

    /// Scrape the page's list, calling `on_record` after each record is
    /// collected. The stop signal is checked between items, so records
    /// already collected are always returned.
    pub fn start_scraping_with<F>(
        &self,
        page: &Page,
        profile: &ScraperProfile,
        selector: Option<&str>,
        mut on_record: F,
    ) -> Result<ScrapeOutcome>
    where
        F: FnMut(usize, &Record),
    {
        let mut session = ScrapeSession::new(profile.max_items, selector);
        let control = self.claim(session.id)?;
        let _guard = ActiveGuard { slot: &self.active };

        session.state = SessionState::Running;
        log::info!(
            "Starting scrape {} ({}), selector: {}",
            session.id,
            if profile.name.is_empty() { "unnamed" } else { &profile.name },
            selector.unwrap_or("auto")
        );

        let container = self
            .find_list_container(page, selector)?
            .ok_or_else(|| ScrapeError::NotFound(selector.map(str::to_string)))?;

        let items = self.get_list_items(page, &container)?;
        log::info!("Found {} list items, extracting", items.len());

        let extractor = RecordExtractor::new(&self.config, page);
        for item in items {
            if control.stop.load(Ordering::SeqCst) {
                log::info!("Scrape {} stopped after {} records", session.id, session.records.len());
                session.state = SessionState::Stopped;
                break;
            }
            if session.is_full() {
                log::info!("Reached max items limit: {}", session.current_index);
                break;
            }

            if let Some(record) = extractor.extract_record(item) {
                on_record(session.current_index, &record);
                session.records.push(record);
                session.current_index += 1;
            }
        }

        if session.state == SessionState::Running {
            session.state = SessionState::Completed;
        }
        log::info!("Scraped {} items", session.records.len());

        Ok(session.into_outcome())
    }

    /// Signal the running scrape to stop before its next item.
    pub fn stop_scraping(&self) -> StopAck {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(control) => {
                control.stop.store(true, Ordering::SeqCst);
                log::info!("Stop requested for scrape {}", control.session_id);
                StopAck {
                    stopped: true,
                    message: "Scraping stopped".to_string(),
                }
            }
            None => StopAck {
                stopped: false,
                message: "No scraping in progress".to_string(),
            },
        }
    }

    pub fn is_scraping(&self) -> bool {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn claim(&self, session_id: Uuid) -> Result<Arc<SessionControl>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.is_some() {
            return Err(ScrapeError::AlreadyRunning);
        }

        let control = Arc::new(SessionControl {
            session_id,
            stop: AtomicBool::new(false),
        });
        *active = Some(Arc::clone(&control));
        Ok(control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn list_page(n: usize) -> Page {
        let items: String = (1..=n)
            .map(|i| format!(r#"<li><a href="/news/{i}">Title {i} is long enough</a> 2024-01-02</li>"#))
            .collect();
        Page::parse(
            &format!(r#"<html><head><title>Notices</title></head><body><ul id="result-list">{items}</ul></body></html>"#),
            Url::parse("https://example.com/notices").unwrap(),
        )
    }

    #[test]
    fn test_scrape_collects_every_item() {
        let scraper = ListScraper::new();
        let outcome = scraper
            .start_scraping(&list_page(4), &ScraperProfile::new("notices"), None)
            .unwrap();

        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(outcome.count, 4);
        assert_eq!(outcome.records[0].href.as_deref(), Some("https://example.com/news/1"));
        assert!(!scraper.is_scraping());
    }

    #[test]
    fn test_max_items_caps_records() {
        let scraper = ListScraper::new();
        let profile = ScraperProfile::new("capped").with_max_items(3);
        let outcome = scraper.start_scraping(&list_page(8), &profile, None).unwrap();

        assert_eq!(outcome.count, 3);
        assert_eq!(outcome.state, SessionState::Completed);
    }

    #[test]
    fn test_stop_keeps_collected_prefix() {
        let scraper = ListScraper::new();
        let page = list_page(8);
        let outcome = scraper
            .start_scraping_with(&page, &ScraperProfile::default(), None, |index, _| {
                if index == 1 {
                    assert!(scraper.stop_scraping().stopped);
                }
            })
            .unwrap();

        assert_eq!(outcome.state, SessionState::Stopped);
        assert_eq!(outcome.count, 2);
        assert!(!scraper.stop_scraping().stopped);
    }

    #[test]
    fn test_second_scrape_is_rejected_while_running() {
        let scraper = ListScraper::new();
        let page = list_page(2);
        let mut nested = None;
        scraper
            .start_scraping_with(&page, &ScraperProfile::default(), None, |_, _| {
                if nested.is_none() {
                    nested = Some(scraper.start_scraping(&page, &ScraperProfile::default(), None));
                }
            })
            .unwrap();

        assert!(matches!(nested, Some(Err(ScrapeError::AlreadyRunning))));
        assert!(scraper.start_scraping(&page, &ScraperProfile::default(), None).is_ok());
    }

    #[test]
    fn test_failure_returns_to_idle() {
        let scraper = ListScraper::new();
        let empty = Page::parse("<p>nothing</p>", Url::parse("https://example.com/").unwrap());

        let err = scraper
            .start_scraping(&empty, &ScraperProfile::default(), Some("#missing"))
            .unwrap_err();
        assert!(matches!(err, ScrapeError::NotFound(Some(ref s)) if s == "#missing"));
        assert!(!scraper.is_scraping());
        assert!(scraper.start_scraping(&list_page(2), &ScraperProfile::default(), None).is_ok());
    }

    #[test]
    fn test_page_info() {
        let scraper = ListScraper::new();
        let info = scraper.get_page_info(&list_page(3)).unwrap();

        assert_eq!(info.title.as_deref(), Some("Notices"));
        assert_eq!(info.domain.as_deref(), Some("example.com"));
        assert!(info.has_list);
        assert_eq!(info.list_items_count, 3);
    }

    #[test]
    fn test_profile_from_json() {
        let profile: ScraperProfile = serde_json::from_str(r#"{"name": "gov", "max_items": 10}"#).unwrap();
        assert_eq!(profile.max_items, Some(10));
    }
}
