// List Scraper Library
//
// Heuristic list detection for arbitrary pages: finds the region holding the
// page's main repeating list, splits it into items and turns each item into
// a normalized record.

pub mod config;
pub mod error;
pub mod extractor;
pub mod list_detector;
pub mod noise;
pub mod page;
pub mod resolver;
pub mod segmenter;
pub mod session;
pub mod title;
pub mod urls;
pub mod utils;

// Re-export main types for convenience
pub use config::{EngineConfig, MarkerLinkConfig, RedirectorRule, Thresholds, UrlConfig};
pub use error::{Result, ScrapeError};
pub use extractor::{ItemRecord, ItemShape, Record, RecordExtractor};
pub use list_detector::{Candidate, CandidateKind, ListDetector, SelectorDescriptor};
pub use noise::{is_navigation_list, is_pagination_list};
pub use page::{FrameAccess, Page};
pub use resolver::{Container, ContainerResolver};
pub use segmenter::ItemSegmenter;
pub use session::{
    ListScraper, PageInfo, ScrapeOutcome, ScrapeSession, ScraperProfile, SessionState, StopAck,
};
pub use title::{clean_title_text, select_title_link};
pub use urls::{is_valid_url, make_absolute_url};
pub use utils::{fetch_page, get_random_user_agent, USER_AGENTS};
