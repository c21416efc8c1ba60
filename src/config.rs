use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration. Every section falls back to its defaults, so a
/// config file only has to name the values it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    pub marker: MarkerLinkConfig,
    pub urls: UrlConfig,
}

/// Minimum counts used by the detection tiers and the segmenter.
///
/// Structurally similar checks use different minimums in different tiers,
/// so each one is kept separately tunable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Tier A: qualifying anchors a link-dense wrapper must hold
    pub search_wrapper_links: usize,
    /// Tier A: valid `li` a standard list inside the search region must hold
    pub search_list_items: usize,
    /// Tier B: valid items for a keyword-named `ul/ol`
    pub keyword_list_items: usize,
    /// Tier C: siblings sharing a class token
    pub repeat_siblings: usize,
    /// Tier D: marker links required before grouping
    pub marker_links: usize,
    /// Tier E: estimated items for the fallback sweep
    pub fallback_items: usize,
    /// Segmenter: qualifying anchors for the anchor branch
    pub segment_anchors: usize,
    /// Segmenter: minimum trimmed text of a kept item
    pub min_item_text: usize,
    /// Tables classed `detail` with fewer rows are skipped
    pub detail_table_rows: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            search_wrapper_links: 5,
            search_list_items: 5,
            keyword_list_items: 2,
            repeat_siblings: 5,
            marker_links: 2,
            fallback_items: 2,
            segment_anchors: 5,
            min_item_text: 20,
            detail_table_rows: 5,
        }
    }
}

impl Thresholds {
    /// Item and link minimums of zero would accept empty lists.
    pub fn validate(&self) -> Result<()> {
        let minimums = [
            ("search_wrapper_links", self.search_wrapper_links),
            ("search_list_items", self.search_list_items),
            ("keyword_list_items", self.keyword_list_items),
            ("repeat_siblings", self.repeat_siblings),
            ("marker_links", self.marker_links),
            ("fallback_items", self.fallback_items),
            ("segment_anchors", self.segment_anchors),
        ];
        if let Some((name, _)) = minimums.iter().find(|(_, value)| *value == 0) {
            anyhow::bail!("thresholds.{} must be at least 1", name);
        }
        Ok(())
    }
}

/// The attribute pair that marks result links on some search engines
/// (`<a name="docpuburl">`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerLinkConfig {
    pub attribute: String,
    pub value: String,
    /// How many ancestors to climb looking for the grouping container
    pub max_depth: usize,
}

impl Default for MarkerLinkConfig {
    fn default() -> Self {
        Self {
            attribute: "name".to_string(),
            value: "docpuburl".to_string(),
            max_depth: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlConfig {
    pub redirectors: Vec<RedirectorRule>,
}

/// A link whose path contains `path_marker` carries its real destination in
/// the `param` query parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectorRule {
    pub path_marker: String,
    pub param: String,
}

impl RedirectorRule {
    pub fn new(path_marker: &str, param: &str) -> Self {
        Self {
            path_marker: path_marker.to_string(),
            param: param.to_string(),
        }
    }
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            redirectors: vec![
                RedirectorRule::new("link.do", "url"),
                RedirectorRule::new("redirect", "url"),
                RedirectorRule::new("jump", "url"),
                RedirectorRule::new("goto", "url"),
            ],
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse engine configuration")?;
        config.thresholds.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }
}
