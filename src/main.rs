use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use url::Url;

use list_scraper::list_detector::synthesize_selector;
use list_scraper::page::text_of;
use list_scraper::{fetch_page, Container, EngineConfig, ListScraper, Page, ScraperProfile};

/// Find the main list on a web page and extract its records
#[derive(Parser, Debug)]
#[command(name = "list-scraper")]
#[command(version, about = "Heuristic list detection and record extraction", long_about = None)]
struct Cli {
    /// Path to a TOML engine configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every list-like region detection finds, best first
    Options(Source),
    /// Show the container a selector (or detection) resolves to
    Container {
        #[command(flatten)]
        source: Source,
        #[arg(long)]
        selector: Option<String>,
    },
    /// Extract full item data from the resolved container
    Items {
        #[command(flatten)]
        source: Source,
        #[arg(long)]
        selector: Option<String>,
    },
    /// Scrape the list into records
    Scrape {
        #[command(flatten)]
        source: Source,
        #[arg(long)]
        selector: Option<String>,
        /// Stop after this many records
        #[arg(long)]
        max_items: Option<usize>,
        /// Name reported for this scrape
        #[arg(long, default_value = "cli")]
        name: String,
    },
    /// Summarize the page and whether it holds a list
    Info(Source),
}

#[derive(Args, Debug)]
struct Source {
    /// Page to fetch
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    url: Option<String>,

    /// Local HTML file to read instead of fetching
    #[arg(long)]
    file: Option<PathBuf>,

    /// URL the local file was saved from, used to absolutize links
    #[arg(long, requires = "file")]
    base_url: Option<String>,
}

impl Source {
    async fn load(&self) -> Result<Page> {
        if let Some(url) = &self.url {
            let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
            let html = fetch_page(url).await?;
            return Ok(Page::parse(&html, parsed));
        }

        let path = self.file.as_ref().context("Either --url or --file is required")?;
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let base = match &self.base_url {
            Some(base) => Url::parse(base).with_context(|| format!("Invalid base URL: {}", base))?,
            None => {
                let absolute = std::fs::canonicalize(path)
                    .with_context(|| format!("Failed to resolve {}", path.display()))?;
                Url::from_file_path(&absolute)
                    .map_err(|_| anyhow::anyhow!("Cannot build a URL for {}", absolute.display()))?
            }
        };
        Ok(Page::parse(&html, base))
    }
}

#[derive(Serialize)]
struct ContainerReport {
    container: String,
    selector: Option<String>,
    preview: String,
}

fn report_container(page: &Page, container: &Container<'_>) -> ContainerReport {
    match container {
        Container::Element(el) => ContainerReport {
            container: container.describe(),
            selector: Some(synthesize_selector(page, *el)),
            preview: text_of(*el).chars().take(100).collect(),
        },
        Container::Selector(selector) => ContainerReport {
            container: container.describe(),
            selector: Some(selector.clone()),
            preview: String::new(),
        },
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let scraper = ListScraper::with_config(config);

    match cli.command {
        Command::Options(source) => {
            let page = source.load().await?;
            let options = scraper.get_list_options(&page);
            log::info!("Found {} list option(s)", options.len());
            for option in &options {
                log::debug!("{}", option.description());
            }
            print_json(&options, cli.pretty)?;
        }
        Command::Container { source, selector } => {
            let page = source.load().await?;
            let report = scraper
                .find_list_container(&page, selector.as_deref())?
                .map(|container| report_container(&page, &container));
            if report.is_none() {
                log::warn!("No list container found");
            }
            print_json(&report, cli.pretty)?;
        }
        Command::Items { source, selector } => {
            let page = source.load().await?;
            let container = scraper
                .find_list_container(&page, selector.as_deref())?
                .ok_or_else(|| list_scraper::ScrapeError::NotFound(selector.clone()))?;
            let items: Vec<_> = scraper
                .get_list_items(&page, &container)?
                .into_iter()
                .map(|item| scraper.extract_item_data(&page, item))
                .collect();
            log::info!("Extracted {} item(s)", items.len());
            print_json(&items, cli.pretty)?;
        }
        Command::Scrape { source, selector, max_items, name } => {
            let page = source.load().await?;
            let profile = ScraperProfile { name, max_items };
            let outcome =
                scraper.start_scraping_with(&page, &profile, selector.as_deref(), |index, record| {
                    log::debug!("#{} {}", index + 1, record.title);
                })?;
            print_json(&outcome, cli.pretty)?;
        }
        Command::Info(source) => {
            let page = source.load().await?;
            print_json(&scraper.get_page_info(&page)?, cli.pretty)?;
        }
    }

    Ok(())
}
