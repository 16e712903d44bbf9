use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use reqwest::Url;
use serde::Deserialize;

const CONFIG_FILE: &str = "brick";
const ENV_PREFIX: &str = "BRICK";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub root_url: String,
    pub db_path: PathBuf,
    pub output_dir: PathBuf,
    /// Name of the appended set sheet inside `output_dir`.
    pub sheet_file: String,
    pub concurrency: usize,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root_url: "https://www.brickeconomy.com".into(),
            db_path: PathBuf::from("data/brick.sqlite"),
            output_dir: PathBuf::from("output"),
            sheet_file: "lego_sets.csv".into(),
            concurrency: 4,
            max_retries: 3,
            base_backoff_ms: 2000,
            timeout_secs: 30,
            user_agent: concat!("brick_scraper/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl Settings {
    /// Defaults, then `brick.toml` (optional), then `BRICK_*` environment variables.
    pub fn load() -> Result<Self> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn search_url(&self, set_number: &str) -> Result<Url> {
        let base = format!("{}/search", self.root_url.trim_end_matches('/'));
        Url::parse_with_params(&base, &[("query", set_number.trim())])
            .with_context(|| format!("Invalid root URL {}", self.root_url))
    }

    pub fn page_url(&self, href: &str) -> String {
        if href.starts_with("http") {
            return href.to_string();
        }
        format!(
            "{}/{}",
            self.root_url.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}
