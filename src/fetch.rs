use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::db::{self, QueuedSet, ScrapeRow};
use crate::search::{self, SetLink};
use crate::settings::Settings;

/// Scrape stats returned after completion.
pub struct ScrapeStats {
    /// Sets looked up; `ok` and `errors` count stored pages.
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

struct Fetched {
    status: StatusCode,
    body: String,
    latency_ms: i64,
}

pub fn client(settings: &Settings) -> Result<Client> {
    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Look up each set, fetch every matching detail page, and save each result to DB as it arrives.
pub async fn scrape_sets_streaming(
    conn: &Connection,
    settings: &Settings,
    sets: Vec<QueuedSet>,
) -> Result<ScrapeStats> {
    let client = client(settings)?;
    let settings = Arc::new(settings.clone());
    let concurrency = settings.concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let total = sets.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<ScrapeRow>>(concurrency * 2);

    for set in sets {
        let client = client.clone();
        let settings = Arc::clone(&settings);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let rows = scrape_one(&client, &settings, set).await;
            let _ = tx.send(rows).await;
        });
    }

    // rx closes once every task has dropped its sender
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;

    while let Some(rows) = rx.recv().await {
        for row in &rows {
            if row.error.is_some() {
                errors += 1;
            } else {
                ok += 1;
            }
            db::save_scrape(conn, row)?;
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Scraped {} sets ({} pages ok, {} errors)", total, ok, errors);

    Ok(ScrapeStats { total, ok, errors })
}

fn empty_row(set: &QueuedSet) -> ScrapeRow {
    ScrapeRow {
        set_id: set.id,
        set_number: set.set_number.clone(),
        url: None,
        slug: None,
        html: None,
        status: None,
        error: None,
        latency_ms: None,
    }
}

/// One pending row per matching result, keyed by the result's own set id.
fn link_rows(settings: &Settings, set: &QueuedSet, links: Vec<SetLink>) -> Vec<ScrapeRow> {
    links
        .into_iter()
        .map(|link| ScrapeRow {
            set_number: link.set_id(),
            url: Some(settings.page_url(&link.href)),
            slug: Some(link.slug),
            ..empty_row(set)
        })
        .collect()
}

/// Search, then fetch every matching result. Failures end up in `error`.
async fn scrape_one(client: &Client, settings: &Settings, set: QueuedSet) -> Vec<ScrapeRow> {
    let mut row = empty_row(&set);

    let found = match settings.search_url(&set.set_number) {
        Ok(url) => get_with_retry(client, settings, url.as_str()).await,
        Err(e) => Err(e),
    };
    let found = match found {
        Ok(page) if page.status.is_success() => page,
        Ok(page) => {
            row.status = Some(i32::from(page.status.as_u16()));
            row.error = Some(format!("search returned HTTP {}", page.status.as_u16()));
            return vec![row];
        }
        Err(e) => {
            warn!("Search failed for {}: {:#}", set.set_number, e);
            row.error = Some(format!("{:#}", e));
            return vec![row];
        }
    };

    let links = search::detail_links(&found.body, &set.set_number);
    if links.is_empty() {
        row.error = Some(format!("no search result for {}", set.set_number));
        return vec![row];
    }

    let mut rows = link_rows(settings, &set, links);
    for row in &mut rows {
        let Some(url) = row.url.clone() else {
            continue;
        };
        debug!("{} -> {}", set.set_number, url);
        match get_with_retry(client, settings, &url).await {
            Ok(page) => {
                row.status = Some(i32::from(page.status.as_u16()));
                row.latency_ms = Some(page.latency_ms);
                if page.status.is_success() {
                    row.html = Some(page.body);
                } else {
                    row.error = Some(format!("HTTP {}", page.status.as_u16()));
                }
            }
            Err(e) => {
                warn!("Fetch failed for {}: {:#}", url, e);
                row.error = Some(format!("{:#}", e));
            }
        }
    }
    rows
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff(settings: &Settings, attempt: u32) -> Duration {
    Duration::from_millis(settings.base_backoff_ms.saturating_mul(2u64.saturating_pow(attempt)))
}

/// GET with exponential backoff on 429, 5xx and transport errors.
async fn get_with_retry(client: &Client, settings: &Settings, url: &str) -> Result<Fetched> {
    let mut attempt = 0;
    loop {
        let start = Instant::now();
        let result = get(client, url).await;
        let last = attempt >= settings.max_retries;

        match result {
            Ok((status, body)) if last || !should_retry(status) => {
                return Ok(Fetched {
                    status,
                    body,
                    latency_ms: start.elapsed().as_millis() as i64,
                });
            }
            Err(e) if last => return Err(e).with_context(|| format!("GET {}", url)),
            Ok((status, _)) => {
                warn!(
                    "HTTP {} on {} (attempt {}/{})",
                    status.as_u16(),
                    url,
                    attempt + 1,
                    settings.max_retries
                );
            }
            Err(e) => {
                warn!("{} on {} (attempt {}/{})", e, url, attempt + 1, settings.max_retries);
            }
        }

        let wait = backoff(settings, attempt);
        debug!("Backing off {:.1}s", wait.as_secs_f64());
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

async fn get(client: &Client, url: &str) -> Result<(StatusCode, String)> {
    let response = client.get(url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_only_rate_limits_and_server_errors() {
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::BAD_GATEWAY));
        assert!(!should_retry(StatusCode::NOT_FOUND));
        assert!(!should_retry(StatusCode::OK));
    }

    #[test]
    fn every_matching_result_gets_a_row() {
        let html = r#"<table id="ContentPlaceHolder1_ctlSetsOverview_GridViewSets">
  <tr><td class="ctlsets-left"><div class="mb-5"><h4><a href="/set/10294-1/lego-titanic">A</a></h4></div></td></tr>
  <tr><td class="ctlsets-left"><div class="mb-5"><h4><a href="/set/10294-2/lego-titanic-b">B</a></h4></div></td></tr>
</table>"#;
        let set = QueuedSet {
            id: 7,
            set_number: "10294".into(),
        };
        let settings = Settings::default();
        let rows = link_rows(&settings, &set, search::detail_links(html, &set.set_number));

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.set_id == 7 && r.html.is_none()));
        let ids: Vec<_> = rows.iter().map(|r| r.set_number.as_str()).collect();
        assert_eq!(ids, ["10294-1", "10294-2"]);
        assert_eq!(
            rows[1].url.as_deref(),
            Some("https://www.brickeconomy.com/set/10294-2/lego-titanic-b")
        );
        assert_eq!(rows[1].slug.as_deref(), Some("lego-titanic-b"));
    }

    #[test]
    fn backoff_doubles() {
        let s = Settings {
            base_backoff_ms: 500,
            ..Settings::default()
        };
        assert_eq!(backoff(&s, 0), Duration::from_millis(500));
        assert_eq!(backoff(&s, 3), Duration::from_millis(4000));
        assert_eq!(backoff(&s, 200), Duration::from_millis(u64::MAX));
    }
}
