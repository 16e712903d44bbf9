use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sets (
            id         INTEGER PRIMARY KEY,
            set_number TEXT UNIQUE NOT NULL,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_sets_visited ON sets(visited);

        CREATE TABLE IF NOT EXISTS page_data (
            id           INTEGER PRIMARY KEY,
            set_id       INTEGER NOT NULL REFERENCES sets(id),
            set_number   TEXT NOT NULL,
            url          TEXT,
            slug         TEXT,
            html         TEXT,
            status       INTEGER,
            error        TEXT,
            latency_ms   INTEGER,
            scraped_at   TEXT NOT NULL DEFAULT (datetime('now')),
            processed_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_page_data_set ON page_data(set_number);
        ",
    )?;
    Ok(())
}

// ── Queue ──

/// Queue set numbers; already known numbers are ignored.
pub fn insert_sets(conn: &Connection, sets: &[String]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO sets (set_number) VALUES (?1)")?;
        for set in sets {
            count += stmt.execute(rusqlite::params![set])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub struct QueuedSet {
    pub id: i64,
    pub set_number: String,
}

pub fn fetch_unvisited(conn: &Connection, limit: Option<usize>) -> Result<Vec<QueuedSet>> {
    let sql = match limit {
        Some(n) => format!(
            "SELECT id, set_number FROM sets WHERE visited = 0 ORDER BY id LIMIT {}",
            n
        ),
        None => "SELECT id, set_number FROM sets WHERE visited = 0 ORDER BY id".to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(QueuedSet {
                id: row.get(0)?,
                set_number: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Scraping ──

pub struct ScrapeRow {
    pub set_id: i64,
    pub set_number: String,
    pub url: Option<String>,
    pub slug: Option<String>,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

/// Store one fetched page and mark its set visited.
pub fn save_scrape(conn: &Connection, row: &ScrapeRow) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO page_data (set_id, set_number, url, slug, html, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            row.set_id, row.set_number, row.url, row.slug, row.html, row.status, row.error,
            row.latency_ms,
        ],
    )?;
    tx.execute(
        "UPDATE sets SET visited = 1, visited_at = datetime('now') WHERE id = ?1",
        rusqlite::params![row.set_id],
    )?;
    tx.commit()?;
    Ok(())
}

// ── Processing ──

pub struct ScrapedPage {
    pub page_data_id: i64,
    pub set_number: String,
    pub html: String,
}

pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<ScrapedPage>> {
    let sql = format!(
        "SELECT id, set_number, html
         FROM page_data
         WHERE html IS NOT NULL AND processed_at IS NULL
         ORDER BY id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ScrapedPage {
                page_data_id: row.get(0)?,
                set_number: row.get(1)?,
                html: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn mark_processed(conn: &Connection, page_ids: &[i64]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt =
            tx.prepare("UPDATE page_data SET processed_at = datetime('now') WHERE id = ?1")?;
        for id in page_ids {
            stmt.execute(rusqlite::params![id])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub visited: usize,
    pub unvisited: usize,
    pub scraped: usize,
    pub errors: usize,
    pub processed: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM sets", [], |r| r.get(0))?;
    let visited: usize =
        conn.query_row("SELECT COUNT(*) FROM sets WHERE visited = 1", [], |r| r.get(0))?;
    let scraped: usize = conn.query_row("SELECT COUNT(*) FROM page_data", [], |r| r.get(0))?;
    let errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM page_data WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let processed: usize = conn.query_row(
        "SELECT COUNT(*) FROM page_data WHERE processed_at IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        total,
        visited,
        unvisited: total - visited,
        scraped,
        errors,
        processed,
    })
}
