mod db;
mod error;
mod export;
mod fetch;
mod parser;
mod search;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use settings::Settings;

#[derive(Parser)]
#[command(name = "brick_scraper", about = "BrickEconomy set price history scraper")]
struct Cli {
    /// SQLite database (overrides BRICK_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Output directory for CSV files (overrides BRICK_OUTPUT_DIR)
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue set numbers from a file, one per line
    Init {
        set_list: PathBuf,
    },
    /// Search and download detail pages for queued sets
    Scrape {
        /// Max sets to scrape (default: all unvisited)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Extract chart series and panels from downloaded pages into CSV
    Process {
        /// Max pages to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Scrape + process in one pipeline
    Run {
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show scraping statistics
    Stats,
    /// Extract one saved detail page without touching the database
    Parse {
        html_file: PathBuf,
        /// Set identifier used for output file names
        #[arg(short, long)]
        set: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    if let Some(out) = cli.out {
        settings.output_dir = out;
    }

    let result = match cli.command {
        Commands::Init { set_list } => {
            let text = std::fs::read_to_string(&set_list)
                .with_context(|| format!("Failed to read {}", set_list.display()))?;
            let sets = read_set_list(&text);
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let inserted = db::insert_sets(&conn, &sets)?;
            println!("Queued {} new sets ({} listed)", inserted, sets.len());
            Ok(())
        }
        Commands::Scrape { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let sets = db::fetch_unvisited(&conn, limit)?;
            if sets.is_empty() {
                println!("No unvisited sets. Run 'init' first or all sets are scraped.");
                return Ok(());
            }
            println!("Scraping {} sets (streaming to DB)...", sets.len());
            let stats = fetch::scrape_sets_streaming(&conn, &settings, sets).await?;
            println!(
                "Done: {} scraped ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unprocessed(&conn, limit)?;
            if pages.is_empty() {
                println!("No unprocessed pages. Run 'scrape' first.");
                return Ok(());
            }
            println!("Processing {} pages...", pages.len());
            let counts = process_pages(&conn, &settings, &pages)?;
            counts.print();
            Ok(())
        }
        Commands::Run { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let sets = db::fetch_unvisited(&conn, limit)?;
            if sets.is_empty() {
                println!("No unvisited sets. Run 'init' first.");
                return Ok(());
            }

            let t_scrape = Instant::now();
            println!("Pipeline: scraping {} sets (streaming to DB)...", sets.len());
            let stats = fetch::scrape_sets_streaming(&conn, &settings, sets).await?;
            println!(
                "Scraped {} sets ({} ok, {} errors) in {:.1}s",
                stats.total,
                stats.ok,
                stats.errors,
                t_scrape.elapsed().as_secs_f64()
            );

            let t_process = Instant::now();
            let pages = db::fetch_unprocessed(&conn, None)?;
            if pages.is_empty() {
                println!("Nothing to process (all scraped sets had errors).");
                return Ok(());
            }
            println!("Processing {} pages...", pages.len());
            let counts = process_pages(&conn, &settings, &pages)?;
            println!("Processed in {:.1}s", t_process.elapsed().as_secs_f64());
            counts.print();
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Total:     {}", s.total);
            println!("Visited:   {}", s.visited);
            println!("Unvisited: {}", s.unvisited);
            println!("Scraped:   {}", s.scraped);
            println!("Errors:    {}", s.errors);
            println!("Processed: {}", s.processed);
            Ok(())
        }
        Commands::Parse { html_file, set } => {
            let html = std::fs::read_to_string(&html_file)
                .with_context(|| format!("Failed to read {}", html_file.display()))?;
            let summary = parse_one(&settings, &set, &html)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Set numbers one per line; blank lines and `#` comments are skipped.
fn read_set_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn sheet_path(settings: &Settings) -> PathBuf {
    settings.output_dir.join(&settings.sheet_file)
}

fn parse_one(settings: &Settings, set: &str, html: &str) -> anyhow::Result<serde_json::Value> {
    let (series, sheet) = parser::parse_html(set, html);
    let mut files: Vec<PathBuf> = Vec::new();

    if let Some(data) = &series {
        let written = export::write_series(&settings.output_dir, set, data)?;
        files.extend(written.history);
        files.extend(written.extended);
    }
    let sheet_file = sheet_path(settings);
    export::append_sheet(&sheet_file, &sheet)?;
    files.push(sheet_file);

    Ok(serde_json::json!({
        "set": set,
        "history_rows": series.as_ref().map_or(0, |d| d.history.len()),
        "extended_rows": series.as_ref().and_then(|d| d.extended.as_ref()).map_or(0, Vec::len),
        "files": files.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        "series": series,
        "sheet": sheet,
    }))
}

#[derive(Default)]
struct ProcessCounts {
    pages: usize,
    without_chart: usize,
    history_rows: usize,
    extended_rows: usize,
    files: usize,
    failed: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Processed {} pages ({} without chart data, {} failed): {} history rows, {} extended rows, {} CSV files.",
            self.pages, self.without_chart, self.failed, self.history_rows, self.extended_rows, self.files,
        );
    }
}

fn process_pages(
    conn: &rusqlite::Connection,
    settings: &Settings,
    pages: &[db::ScrapedPage],
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let sheet_file = sheet_path(settings);
    let mut counts = ProcessCounts::default();

    for chunk in pages.chunks(500) {
        let results: Vec<_> = chunk.par_iter().map(parser::process_page).collect();

        // Writes stay sequential so the shared sheet keeps page order.
        // A page whose outputs fail stays unprocessed and is retried next run.
        let mut done = Vec::with_capacity(results.len());
        for data in results {
            counts.pages += 1;
            match write_page(settings, &sheet_file, &data) {
                Ok(files) => {
                    match &data.series {
                        Some(series) => {
                            counts.history_rows += series.history.len();
                            counts.extended_rows += series.extended.as_ref().map_or(0, Vec::len);
                        }
                        None => counts.without_chart += 1,
                    }
                    counts.files += files;
                    done.push(data.page_data_id);
                }
                Err(e) => {
                    warn!("{}: failed to write outputs: {:#}", data.set_number, e);
                    counts.failed += 1;
                }
            }
        }

        db::mark_processed(conn, &done)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

/// Series CSVs first, then the sheet rows, so a failed page never leaves sheet rows behind.
fn write_page(settings: &Settings, sheet_file: &Path, data: &parser::PageData) -> anyhow::Result<usize> {
    let mut files = 0;
    if let Some(series) = &data.series {
        let written = export::write_series(&settings.output_dir, &data.set_number, series)?;
        files = written.history.iter().chain(written.extended.iter()).count();
    }
    export::append_sheet(sheet_file, &data.sheet)?;
    Ok(files)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
