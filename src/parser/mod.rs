pub mod panels;
pub mod scripts;
pub mod series;

use scraper::Html;
use tracing::warn;

use crate::db::ScrapedPage;
use panels::SetSheet;
use series::SeriesData;

pub struct PageData {
    pub page_data_id: i64,
    pub set_number: String,
    /// `None` when the page has no chart data.
    pub series: Option<SeriesData>,
    pub sheet: SetSheet,
}

/// Two-part extraction: chart series from inline scripts, key/value panels from the DOM.
pub fn process_page(page: &ScrapedPage) -> PageData {
    let (series, sheet) = parse_html(&page.set_number, &page.html);
    PageData {
        page_data_id: page.page_data_id,
        set_number: page.set_number.clone(),
        series,
        sheet,
    }
}

pub fn parse_html(set_number: &str, html: &str) -> (Option<SeriesData>, SetSheet) {
    let doc = Html::parse_document(html);

    let blocks = scripts::script_blocks(&doc);
    let block_refs: Vec<&str> = blocks.iter().map(String::as_str).collect();
    let series = match series::extract_series(&block_refs) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!("{}: {}", set_number, e);
            None
        }
    };

    (series, panels::extract_sheet(&doc))
}
