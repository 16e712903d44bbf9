//! Chart series embedded in a set page's inline scripts.
//!
//! Pipeline: locate `data.addRows([...])` literals → normalise → scan rows of the
//! shape implied by each literal's position → decode dates.

pub mod date;
pub mod locate;
pub mod normalize;
pub mod rows;
pub mod tokens;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::error::ExtractError;
use locate::{locate_literals, SeriesKind};
use normalize::normalize;
use rows::{rows, RowShape};

/// One point of the value history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub number: Decimal,
    /// Formatted value shown on hover, e.g. `€42.50`. `None` when the source has `null`.
    pub tooltip: Option<String>,
    /// Second quoted column (series label or point style); not exported.
    pub label: Option<String>,
    pub annotation: Option<String>,
    pub annotation_text: Option<String>,
}

/// One point of the four-metric series shown next to the history on some pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedEntry {
    pub date: NaiveDate,
    pub value1: Decimal,
    pub value2: Decimal,
    pub value3: Decimal,
    pub value4: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesRow {
    History(HistoryEntry),
    Extended(ExtendedEntry),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeriesData {
    pub history: Vec<HistoryEntry>,
    /// `None` unless a second literal exists and holds at least one row.
    pub extended: Option<Vec<ExtendedEntry>>,
}

/// Extract both series from the script blocks of one page, in page order.
pub fn extract_series(blocks: &[&str]) -> Result<SeriesData, ExtractError> {
    let literals = locate_literals(blocks)?;
    let mut data = SeriesData::default();

    for literal in &literals {
        let normalized = normalize(literal);
        let shape = RowShape::from(normalized.kind);
        for row in rows(&normalized.text, shape) {
            match row {
                SeriesRow::History(h) => data.history.push(h),
                SeriesRow::Extended(e) => data.extended.get_or_insert_with(Vec::new).push(e),
            }
        }
        if literal.kind == SeriesKind::Extended && data.extended.is_none() {
            debug!("Second chart literal holds no rows");
        }
    }

    debug!(
        "Parsed {} history rows, {} extended rows",
        data.history.len(),
        data.extended.as_ref().map_or(0, Vec::len)
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_SCRIPT: &str = r#"
google.charts.setOnLoadCallback(drawChart);
function drawChart() {
    var data = new google.visualization.DataTable();
    data.addColumn('date', 'Date');
    data.addColumn('number', 'Value');
    data.addRows([
        [new Date(2023, 0, 15), 42.5, '€42.50', 'Retail price', null, null],
        [new Date(2023, 5, 1), 48.99, '€48.99', 'Value', 'discontinued', 'retired from stores'],
    ]);
    data = new google.visualization.DataTable();
    data.addRows([
        [new Date(2022, 11, 1), 10, 20, 30, 40, 'launch'],
        [new Date(2023, 0, 1), 11, 21, 31, 'short'],
    ]);
}
"#;

    #[test]
    fn no_marker_reports_not_found() {
        let err = extract_series(&["var a = 1;", ""]).unwrap_err();
        assert_eq!(err, ExtractError::NotFound);
    }

    #[test]
    fn history_only_page() {
        let block = "data.addRows([[new Date(2023, 0, 15), 42.5, '€42.50', 'Retail price']]);";
        let data = extract_series(&[block]).unwrap();
        assert_eq!(data.history.len(), 1);
        assert_eq!(data.history[0].date, NaiveDate::from_ymd_opt(2023, 1, 15).unwrap());
        assert_eq!(data.extended, None);
    }

    #[test]
    fn both_series_from_one_block() {
        let data = extract_series(&["var x;", PAGE_SCRIPT]).unwrap();

        assert_eq!(data.history.len(), 2);
        assert_eq!(data.history[0].annotation, None);
        assert_eq!(data.history[0].annotation_text, None);
        assert_eq!(data.history[1].annotation.as_deref(), Some("discontinued"));

        let extended = data.extended.unwrap();
        assert_eq!(extended.len(), 1);
        assert_eq!(extended[0].date, NaiveDate::from_ymd_opt(2022, 12, 1).unwrap());
        assert_eq!(extended[0].description.as_deref(), Some("launch"));
    }

    #[test]
    fn empty_second_literal_means_no_extended() {
        let block = "data.addRows([[new Date(2023, 0, 15), 1, 'a', 'b']]); data.addRows([]);";
        let data = extract_series(&[block]).unwrap();
        assert_eq!(data.extended, None);
    }

    #[test]
    fn empty_first_literal_is_empty_history() {
        let data = extract_series(&["data.addRows([]);"]).unwrap();
        assert!(data.history.is_empty());
    }
}
