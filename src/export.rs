use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::parser::panels::{Detail, SetSheet};
use crate::parser::series::{ExtendedEntry, HistoryEntry, SeriesData};

pub const HISTORY_HEADER: [&str; 5] = ["Date", "Value", "Currency Value", "Status", "Description"];
pub const EXTENDED_HEADER: [&str; 6] = [
    "Date", "Value 1", "Value 2", "Value 3", "Value 4", "Description",
];
pub const SHEET_HEADER: [&str; 6] = [
    "Details", "Pricing", "Quick Buy", "Set Predictions", "Set Facts", "Subtheme Analysis",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Files written for one set.
#[derive(Debug)]
pub struct Written {
    pub history: Option<PathBuf>,
    pub extended: Option<PathBuf>,
}

pub fn history_path(out_dir: &Path, set_id: &str) -> PathBuf {
    out_dir.join(format!("{}_history.csv", file_stem(set_id)))
}

pub fn extended_path(out_dir: &Path, set_id: &str) -> PathBuf {
    out_dir.join(format!("{}_extended.csv", file_stem(set_id)))
}

/// Keep set identifiers from escaping the output directory.
fn file_stem(set_id: &str) -> String {
    set_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Write the history table, and the extended table when the page had one.
pub fn write_series(out_dir: &Path, set_id: &str, data: &SeriesData) -> Result<Written> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let path = history_path(out_dir, set_id);
    let file = fs::File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_history(file, &data.history)?;
    let mut written = Written {
        history: Some(path),
        extended: None,
    };

    if let Some(extended) = &data.extended {
        let path = extended_path(out_dir, set_id);
        let file =
            fs::File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        write_extended(file, extended)?;
        written.extended = Some(path);
    }

    info!(
        "{}: {} history rows, {} extended rows",
        set_id,
        data.history.len(),
        data.extended.as_ref().map_or(0, Vec::len)
    );
    Ok(written)
}

pub fn history_record(e: &HistoryEntry) -> [String; 5] {
    [
        e.date.format(DATE_FORMAT).to_string(),
        e.number.to_string(),
        e.tooltip.clone().unwrap_or_default(),
        e.annotation.clone().unwrap_or_default(),
        e.annotation_text.clone().unwrap_or_default(),
    ]
}

pub fn extended_record(e: &ExtendedEntry) -> [String; 6] {
    [
        e.date.format(DATE_FORMAT).to_string(),
        e.value1.to_string(),
        e.value2.to_string(),
        e.value3.to_string(),
        e.value4.to_string(),
        e.description.clone().unwrap_or_default(),
    ]
}

pub fn write_history<W: Write>(out: W, entries: &[HistoryEntry]) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(HISTORY_HEADER)?;
    for e in entries {
        w.write_record(history_record(e))?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_extended<W: Write>(out: W, entries: &[ExtendedEntry]) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(EXTENDED_HEADER)?;
    for e in entries {
        w.write_record(extended_record(e))?;
    }
    w.flush()?;
    Ok(())
}

// ── Set sheet ──

/// Append a set's panels to the shared sheet, writing the header only into an empty file.
pub fn append_sheet(path: &Path, sheet: &SetSheet) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let needs_header = file.metadata()?.len() == 0;
    write_sheet(file, sheet, needs_header)
}

/// One row per index up to the longest panel; values only, facts on the first row.
pub fn write_sheet<W: Write>(out: W, sheet: &SetSheet, header: bool) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    if header {
        w.write_record(SHEET_HEADER)?;
    }

    let columns: [&[Detail]; 4] = [
        &sheet.details,
        &sheet.pricing,
        &sheet.quick_buy,
        &sheet.predictions,
    ];
    let rows = columns
        .iter()
        .map(|c| c.len())
        .chain([sheet.subtheme_analysis.len(), 1])
        .max()
        .unwrap_or(1);

    for i in 0..rows {
        w.write_record([
            cell(&sheet.details, i),
            cell(&sheet.pricing, i),
            cell(&sheet.quick_buy, i),
            cell(&sheet.predictions, i),
            if i == 0 { sheet.facts.as_str() } else { "" },
            cell(&sheet.subtheme_analysis, i),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn cell(col: &[Detail], i: usize) -> &str {
    col.get(i).map(|d| d.value.as_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::series::extract_series;
    use chrono::NaiveDate;

    fn to_string(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn detail(value: &str) -> Detail {
        Detail {
            name: "k".into(),
            value: value.into(),
        }
    }

    #[test]
    fn history_table() {
        let block = "data.addRows([[new Date(2023, 0, 15), 42.5, '€42.50', 'Retail price', null, null],\
                     [new Date(2023, 5, 1), 48.99, '€48.99', 'Value', 'discontinued', 'retired from stores']]);";
        let data = extract_series(&[block]).unwrap();

        let mut buf = Vec::new();
        write_history(&mut buf, &data.history).unwrap();
        assert_eq!(
            to_string(buf),
            "Date,Value,Currency Value,Status,Description\n\
             2023-01-15,42.5,€42.50,,\n\
             2023-06-01,48.99,€48.99,discontinued,retired from stores\n"
        );
    }

    #[test]
    fn history_cells_reproduce_source_fields() {
        let row = "new Date(2020, 3, 9), 12.75, '$12.75', 'Value', 'A', 'Some note'";
        let block = format!("data.addRows([[{}]]);", row);
        let data = extract_series(&[block.as_str()]).unwrap();
        let cells = history_record(&data.history[0]);

        let source_fields = "2020-04-09,12.75,$12.75,A,Some note";
        assert_eq!(squash(&cells.join(",")), squash(source_fields));
    }

    #[test]
    fn extended_table() {
        let entry = ExtendedEntry {
            date: NaiveDate::from_ymd_opt(2022, 12, 1).unwrap(),
            value1: "10".parse().unwrap(),
            value2: "20".parse().unwrap(),
            value3: "30".parse().unwrap(),
            value4: "40".parse().unwrap(),
            description: None,
        };
        let mut buf = Vec::new();
        write_extended(&mut buf, &[entry]).unwrap();
        assert_eq!(
            to_string(buf),
            "Date,Value 1,Value 2,Value 3,Value 4,Description\n2022-12-01,10,20,30,40,\n"
        );
    }

    #[test]
    fn sheet_rows_pad_shorter_panels() {
        let sheet = SetSheet {
            details: vec![detail("10294-1"), detail("Titanic"), detail("Icons")],
            pricing: vec![detail("$679.99")],
            quick_buy: vec![],
            predictions: vec![detail("$1,050.00")],
            facts: "Big set".into(),
            subtheme_analysis: vec![detail("+12%"), detail("3")],
        };
        let mut buf = Vec::new();
        write_sheet(&mut buf, &sheet, true).unwrap();
        assert_eq!(
            to_string(buf),
            "Details,Pricing,Quick Buy,Set Predictions,Set Facts,Subtheme Analysis\n\
             10294-1,$679.99,,\"$1,050.00\",Big set,+12%\n\
             Titanic,,,,,3\n\
             Icons,,,,,\n"
        );
    }

    #[test]
    fn empty_sheet_still_writes_facts_row() {
        let sheet = SetSheet {
            details: vec![],
            pricing: vec![],
            quick_buy: vec![],
            predictions: vec![],
            facts: "No set facts available".into(),
            subtheme_analysis: vec![],
        };
        let mut buf = Vec::new();
        write_sheet(&mut buf, &sheet, false).unwrap();
        assert_eq!(to_string(buf), ",,,,No set facts available,\n");
    }

    #[test]
    fn files_written_per_set() {
        let dir = tempfile::tempdir().unwrap();
        let history_only = SeriesData {
            history: vec![],
            extended: None,
        };
        let written = write_series(dir.path(), "10294-1", &history_only).unwrap();
        assert_eq!(written.history, Some(dir.path().join("10294-1_history.csv")));
        assert!(written.extended.is_none());
        assert!(!extended_path(dir.path(), "10294-1").exists());

        let with_extended = SeriesData {
            history: vec![],
            extended: Some(vec![]),
        };
        let written = write_series(dir.path(), "10294-1", &with_extended).unwrap();
        assert!(written.extended.unwrap().exists());
    }

    #[test]
    fn sheet_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lego_sets.csv");
        let sheet = SetSheet {
            details: vec![detail("a")],
            pricing: vec![],
            quick_buy: vec![],
            predictions: vec![],
            facts: "f".into(),
            subtheme_analysis: vec![],
        };
        append_sheet(&path, &sheet).unwrap();
        append_sheet(&path, &sheet).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("Details,Pricing").count(), 1);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn set_id_is_sanitised() {
        let p = history_path(Path::new("out"), "../10294/1");
        assert_eq!(p, Path::new("out").join("___10294_1_history.csv"));
    }
}
