use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".row.rowlist").unwrap());
static KEY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".text-muted").unwrap());
static VALUE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-xs-7").unwrap());
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n+").unwrap());

const DETAILS_PANEL: &str = "ContentPlaceHolder1_SetDetails";
const PRICING_PANEL: &str = "ContentPlaceHolder1_PanelSetPricing";
const BUYING_PANEL: &str = "ContentPlaceHolder1_PanelSetBuying";
const PREDICTIONS_PANEL: &str = "ContentPlaceHolder1_PanelSetPredictions";
const FACTS_PANEL: &str = "ContentPlaceHolder1_PanelSetFacts";
const ANALYSIS_PANEL: &str = "ContentPlaceHolder1_PanelSetAnalysis";

pub const NO_FACTS: &str = "No set facts available";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detail {
    pub name: String,
    pub value: String,
}

/// Key/value panels of a set detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetSheet {
    pub details: Vec<Detail>,
    pub pricing: Vec<Detail>,
    pub quick_buy: Vec<Detail>,
    pub predictions: Vec<Detail>,
    pub facts: String,
    pub subtheme_analysis: Vec<Detail>,
}

pub fn extract_sheet(doc: &Html) -> SetSheet {
    let facts = panel(doc, FACTS_PANEL)
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_FACTS.to_string());

    SetSheet {
        details: panel_rows(doc, DETAILS_PANEL),
        pricing: panel_rows(doc, PRICING_PANEL),
        quick_buy: panel_rows(doc, BUYING_PANEL),
        predictions: panel_rows(doc, PREDICTIONS_PANEL),
        facts,
        subtheme_analysis: panel_rows(doc, ANALYSIS_PANEL),
    }
}

fn panel<'a>(doc: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(&format!("div#{}", id)).ok()?;
    doc.select(&sel).next()
}

/// Rows missing either the key or the value cell are skipped.
fn panel_rows(doc: &Html, id: &str) -> Vec<Detail> {
    let Some(root) = panel(doc, id) else {
        return Vec::new();
    };

    root.select(&ROW_SEL)
        .filter_map(|row| {
            let key = row.select(&KEY_SEL).next()?;
            let value = row.select(&VALUE_SEL).next()?;
            Some(Detail {
                name: element_text(&key),
                value: element_text(&value),
            })
        })
        .collect()
}

fn element_text(el: &ElementRef) -> String {
    let raw: String = el.text().collect();
    let lines: Vec<&str> = raw.lines().map(str::trim).collect();
    BLANK_LINES_RE
        .replace_all(&lines.join("\n"), "\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(html: &str) -> SetSheet {
        extract_sheet(&Html::parse_document(html))
    }

    #[test]
    fn reads_key_value_rows() {
        let s = sheet(
            r#"<div id="ContentPlaceHolder1_SetDetails">
                <div class="row rowlist"><div class="col-xs-5 text-muted"> Set number </div><div class="col-xs-7"> 10294-1 </div></div>
                <div class="row rowlist"><div class="col-xs-5 text-muted">Theme</div><div class="col-xs-7">Icons</div></div>
                <div class="row rowlist"><div class="col-xs-12">no key here</div></div>
            </div>"#,
        );
        assert_eq!(
            s.details,
            vec![
                Detail { name: "Set number".into(), value: "10294-1".into() },
                Detail { name: "Theme".into(), value: "Icons".into() },
            ]
        );
        assert!(s.pricing.is_empty());
    }

    #[test]
    fn missing_facts_panel_uses_placeholder() {
        let s = sheet("<div id=\"other\"></div>");
        assert_eq!(s.facts, NO_FACTS);
        assert!(s.details.is_empty());
        assert!(s.subtheme_analysis.is_empty());
    }

    #[test]
    fn facts_text_is_trimmed() {
        let s = sheet(
            "<div id=\"ContentPlaceHolder1_PanelSetFacts\">\n  <h4>Set Facts</h4>\n\n\n  <p>  The largest set.  </p>\n</div>",
        );
        assert_eq!(s.facts, "Set Facts\nThe largest set.");
    }
}
