use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

static RESULT_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "#ContentPlaceHolder1_ctlSetsOverview_GridViewSets tr td.ctlsets-left div.mb-5 h4 a",
    )
    .unwrap()
});

/// `/set/<number>-<variant>/<slug>`
static SET_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/set/(\d+)(?:-(\d+))?/([^/?#]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetLink {
    pub href: String,
    pub number: String,
    pub variant: Option<String>,
    pub slug: String,
}

impl SetLink {
    fn parse(href: &str) -> Option<Self> {
        let caps = SET_HREF_RE.captures(href)?;
        Some(SetLink {
            href: href.to_string(),
            number: caps[1].to_string(),
            variant: caps.get(2).map(|m| m.as_str().to_string()),
            slug: caps[3].to_string(),
        })
    }

    /// `number-variant`, or the bare number when the link has no variant.
    pub fn set_id(&self) -> String {
        match &self.variant {
            Some(v) => format!("{}-{}", self.number, v),
            None => self.number.clone(),
        }
    }

    /// `10294` and `10294-1` both match the link for `10294-1`; `10` does not.
    fn matches(&self, wanted: &str) -> bool {
        let mut parts = wanted.trim().splitn(2, '-');
        let number = parts.next().unwrap_or_default();
        if number != self.number {
            return false;
        }
        match (parts.next(), &self.variant) {
            (Some(v), Some(own)) => v == own,
            _ => true,
        }
    }
}

/// Result links on a search page that point at `set_number`, in page order.
pub fn detail_links(html: &str, set_number: &str) -> Vec<SetLink> {
    let doc = Html::parse_document(html);
    doc.select(&RESULT_LINK_SEL)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(SetLink::parse)
        .filter(|link| link.matches(set_number))
        .collect()
}
