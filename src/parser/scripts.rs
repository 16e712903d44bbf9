use std::sync::LazyLock;

use scraper::{Html, Selector};

static SCRIPT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());

/// Text of every `<script>` element, in document order.
pub fn script_blocks(doc: &Html) -> Vec<String> {
    doc.select(&SCRIPT_SEL)
        .map(|el| el.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect()
}
