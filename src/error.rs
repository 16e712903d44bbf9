use thiserror::Error;

/// Page-scoped failures of the series extraction pipeline.
///
/// None of these abort a batch: callers log them and move on to the next page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// No script block contains a `data.addRows([` call.
    #[error("no script block contains the chart data marker")]
    NotFound,

    /// A `data.addRows(` call whose bracketed argument never closes.
    #[error("unterminated row literal starting at byte {offset}")]
    Unterminated { offset: usize },

    /// Date components that do not form a calendar date (month is zero-based).
    #[error("invalid date components: year {year}, month {month}, day {day}")]
    DateRange { year: i64, month: i64, day: i64 },
}
