use std::iter::Peekable;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, trace};

use super::date::decode_date;
use super::locate::SeriesKind;
use super::tokens::{Token, Tokens};
use super::{ExtendedEntry, HistoryEntry, SeriesRow};

/// The two row layouts found in chart literals.
///
/// History: `new Date(y, m, d), number, 'tooltip', 'label'[, 'annotation'][, 'annotation text']`
/// Extended: `new Date(y, m, d), n1, n2, n3, n4, 'description'`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    History,
    Extended,
}

impl From<SeriesKind> for RowShape {
    fn from(kind: SeriesKind) -> Self {
        match kind {
            SeriesKind::History => RowShape::History,
            SeriesKind::Extended => RowShape::Extended,
        }
    }
}

#[derive(Debug)]
enum Field {
    Number(Decimal),
    Text(String),
    Absent,
}

impl Field {
    fn number(self) -> Option<Decimal> {
        match self {
            Field::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Outer `None` means the field is not a quoted token at all.
    fn text(self) -> Option<Option<String>> {
        match self {
            Field::Text(s) => Some(Some(s)),
            Field::Absent => Some(None),
            Field::Number(_) => None,
        }
    }
}

impl RowShape {
    fn build(self, date: NaiveDate, fields: Vec<Field>) -> Option<SeriesRow> {
        match self {
            RowShape::History => history(date, fields).map(SeriesRow::History),
            RowShape::Extended => extended(date, fields).map(SeriesRow::Extended),
        }
    }
}

fn history(date: NaiveDate, fields: Vec<Field>) -> Option<HistoryEntry> {
    if !(3..=5).contains(&fields.len()) {
        return None;
    }
    let mut it = fields.into_iter();
    let number = it.next()?.number()?;
    let tooltip = it.next()?.text()?;
    let label = it.next()?.text()?;
    let annotation = match it.next() {
        Some(f) => f.text()?,
        None => None,
    };
    let annotation_text = match it.next() {
        Some(f) => f.text()?,
        None => None,
    };
    Some(HistoryEntry {
        date,
        number,
        tooltip,
        label,
        annotation,
        annotation_text,
    })
}

fn extended(date: NaiveDate, fields: Vec<Field>) -> Option<ExtendedEntry> {
    if fields.len() != 5 {
        return None;
    }
    let mut it = fields.into_iter();
    Some(ExtendedEntry {
        date,
        value1: it.next()?.number()?,
        value2: it.next()?.number()?,
        value3: it.next()?.number()?,
        value4: it.next()?.number()?,
        description: it.next()?.text()?,
    })
}

/// Lazy scan over a normalised literal, yielding each well-formed row of one shape
/// in source order. Segments that do not fit are skipped without error.
pub struct Rows<'a> {
    tokens: Peekable<Tokens<'a>>,
    shape: RowShape,
}

pub fn rows(text: &str, shape: RowShape) -> Rows<'_> {
    Rows {
        tokens: Tokens::new(text).peekable(),
        shape,
    }
}

impl<'a> Rows<'a> {
    /// Consume the next token only if it equals `want`.
    fn eat(&mut self, want: &Token<'a>) -> bool {
        if self.tokens.peek() == Some(want) {
            self.tokens.next();
            true
        } else {
            false
        }
    }

    fn int(&mut self) -> Option<i64> {
        let value = match self.tokens.peek() {
            Some(Token::Number(s)) if !s.contains('.') => s.trim_start_matches('+').parse::<i64>().ok()?,
            _ => return None,
        };
        self.tokens.next();
        Some(value)
    }

    /// `( int , int , int )` following `new Date`.
    fn date_args(&mut self) -> Option<(i64, i64, i64)> {
        if !self.eat(&Token::LParen) {
            return None;
        }
        let year = self.int()?;
        if !self.eat(&Token::Comma) {
            return None;
        }
        let month = self.int()?;
        if !self.eat(&Token::Comma) {
            return None;
        }
        let day = self.int()?;
        if !self.eat(&Token::RParen) {
            return None;
        }
        Some((year, month, day))
    }

    /// Comma-led scalar fields up to the end of the row (`]` or end of input).
    fn fields(&mut self) -> Option<Vec<Field>> {
        let mut fields = Vec::new();
        loop {
            match self.tokens.peek() {
                Some(Token::Comma) => {
                    self.tokens.next();
                }
                Some(Token::Close) | None => return Some(fields),
                Some(_) => return None,
            }
            // trailing comma before `]`
            if matches!(self.tokens.peek(), Some(Token::Close)) && !fields.is_empty() {
                return Some(fields);
            }

            let field = match self.tokens.peek()? {
                Token::Number(s) => Field::Number(s.trim_start_matches('+').parse().ok()?),
                Token::Str(s) => Field::Text(s.clone()),
                Token::Absent => Field::Absent,
                _ => return None,
            };
            self.tokens.next();
            fields.push(field);
        }
    }
}

impl<'a> Iterator for Rows<'a> {
    type Item = SeriesRow;

    fn next(&mut self) -> Option<SeriesRow> {
        loop {
            if self.tokens.next()? != Token::Ident("new") || !self.eat(&Token::Ident("Date")) {
                continue;
            }
            let Some((year, month, day)) = self.date_args() else {
                trace!("Malformed date constructor");
                continue;
            };
            let Some(fields) = self.fields() else {
                trace!("Malformed row fields");
                continue;
            };
            let date = match decode_date(year, month, day) {
                Ok(date) => date,
                Err(e) => {
                    debug!("Dropping row: {}", e);
                    continue;
                }
            };
            match self.shape.build(date, fields) {
                Some(row) => return Some(row),
                None => trace!("Row does not fit {:?} shape", self.shape),
            }
        }
    }
}
