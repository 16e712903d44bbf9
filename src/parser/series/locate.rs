use tracing::{debug, warn};

use crate::error::ExtractError;

/// The chart call whose first argument is the bracketed row literal.
pub const MARKER: &str = "data.addRows(";

/// Which series a literal feeds, decided purely by position: the page never
/// tags the two calls, so the first literal found is the history series and
/// the second one (if any) is the extended series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    History,
    Extended,
}

impl SeriesKind {
    fn from_ordinal(n: usize) -> Option<Self> {
        match n {
            0 => Some(SeriesKind::History),
            1 => Some(SeriesKind::Extended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesLiteral<'a> {
    pub kind: SeriesKind,
    /// Verbatim `[...]` argument, brackets included.
    pub text: &'a str,
}

/// Find the row literals passed to `data.addRows(...)`.
///
/// The first block holding a call is the selected block; all of its literals are
/// taken in order, then later blocks are searched until two literals are known.
/// Anything past the second literal is ignored. A selected block whose only
/// literal is unterminated counts as not found.
pub fn locate_literals<'a>(blocks: &[&'a str]) -> Result<Vec<SeriesLiteral<'a>>, ExtractError> {
    let selected = blocks
        .iter()
        .position(|b| next_call(b, 0).is_some())
        .ok_or(ExtractError::NotFound)?;

    let mut found = Vec::new();
    let mut ignored = 0usize;

    for block in &blocks[selected..] {
        let mut from = 0;
        while let Some(open) = next_call(block, from) {
            match literal_at(block, open) {
                Ok(end) => {
                    match SeriesKind::from_ordinal(found.len()) {
                        Some(kind) => found.push(SeriesLiteral {
                            kind,
                            text: &block[open..end],
                        }),
                        None => ignored += 1,
                    }
                    from = end;
                }
                Err(e) => {
                    warn!("Skipping chart literal: {}", e);
                    from = open + 1;
                }
            }
        }
    }

    if ignored > 0 {
        debug!("Ignored {} chart literals beyond the second", ignored);
    }
    if found.is_empty() {
        return Err(ExtractError::NotFound);
    }
    Ok(found)
}

/// Byte offset of the `[` opening the next call argument at or after `from`.
fn next_call(text: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(rel) = text[pos..].find(MARKER) {
        let after = pos + rel + MARKER.len();
        let rest = &text[after..];
        let trimmed = rest.trim_start();
        if trimmed.starts_with('[') {
            return Some(after + (rest.len() - trimmed.len()));
        }
        pos = after;
    }
    None
}

/// End offset (exclusive) of the bracket literal opening at `open`.
///
/// Brackets inside quoted strings do not count, and the literal must be followed
/// by the closing `)` of the call.
fn literal_at(text: &str, open: usize) -> Result<usize, ExtractError> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = i + 1;
                        return if text[end..].trim_start().starts_with(')') {
                            Ok(end)
                        } else {
                            Err(ExtractError::Unterminated { offset: open })
                        };
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }

    Err(ExtractError::Unterminated { offset: open })
}
