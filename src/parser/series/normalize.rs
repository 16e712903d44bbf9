use super::locate::{SeriesKind, SeriesLiteral};

/// Stands in for a bare `null`. Private-use code point, never present in page text.
pub const ABSENT_SENTINEL: char = '\u{E000}';

const ABSENT_WORD: &str = "null";

/// Row literal flattened to one line, with every absent value quoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLiteral {
    pub kind: SeriesKind,
    pub text: String,
}

/// Remove line breaks and rewrite each bare `null` as `'\u{E000}'`, so that every
/// field of a row is either a number, a date constructor or a quoted token.
///
/// Quoted text is copied untouched, except for line breaks.
pub fn normalize(literal: &SeriesLiteral) -> NormalizedLiteral {
    NormalizedLiteral {
        kind: literal.kind,
        text: normalize_text(literal.text),
    }
}

fn normalize_text(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut rest = src;

    while let Some(c) = rest.chars().next() {
        let width = c.len_utf8();

        if c == '\n' || c == '\r' {
            rest = &rest[width..];
            continue;
        }

        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                out.push(c);
            }
            None if rest.starts_with(ABSENT_WORD)
                && !ends_with_word_char(&out)
                && !rest[ABSENT_WORD.len()..]
                    .chars()
                    .next()
                    .is_some_and(is_word_char) =>
            {
                out.push('\'');
                out.push(ABSENT_SENTINEL);
                out.push('\'');
                rest = &rest[ABSENT_WORD.len()..];
                continue;
            }
            None => out.push(c),
        }

        rest = &rest[width..];
    }

    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn ends_with_word_char(s: &str) -> bool {
    s.chars().next_back().is_some_and(is_word_char)
}
