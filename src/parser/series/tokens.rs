use super::normalize::ABSENT_SENTINEL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Open,
    Close,
    LParen,
    RParen,
    Comma,
    /// Signed decimal literal, kept as source text.
    Number(&'a str),
    /// Quoted string with escapes resolved.
    Str(String),
    /// The quoted absent-value sentinel.
    Absent,
    Ident(&'a str),
    Other(char),
}

/// Lazy tokenizer over a normalised row literal. Whitespace is skipped.
pub struct Tokens<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn number(&mut self) -> Token<'a> {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut end = 0;
        if matches!(bytes.first(), Some(b'-' | b'+')) {
            end += 1;
        }
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end < bytes.len()
            && bytes[end] == b'.'
            && bytes.get(end + 1).is_some_and(u8::is_ascii_digit)
        {
            end += 1;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
        self.pos += end;
        Token::Number(&rest[..end])
    }

    fn string(&mut self, quote: char) -> Token<'a> {
        let body = &self.rest()[quote.len_utf8()..];
        let mut value = String::new();
        let mut chars = body.char_indices();

        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, e)) => value.push(e),
                    None => break,
                },
                c if c == quote => {
                    self.pos += quote.len_utf8() + i + c.len_utf8();
                    return if value.chars().eq([ABSENT_SENTINEL]) {
                        Token::Absent
                    } else {
                        Token::Str(value)
                    };
                }
                c => value.push(c),
            }
        }

        // Unterminated: surface the stray quote and resume right after it.
        self.pos += quote.len_utf8();
        Token::Other(quote)
    }

    fn ident(&mut self) -> Token<'a> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(_, c)| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += end;
        Token::Ident(&rest[..end])
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();

        let mut chars = trimmed.chars();
        let c = chars.next()?;
        let starts_number = c.is_ascii_digit()
            || ((c == '-' || c == '+') && chars.next().is_some_and(|d| d.is_ascii_digit()));

        let simple = match c {
            '[' => Some(Token::Open),
            ']' => Some(Token::Close),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(tok) = simple {
            self.pos += 1;
            return Some(tok);
        }

        let tok = if starts_number {
            self.number()
        } else if c == '\'' || c == '"' {
            self.string(c)
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            self.ident()
        } else {
            self.pos += c.len_utf8();
            Token::Other(c)
        };
        Some(tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token<'_>> {
        Tokens::new(src).collect()
    }

    #[test]
    fn date_row() {
        let toks = lex("[new Date(2023, 0, 15), 42.5, '€42.50']");
        assert_eq!(
            toks,
            vec![
                Token::Open,
                Token::Ident("new"),
                Token::Ident("Date"),
                Token::LParen,
                Token::Number("2023"),
                Token::Comma,
                Token::Number("0"),
                Token::Comma,
                Token::Number("15"),
                Token::RParen,
                Token::Comma,
                Token::Number("42.5"),
                Token::Comma,
                Token::Str("€42.50".into()),
                Token::Close,
            ]
        );
    }

    #[test]
    fn sentinel_is_absent_and_empty_string_is_not() {
        let src = format!("'{}', ''", ABSENT_SENTINEL);
        assert_eq!(lex(&src), vec![Token::Absent, Token::Comma, Token::Str(String::new())]);
    }

    #[test]
    fn escapes_and_double_quotes() {
        assert_eq!(lex(r#""say \"hi\"""#), vec![Token::Str("say \"hi\"".into())]);
        assert_eq!(lex(r"'it\'s'"), vec![Token::Str("it's".into())]);
    }

    #[test]
    fn signed_numbers() {
        assert_eq!(lex("-3.25 +7"), vec![Token::Number("-3.25"), Token::Number("+7")]);
    }

    #[test]
    fn trailing_dot_is_not_part_of_number() {
        assert_eq!(lex("5."), vec![Token::Number("5"), Token::Other('.')]);
    }

    #[test]
    fn unterminated_string_yields_stray_quote() {
        assert_eq!(lex("'abc"), vec![Token::Other('\''), Token::Ident("abc")]);
    }
}
