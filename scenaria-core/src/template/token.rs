use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Int(String),
    Float(f64),
    Str(String),
    Dollar,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    LeftArrow,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, Error> {
    let chars: Vec<char> = src.chars().collect();
    let mut out: Vec<Spanned> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let pos = i;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let after_dot = matches!(out.last(), Some(Spanned { token: Token::Dot, .. }));

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric()
                    || chars[i] == '_'
                    || (after_dot && chars[i] == '-'))
            {
                i += 1;
            }
            out.push(Spanned {
                token: Token::Ident(chars[start..i].iter().collect()),
                pos,
            });
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let is_float = i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit();
            if is_float {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let f = text
                    .parse::<f64>()
                    .map_err(|_| Error::new(format!("invalid number {text}")))?;
                out.push(Spanned {
                    token: Token::Float(f),
                    pos,
                });
            } else {
                out.push(Spanned {
                    token: Token::Int(chars[start..i].iter().collect()),
                    pos,
                });
            }
            continue;
        }

        if c == '"' || c == '\'' {
            let (s, next) = lex_string(&chars, i)?;
            out.push(Spanned {
                token: Token::Str(s),
                pos,
            });
            i = next;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('<', Some('-')) => (Token::LeftArrow, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Not, 1),
            ('$', _) => (Token::Dollar, 1),
            ('.', _) => (Token::Dot, 1),
            (',', _) => (Token::Comma, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('?', _) => (Token::Question, 1),
            (':', _) => (Token::Colon, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            _ => {
                return Err(Error::new(format!(
                    "unexpected character {c:?} at column {}",
                    pos + 1
                )))
            }
        };
        out.push(Spanned { token, pos });
        i += width;
    }
    Ok(out)
}

fn lex_string(chars: &[char], start: usize) -> Result<(String, usize), Error> {
    let quote = chars[start];
    let mut s = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((s, i + 1)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .copied()
                    .ok_or_else(|| Error::new("unterminated string literal"))?;
                match escaped {
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    'r' => s.push('\r'),
                    '\\' => s.push('\\'),
                    '"' => s.push('"'),
                    '\'' => s.push('\''),
                    other => {
                        return Err(Error::new(format!("unknown escape sequence \\{other}")))
                    }
                }
                i += 2;
            }
            c => {
                s.push(c);
                i += 1;
            }
        }
    }
    Err(Error::new("unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn dashes_only_inside_selectors() {
        assert_eq!(
            kinds("response.header.Content-Type"),
            vec![
                Token::Ident("response".into()),
                Token::Dot,
                Token::Ident("header".into()),
                Token::Dot,
                Token::Ident("Content-Type".into()),
            ]
        );
        assert_eq!(
            kinds("a-b"),
            vec![Token::Ident("a".into()), Token::Minus, Token::Ident("b".into())]
        );
    }

    #[test]
    fn left_arrow_and_comparisons() {
        assert_eq!(
            kinds("f <-"),
            vec![Token::Ident("f".into()), Token::LeftArrow]
        );
        assert_eq!(
            kinds("$ <= 1.5"),
            vec![Token::Dollar, Token::Le, Token::Float(1.5)]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(kinds(r#""a\"b\n""#), vec![Token::Str("a\"b\n".into())]);
        assert_eq!(kinds("'x'"), vec![Token::Str("x".into())]);
        assert!(tokenize("\"open").is_err());
    }
}
