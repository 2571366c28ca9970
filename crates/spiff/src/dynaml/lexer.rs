//! tokenizer for dynaml source text
use super::parser::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Integer(i64),
    String(String),
    Identifier(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqualEqual,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Bang,
    /// `-and`
    And,
    /// `-or`
    Or,
    /// `||`
    Fallback,
    Pipe,
    /// `->`
    Arrow,
    Question,
    Colon,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
    /// whitespace directly before the token
    pub spaced: bool,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = vec![];
    let mut pos = 0;
    let mut line = 1;
    let mut column = 1;
    let mut spaced = false;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
            pos += 1;
            spaced = true;
            continue;
        }

        let peek = chars.get(pos + 1).copied();
        let start_line = line;
        let start_column = column;
        let (token, len) = match c {
            '0'..='9' => {
                let len = chars[pos..]
                    .iter()
                    .take_while(|c| c.is_ascii_digit())
                    .count();
                let digits: String = chars[pos..pos + len].iter().collect();
                let value = digits.parse::<i64>().map_err(|_| {
                    ParseError::new("integer", format!("integer {digits} out of range"), line, column)
                })?;
                (Token::Integer(value), len)
            }
            '"' => {
                let mut value = String::new();
                let mut len = 1;
                loop {
                    match chars.get(pos + len) {
                        None => {
                            return Err(ParseError::new(
                                "string",
                                "unterminated string literal",
                                line,
                                column,
                            ))
                        }
                        Some('"') => {
                            len += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = match chars.get(pos + len + 1) {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some('r') => '\r',
                                Some(other) => *other,
                                None => {
                                    return Err(ParseError::new(
                                        "string",
                                        "unterminated escape sequence",
                                        line,
                                        column,
                                    ))
                                }
                            };
                            value.push(escaped);
                            len += 2;
                        }
                        Some(other) => {
                            value.push(*other);
                            len += 1;
                        }
                    }
                }
                (Token::String(value), len)
            }
            c if is_identifier_start(c) => {
                let mut len = 1;
                while let Some(&next) = chars.get(pos + len) {
                    if is_identifier_char(next) {
                        len += 1;
                    } else if next == '-'
                        && chars.get(pos + len + 1).copied().is_some_and(is_identifier_start)
                    {
                        len += 1;
                    } else {
                        break;
                    }
                }
                (Token::Identifier(chars[pos..pos + len].iter().collect()), len)
            }
            '-' if peek == Some('>') => (Token::Arrow, 2),
            '-' if keyword_at(&chars, pos + 1, "and") => (Token::And, 4),
            '-' if keyword_at(&chars, pos + 1, "or") => (Token::Or, 3),
            '-' => (Token::Minus, 1),
            '|' if peek == Some('|') => (Token::Fallback, 2),
            '|' => (Token::Pipe, 1),
            '=' if peek == Some('=') => (Token::EqualEqual, 2),
            '!' if peek == Some('=') => (Token::NotEqual, 2),
            '!' => (Token::Bang, 1),
            '<' if peek == Some('=') => (Token::LessEqual, 2),
            '<' => (Token::Less, 1),
            '>' if peek == Some('=') => (Token::GreaterEqual, 2),
            '>' => (Token::Greater, 1),
            '.' => (Token::Dot, 1),
            ',' => (Token::Comma, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '+' => (Token::Plus, 1),
            '*' => (Token::Star, 1),
            '/' => (Token::Slash, 1),
            '%' => (Token::Percent, 1),
            '?' => (Token::Question, 1),
            ':' => (Token::Colon, 1),
            other => {
                return Err(ParseError::new(
                    "token",
                    format!("unexpected character '{other}'"),
                    line,
                    column,
                ))
            }
        };

        let consumed = &chars[pos..pos + len];
        if let Some(last_newline) = consumed.iter().rposition(|c| *c == '\n') {
            line += consumed.iter().filter(|c| **c == '\n').count();
            column = len - last_newline;
        } else {
            column += len;
        }

        tokens.push(Spanned {
            token,
            line: start_line,
            column: start_column,
            spaced,
        });
        pos += len;
        spaced = false;
    }

    tokens.push(Spanned {
        token: Token::End,
        line,
        column,
        spaced,
    });

    Ok(tokens)
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `word` at `pos`, not followed by more identifier characters
fn keyword_at(chars: &[char], pos: usize, word: &str) -> bool {
    let len = word.chars().count();
    chars.len() >= pos + len
        && chars[pos..pos + len].iter().copied().eq(word.chars())
        && !chars.get(pos + len).copied().is_some_and(is_identifier_char)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("must tokenize")
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn operators() {
        assert_eq!(
            tokens("a -and b -or !c || d"),
            vec![
                Token::Identifier("a".into()),
                Token::And,
                Token::Identifier("b".into()),
                Token::Or,
                Token::Bang,
                Token::Identifier("c".into()),
                Token::Fallback,
                Token::Identifier("d".into()),
                Token::End,
            ]
        );
    }

    #[test]
    fn dashed_identifiers() {
        assert_eq!(
            tokens("my-key - 1"),
            vec![
                Token::Identifier("my-key".into()),
                Token::Minus,
                Token::Integer(1),
                Token::End,
            ]
        );
    }

    #[test]
    fn dash_before_digit_subtracts() {
        assert_eq!(
            tokens("a-1"),
            vec![
                Token::Identifier("a".into()),
                Token::Minus,
                Token::Integer(1),
                Token::End,
            ]
        );
    }

    #[test]
    fn lambda_tokens() {
        assert_eq!(
            tokens("|x|->x"),
            vec![
                Token::Pipe,
                Token::Identifier("x".into()),
                Token::Pipe,
                Token::Arrow,
                Token::Identifier("x".into()),
                Token::End,
            ]
        );
    }

    #[test]
    fn spacing_is_tracked() {
        let spanned = tokenize("f(a) (b)").unwrap();
        assert!(!spanned[1].spaced);
        assert!(spanned[4].spaced);
    }

    #[test]
    fn unterminated_string() {
        let err = tokenize("\"abc").expect_err("must fail");
        assert_eq!((err.line, err.column), (1, 1));
    }
}
