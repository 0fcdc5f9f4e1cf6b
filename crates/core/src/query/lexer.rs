// Tokenizer for the product query language

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Number(f64),
    Param(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Star,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Token {
    /// Case-insensitive keyword check
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(ident) if ident.eq_ignore_ascii_case(keyword))
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{}", s),
            Token::Str(s) => write!(f, "'{}'", s),
            Token::Number(n) => write!(f, "{}", n),
            Token::Param(p) => write!(f, "@{}", p),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Dot => f.write_str("."),
            Token::Star => f.write_str("*"),
            Token::Eq => f.write_str("="),
            Token::Ne => f.write_str("!="),
            Token::Lt => f.write_str("<"),
            Token::Le => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Ge => f.write_str(">="),
        }
    }
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, CatalogError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(&c) = chars.get(pos) {
        match c {
            c if c.is_whitespace() => pos += 1,
            '(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                pos += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                pos += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                pos += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                pos += 1;
            }
            '!' => {
                if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    pos += 2;
                } else {
                    return Err(CatalogError::Query(format!(
                        "unexpected character '!' at position {}",
                        pos
                    )));
                }
            }
            '<' => match chars.get(pos + 1) {
                Some('=') => {
                    tokens.push(Token::Le);
                    pos += 2;
                }
                Some('>') => {
                    tokens.push(Token::Ne);
                    pos += 2;
                }
                _ => {
                    tokens.push(Token::Lt);
                    pos += 1;
                }
            },
            '>' => {
                if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    pos += 2;
                } else {
                    tokens.push(Token::Gt);
                    pos += 1;
                }
            }
            '\'' | '"' => {
                let (text, next) = read_string(&chars, pos)?;
                tokens.push(Token::Str(text));
                pos = next;
            }
            '@' => {
                let start = pos + 1;
                let end = scan_while(&chars, start, is_ident_char);
                if end == start {
                    return Err(CatalogError::Query(format!(
                        "empty parameter name at position {}",
                        pos
                    )));
                }
                tokens.push(Token::Param(chars[start..end].iter().collect()));
                pos = end;
            }
            c if c.is_ascii_digit() || (c == '-' && next_is_digit(&chars, pos)) => {
                let (number, next) = read_number(&chars, pos)?;
                tokens.push(Token::Number(number));
                pos = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = scan_while(&chars, pos, is_ident_char);
                tokens.push(Token::Ident(chars[pos..end].iter().collect()));
                pos = end;
            }
            other => {
                return Err(CatalogError::Query(format!(
                    "unexpected character '{}' at position {}",
                    other, pos
                )))
            }
        }
    }

    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn next_is_digit(chars: &[char], pos: usize) -> bool {
    chars.get(pos + 1).is_some_and(|c| c.is_ascii_digit())
}

fn scan_while(chars: &[char], start: usize, pred: fn(char) -> bool) -> usize {
    let mut end = start;
    while chars.get(end).is_some_and(|c| pred(*c)) {
        end += 1;
    }
    end
}

/// Quoted string; the quote char doubles or backslash-escapes itself.
fn read_string(chars: &[char], start: usize) -> Result<(String, usize), CatalogError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut pos = start + 1;

    loop {
        match chars.get(pos) {
            None => {
                return Err(CatalogError::Query(format!(
                    "unterminated string starting at position {}",
                    start
                )))
            }
            Some('\\') => match chars.get(pos + 1) {
                Some(escaped) => {
                    text.push(*escaped);
                    pos += 2;
                }
                None => {
                    return Err(CatalogError::Query(
                        "dangling escape at end of query".to_string(),
                    ))
                }
            },
            Some(c) if *c == quote => {
                if chars.get(pos + 1) == Some(&quote) {
                    text.push(quote);
                    pos += 2;
                } else {
                    return Ok((text, pos + 1));
                }
            }
            Some(c) => {
                text.push(*c);
                pos += 1;
            }
        }
    }
}

fn read_number(chars: &[char], start: usize) -> Result<(f64, usize), CatalogError> {
    let mut end = start;
    if chars.get(end) == Some(&'-') {
        end += 1;
    }
    end = scan_while(chars, end, |c| c.is_ascii_digit());
    if chars.get(end) == Some(&'.') && chars.get(end + 1).is_some_and(|c| c.is_ascii_digit()) {
        end = scan_while(chars, end + 1, |c| c.is_ascii_digit());
    }
    if matches!(chars.get(end), Some('e') | Some('E')) {
        let mut exp = end + 1;
        if matches!(chars.get(exp), Some('+') | Some('-')) {
            exp += 1;
        }
        if chars.get(exp).is_some_and(|c| c.is_ascii_digit()) {
            end = scan_while(chars, exp, |c| c.is_ascii_digit());
        }
    }

    let text: String = chars[start..end].iter().collect();
    text.parse::<f64>()
        .map(|n| (n, end))
        .map_err(|e| CatalogError::Query(format!("invalid number '{}': {}", text, e)))
}
