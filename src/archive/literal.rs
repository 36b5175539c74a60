//! Tokenizer for the literal argument lists embedded in search responses
//!
//! The search page renders each frame as a call such as
//! `kuvapiltfuncarhiiv(261295, '1985', 58.70, 27.15, ...)`. Only plain literals
//! are accepted: integers, floats, quoted strings, bare empty slots, the
//! `null`/`undefined`/`None` keywords and booleans (kept as text). Anything else is rejected, so a
//! response can never smuggle an expression into the decoder.

use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

/// A single decoded argument
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    /// A bare empty slot (`1,,2`) or a null keyword
    Empty,
}

/// Errors raised while tokenizing an argument list
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiteralError {
    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),

    #[error("unexpected character {ch:?} at byte {at}")]
    Unexpected { ch: char, at: usize },

    #[error("unsupported identifier {0:?}")]
    Identifier(String),

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("argument list is not closed")]
    Unclosed,
}

impl Literal {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Integer view; integral floats and numeric strings are accepted
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 && in_i64_range(*v) => Some(*v as i64),
            Self::Float(_) => None,
            Self::Str(s) => s.trim().parse().ok(),
            Self::Empty => None,
        }
    }

    /// Float view; numeric strings are accepted
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Empty => None,
        }
    }

    /// Text view; numbers are rendered the way the service prints them
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Int(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::Str(s) => Some(s),
            Self::Empty => None,
        }
    }
}

impl From<&serde_json::Value> for Literal {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Empty,
            Value::Bool(b) => Self::Str(b.to_string()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Empty),
            },
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Empty,
        }
    }
}

/// Parses a literal argument list
///
/// `input` must start immediately after the opening parenthesis. On success
/// returns the decoded values and the number of bytes consumed, including the
/// closing parenthesis. A trailing comma before `)` is ignored; every other
/// empty slot becomes [`Literal::Empty`].
///
/// # Example
///
/// ```
/// use fotoladu_ingest::archive::literal::{parse_argument_list, Literal};
///
/// let (values, used) = parse_argument_list("12, 'a',, 1.5) rest").unwrap();
/// assert_eq!(
///     values,
///     vec![Literal::Int(12), Literal::Str("a".into()), Literal::Empty, Literal::Float(1.5)]
/// );
/// assert_eq!(used, 14);
/// ```
pub fn parse_argument_list(input: &str) -> Result<(Vec<Literal>, usize), LiteralError> {
    let mut values = Vec::new();
    let mut chars = input.char_indices().peekable();
    let mut expecting_value = true;

    loop {
        skip_whitespace(&mut chars);

        let Some(&(at, ch)) = chars.peek() else {
            return Err(LiteralError::Unclosed);
        };

        match ch {
            ')' => {
                chars.next();
                return Ok((values, at + 1));
            }
            ',' => {
                chars.next();
                if expecting_value {
                    values.push(Literal::Empty);
                }
                expecting_value = true;
            }
            _ if !expecting_value => return Err(LiteralError::Unexpected { ch, at }),
            '\'' | '"' => {
                chars.next();
                values.push(Literal::Str(read_string(&mut chars, ch, at)?));
                expecting_value = false;
            }
            c if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => {
                values.push(read_number(&mut chars)?);
                expecting_value = false;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let ident = read_identifier(&mut chars);
                match ident.as_str() {
                    "null" | "undefined" | "None" => values.push(Literal::Empty),
                    "true" | "True" => values.push(Literal::Str("true".to_string())),
                    "false" | "False" => values.push(Literal::Str("false".to_string())),
                    _ => return Err(LiteralError::Identifier(ident)),
                }
                expecting_value = false;
            }
            _ => return Err(LiteralError::Unexpected { ch, at }),
        }
    }
}

/// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive
fn in_i64_range(v: f64) -> bool {
    v >= i64::MIN as f64 && v < i64::MAX as f64
}

fn skip_whitespace(chars: &mut Peekable<CharIndices<'_>>) {
    while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
}

fn read_string(
    chars: &mut Peekable<CharIndices<'_>>,
    quote: char,
    start: usize,
) -> Result<String, LiteralError> {
    let mut out = String::new();

    while let Some((_, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok(out),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'u' => out.push(read_unicode_escape(chars)),
                    other => out.push(other),
                }
            }
            c => out.push(c),
        }
    }

    Err(LiteralError::UnterminatedString(start))
}

/// Reads the four hex digits of a `\uXXXX` escape; malformed escapes decode to U+FFFD
fn read_unicode_escape(chars: &mut Peekable<CharIndices<'_>>) -> char {
    let mut code = 0u32;
    for _ in 0..4 {
        match chars.next_if(|(_, c)| c.is_ascii_hexdigit()) {
            Some((_, c)) => code = code * 16 + c.to_digit(16).unwrap_or(0),
            None => return char::REPLACEMENT_CHARACTER,
        }
    }
    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn read_number(chars: &mut Peekable<CharIndices<'_>>) -> Result<Literal, LiteralError> {
    let mut raw = String::new();
    while let Some((_, c)) =
        chars.next_if(|(_, c)| c.is_ascii_digit() || matches!(*c, '.' | 'e' | 'E' | '+' | '-'))
    {
        raw.push(c);
    }

    let is_float = raw.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(v) = raw.parse::<i64>() {
            return Ok(Literal::Int(v));
        }
    }

    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Literal::Float(v)),
        _ => Err(LiteralError::InvalidNumber(raw)),
    }
}

fn read_identifier(chars: &mut Peekable<CharIndices<'_>>) -> String {
    let mut ident = String::new();
    while let Some((_, c)) = chars.next_if(|(_, c)| c.is_ascii_alphanumeric() || *c == '_') {
        ident.push(c);
    }
    ident
}
