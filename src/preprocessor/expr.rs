use std::ops::Not;
use std::sync::OnceLock;

use regex::Regex;

/// The value of a preprocessor condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    /// Whether the value is known.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl From<bool> for Truth {
    fn from(value: bool) -> Self {
        match value {
            true => Self::True,
            false => Self::False,
        }
    }
}

impl Not for Truth {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Number(&'a str),
    Not,
    And,
    Or,
    Open,
    Close,
    Other,
}

fn tokenize(expression: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = expression.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        let c = bytes[index];
        let start = index;
        index += 1;

        let token = match c {
            b' ' | b'\t' => continue,
            b'(' => Token::Open,
            b')' => Token::Close,
            b'!' if bytes.get(index) != Some(&b'=') => Token::Not,
            b'&' if bytes.get(index) == Some(&b'&') => {
                index += 1;
                Token::And
            }
            b'|' if bytes.get(index) == Some(&b'|') => {
                index += 1;
                Token::Or
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while bytes
                    .get(index)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
                {
                    index += 1;
                }
                Token::Ident(&expression[start..index])
            }
            c if c.is_ascii_digit() => {
                while bytes.get(index).is_some_and(|c| c.is_ascii_alphanumeric()) {
                    index += 1;
                }
                Token::Number(&expression[start..index])
            }
            _ => Token::Other,
        };

        tokens.push(token);
    }

    tokens
}

fn vendor_idiom_regex() -> &'static Regex {
    static VENDOR_IDIOM_REGEX: OnceLock<Regex> = OnceLock::new();
    VENDOR_IDIOM_REGEX.get_or_init(|| {
        Regex::new(
            r"^\(?\s*defined\s*\(\s*(PROP[A-Za-z0-9_]*)\s*\)\s*\|\|\s*!\s*defined\s*\(\s*OPTIMIZER_ENABLED\s*\)\s*\)?$",
        )
        .expect("Invalid vendor idiom regex")
    })
}

/// Match `defined(PROPx) || !defined(OPTIMIZER_ENABLED)`, returning `PROPx`.
pub fn vendor_idiom_define(expression: &str) -> Option<&str> {
    vendor_idiom_regex()
        .captures(expression.trim())
        .and_then(|captures| captures.get(1))
        .map(|define| define.as_str())
}

/// Evaluate a flat `defined(...)` expression.
///
/// Terms at one nesting level must be joined only by `&&` or only by `||`, anything
/// else, including any token other than `defined`, `!`, parentheses and integer
/// literals, makes the whole expression [`Truth::Unknown`].
pub fn evaluate(expression: &str, lookup: impl Fn(&str) -> Truth) -> Truth {
    let tokens = tokenize(expression);
    let mut parser = Parser {
        tokens: &tokens,
        position: 0,
        lookup: &lookup,
    };

    match parser.sequence() {
        Some(truth) if parser.position == tokens.len() => truth,
        _ => Truth::Unknown,
    }
}

struct Parser<'t, 'a, F> {
    tokens: &'t [Token<'a>],
    position: usize,
    lookup: &'t F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joiner {
    None,
    And,
    Or,
    Mixed,
}

impl<'a, F: Fn(&str) -> Truth> Parser<'_, 'a, F> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        self.position += 1;
        token
    }

    /// Parse terms joined by `&&`/`||` until a closing parenthesis or the end.
    fn sequence(&mut self) -> Option<Truth> {
        let mut terms = vec![self.unary()?];
        let mut joiner = Joiner::None;

        loop {
            let next = match self.peek() {
                Some(Token::And) => Joiner::And,
                Some(Token::Or) => Joiner::Or,
                _ => break,
            };
            self.position += 1;

            joiner = match joiner {
                Joiner::None => next,
                current if current == next => current,
                _ => Joiner::Mixed,
            };
            terms.push(self.unary()?);
        }

        Some(match joiner {
            Joiner::None => terms[0],
            Joiner::Mixed => Truth::Unknown,
            Joiner::And => {
                if terms.contains(&Truth::False) {
                    Truth::False
                } else if terms.iter().all(|term| *term == Truth::True) {
                    Truth::True
                } else {
                    Truth::Unknown
                }
            }
            Joiner::Or => {
                if terms.contains(&Truth::True) {
                    Truth::True
                } else if terms.iter().all(|term| *term == Truth::False) {
                    Truth::False
                } else {
                    Truth::Unknown
                }
            }
        })
    }

    fn unary(&mut self) -> Option<Truth> {
        match self.advance()? {
            Token::Not => self.unary().map(Not::not),
            Token::Open => {
                let inner = self.sequence()?;
                match self.advance()? {
                    Token::Close => Some(inner),
                    _ => None,
                }
            }
            Token::Ident("defined") => match self.advance()? {
                Token::Ident(name) => Some((self.lookup)(name)),
                Token::Open => {
                    let Token::Ident(name) = self.advance()? else {
                        return None;
                    };
                    let truth = (self.lookup)(name);
                    match self.advance()? {
                        Token::Close => Some(truth),
                        _ => None,
                    }
                }
                _ => None,
            },
            Token::Number(number) => match number.parse::<i64>() {
                Ok(0) => Some(Truth::False),
                Ok(_) => Some(Truth::True),
                Err(_) => None,
            },
            _ => None,
        }
    }
}
