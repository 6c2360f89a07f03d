//! Template compilation for recorded commands.
//!
//! A raw template token is either a literal, a whole-argument placeholder
//! (`{name}`), or a literal with one embedded placeholder (`--grep={term}`).
//! `{{` and `}}` stand for literal braces.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{MockError, Result};

/// Placeholder name to captured value, produced per successful match.
pub type Binding = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Standalone {
        name: String,
    },
    Embedded {
        prefix: String,
        name: String,
        suffix: String,
    },
}

impl Token {
    pub fn placeholder(&self) -> Option<&str> {
        match self {
            Token::Literal(_) => None,
            Token::Standalone { name } | Token::Embedded { name, .. } => Some(name.as_str()),
        }
    }
}

/// A compiled command pattern plus the raw tokens it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    tokens: Vec<Token>,
    raw: Vec<String>,
}

impl Template {
    /// Compile raw template tokens.
    pub fn compile<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        let tokens = raw
            .iter()
            .map(|token| compile_token(token.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            tokens,
            raw: raw.iter().map(|token| token.as_ref().to_string()).collect(),
        })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Placeholder names in first-use order, without repeats.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.tokens.iter().filter_map(Token::placeholder) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Produce the concrete argv for `values`.
    pub fn substitute(&self, values: &Binding) -> Result<Vec<String>> {
        self.tokens
            .iter()
            .map(|token| match token {
                Token::Literal(text) => Ok(text.clone()),
                Token::Standalone { name } => lookup(values, name).map(str::to_string),
                Token::Embedded {
                    prefix,
                    name,
                    suffix,
                } => Ok(format!("{prefix}{}{suffix}", lookup(values, name)?)),
            })
            .collect()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::util::format_command_line(&self.raw))
    }
}

fn lookup<'a>(values: &'a Binding, name: &str) -> Result<&'a str> {
    values
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| MockError::UnboundPlaceholder {
            name: name.to_string(),
        })
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

fn compile_token(token: &str) -> Result<Token> {
    let mut literal = String::new();
    let mut marker: Option<(String, String)> = None;
    let mut chars = token.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(MockError::syntax(token, "unbalanced '}'")),
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    match inner {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(MockError::syntax(token, "nested '{'")),
                        other => name.push(other),
                    }
                }
                if !closed {
                    return Err(MockError::syntax(token, "unbalanced '{'"));
                }
                if name.is_empty() {
                    return Err(MockError::syntax(token, "empty placeholder name"));
                }
                if !identifier_re().is_match(&name) {
                    return Err(MockError::syntax(
                        token,
                        format!("placeholder name {name:?} is not an identifier"),
                    ));
                }
                if marker.is_some() {
                    return Err(MockError::syntax(
                        token,
                        "more than one placeholder in a single argument",
                    ));
                }
                marker = Some((std::mem::take(&mut literal), name));
            }
            other => literal.push(other),
        }
    }

    Ok(match marker {
        None => Token::Literal(literal),
        Some((prefix, name)) if prefix.is_empty() && literal.is_empty() => {
            Token::Standalone { name }
        }
        Some((prefix, name)) => Token::Embedded {
            prefix,
            name,
            suffix: literal,
        },
    })
}
