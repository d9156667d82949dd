//! Naming/path templates.
//!
//! ```text
//! sub-<subject.code>[_ses-<session.label>]_{file.info.BIDS.Modality}{ext}
//!     └─ label ──────┘└─ optional ─────────┘ └─ raw ─────────────────┘└raw┘
//! ```
//!
//! `<path>` inserts the value formatted as a naming label (lowercase ASCII
//! alphanumerics), `{path}` inserts it verbatim, and `[...]` drops entirely
//! when any placeholder inside it resolves to nothing.

use curate_protocol::{value_as_text, ContextLookup};

use crate::error::{Result, TemplateError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Label(String),
    Raw(String),
    Optional(Vec<Token>),
}

/// A parsed template, ready to render against any context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    tokens: Vec<Token>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self {
            source: source.to_string(),
            tokens: parse_tokens(source)?,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Renders the template. Unresolved required placeholders become empty
    /// text; unresolved placeholders inside `[...]` drop the whole segment.
    #[must_use]
    pub fn render(&self, context: &impl ContextLookup) -> String {
        let mut out = String::new();
        render_tokens(&self.tokens, context, &mut out);
        out
    }
}

/// Parses and renders in one step; fails only on template syntax.
pub fn render(template: &str, context: &impl ContextLookup) -> Result<String> {
    Template::parse(template).map(|t| t.render(context))
}

/// Lowercases and strips everything but ASCII letters and digits.
#[must_use]
pub fn format_label(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn parse_tokens(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut optional: Option<Vec<Token>> = None;
    let mut literal = String::new();
    let mut chars = source.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '<' | '{' => {
                let close = if ch == '<' { '>' } else { '}' };
                let path = read_placeholder(source, &mut chars, ch, close)?;
                let target = match optional.as_mut() {
                    Some(inner) => inner,
                    None => &mut tokens,
                };
                flush_literal(&mut literal, target);
                target.push(if ch == '<' {
                    Token::Label(path)
                } else {
                    Token::Raw(path)
                });
            }
            '[' => {
                if optional.is_some() {
                    return Err(TemplateError::syntax(
                        source,
                        "nested '[' inside optional segment",
                    ));
                }
                flush_literal(&mut literal, &mut tokens);
                optional = Some(Vec::new());
            }
            ']' if optional.is_some() => {
                if let Some(mut inner) = optional.take() {
                    flush_literal(&mut literal, &mut inner);
                    tokens.push(Token::Optional(inner));
                }
            }
            other => literal.push(other),
        }
    }

    if optional.is_some() {
        return Err(TemplateError::syntax(
            source,
            "unterminated '[...]' optional segment",
        ));
    }
    flush_literal(&mut literal, &mut tokens);
    Ok(tokens)
}

fn read_placeholder(
    source: &str,
    chars: &mut std::str::Chars<'_>,
    open: char,
    close: char,
) -> Result<String> {
    let mut path = String::new();
    loop {
        match chars.next() {
            Some(c) if c == close => break,
            Some(c @ ('<' | '{' | '[' | ']')) => {
                return Err(TemplateError::syntax(
                    source,
                    format!("unexpected '{c}' inside '{open}...{close}' placeholder"),
                ));
            }
            Some(c) => path.push(c),
            None => {
                return Err(TemplateError::syntax(
                    source,
                    format!("unterminated '{open}...{close}' placeholder"),
                ));
            }
        }
    }

    let path = path.trim();
    if path.is_empty() {
        return Err(TemplateError::syntax(
            source,
            format!("empty placeholder '{open}{close}'"),
        ));
    }
    Ok(path.to_string())
}

fn flush_literal(literal: &mut String, target: &mut Vec<Token>) {
    if !literal.is_empty() {
        target.push(Token::Literal(std::mem::take(literal)));
    }
}

/// Appends the rendering of `tokens`; returns whether every placeholder resolved.
fn render_tokens(tokens: &[Token], context: &impl ContextLookup, out: &mut String) -> bool {
    let mut complete = true;
    for token in tokens {
        match token {
            Token::Literal(text) => out.push_str(text),
            Token::Label(path) | Token::Raw(path) => {
                match resolve(token, path, context) {
                    Some(value) => out.push_str(&value),
                    None => {
                        log::debug!("template placeholder '{path}' resolved to nothing");
                        complete = false;
                    }
                }
            }
            Token::Optional(inner) => {
                let mut segment = String::new();
                if render_tokens(inner, context, &mut segment) {
                    out.push_str(&segment);
                }
            }
        }
    }
    complete
}

fn resolve(token: &Token, path: &str, context: &impl ContextLookup) -> Option<String> {
    let text = context.lookup(path).as_ref().and_then(value_as_text)?;
    let text = match token {
        Token::Label(_) => format_label(&text),
        _ => text,
    };
    (!text.is_empty()).then_some(text)
}
