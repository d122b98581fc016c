//! Post-classification entry filter
//!
//! Expressions are disjunctions of conjunctions over entry keys:
//!
//! ```text
//! type != 'ignored' && devicetree_node ~= '/soc' || type == error
//! ```
//!
//! `==` and `!=` compare whole values, `~=` and `!~` test containment. A key
//! the entry does not carry never equals nor contains anything.

use crate::classification::entry::DiagnosticEntry;
use sr_config::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Contains,
    NotContains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub key: String,
    pub op: FilterOp,
    pub value: String,
}

impl Condition {
    fn holds(&self, entry: &DiagnosticEntry) -> bool {
        let actual = entry.get(&self.key);
        match (self.op, actual) {
            (FilterOp::Eq, Some(v)) => v == self.value,
            (FilterOp::Ne, Some(v)) => v != self.value,
            (FilterOp::Contains, Some(v)) => v.contains(self.value.as_str()),
            (FilterOp::NotContains, Some(v)) => !v.contains(self.value.as_str()),
            (FilterOp::Eq | FilterOp::Contains, None) => false,
            (FilterOp::Ne | FilterOp::NotContains, None) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    expression: String,
    any_of: Vec<Vec<Condition>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Op(FilterOp),
    And,
    Or,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let two: String = chars.clone().take(2).collect();
        let symbol = match two.as_str() {
            "==" => Some(Token::Op(FilterOp::Eq)),
            "!=" => Some(Token::Op(FilterOp::Ne)),
            "~=" => Some(Token::Op(FilterOp::Contains)),
            "!~" => Some(Token::Op(FilterOp::NotContains)),
            "&&" => Some(Token::And),
            "||" => Some(Token::Or),
            _ => None,
        };
        if let Some(token) = symbol {
            chars.next();
            chars.next();
            tokens.push(token);
            continue;
        }

        if c == '\'' || c == '"' {
            chars.next();
            let mut word = String::new();
            loop {
                match chars.next() {
                    Some(q) if q == c => break,
                    Some(other) => word.push(other),
                    None => return Err(format!("unterminated string starting with {}", c)),
                }
            }
            tokens.push(Token::Word(word));
            continue;
        }

        let mut word = String::new();
        while let Some(&w) = chars.peek() {
            if w.is_whitespace() || "=!~&|".contains(w) {
                break;
            }
            word.push(w);
            chars.next();
        }
        if word.is_empty() {
            return Err(format!("unexpected character '{}'", c));
        }
        tokens.push(Token::Word(word));
    }
    Ok(tokens)
}

fn parse_tokens(tokens: Vec<Token>) -> Result<Vec<Vec<Condition>>, String> {
    let mut any_of = Vec::new();
    let mut all_of = Vec::new();
    let mut iter = tokens.into_iter();

    loop {
        let key = match iter.next() {
            Some(Token::Word(key)) => key,
            Some(other) => return Err(format!("expected a key, got {:?}", other)),
            None => return Err("expected a key at end of expression".to_string()),
        };
        let op = match iter.next() {
            Some(Token::Op(op)) => op,
            _ => return Err(format!("expected an operator after '{}'", key)),
        };
        let value = match iter.next() {
            Some(Token::Word(value)) => value,
            _ => return Err(format!("expected a value after '{}'", key)),
        };
        all_of.push(Condition { key, op, value });

        match iter.next() {
            None => break,
            Some(Token::And) => {}
            Some(Token::Or) => any_of.push(std::mem::take(&mut all_of)),
            Some(other) => return Err(format!("expected && or ||, got {:?}", other)),
        }
    }
    any_of.push(all_of);
    Ok(any_of)
}

impl EntryFilter {
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidFilter {
            expression: expression.to_string(),
            reason,
        };
        let tokens = tokenize(expression).map_err(invalid)?;
        let any_of = parse_tokens(tokens).map_err(invalid)?;
        Ok(Self {
            expression: expression.to_string(),
            any_of,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn matches(&self, entry: &DiagnosticEntry) -> bool {
        self.any_of
            .iter()
            .any(|all_of| all_of.iter().all(|c| c.holds(entry)))
    }

    pub fn apply(&self, entries: Vec<DiagnosticEntry>) -> Vec<DiagnosticEntry> {
        entries.into_iter().filter(|e| self.matches(e)).collect()
    }
}
