//! Filter drafts, compiled tokens and the active filter set
//!
//! A [`FilterDraft`] is what a user assembles in a filter dialog. Compiling it
//! yields a [`FilterToken`] of the form
//!
//! ```text
//! field=[!][:]<symbol>value
//! ```
//!
//! where `!` negates and `:` makes the match case-insensitive. Tokens are
//! joined into a query fragment by prefixing each with `&`, which the backend
//! reads as a flat conjunction.

use super::operator::Operator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed before every token in a query fragment
pub const TOKEN_SEPARATOR: char = '&';

/// A single filter condition before compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDraft {
    /// Field name, drawn from the entity's allow-list
    pub field: String,
    /// Comparison operator
    pub operator: Operator,
    /// Right-hand value, passed through verbatim
    pub value: String,
    /// Negate the comparison (modifier operators only)
    #[serde(default)]
    pub negate: bool,
    /// Case-insensitive comparison (modifier operators only)
    #[serde(default)]
    pub case_insensitive: bool,
}

impl FilterDraft {
    /// Create a draft without modifiers
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            negate: false,
            case_insensitive: false,
        }
    }

    /// Set the negate flag
    pub fn negated(mut self, negate: bool) -> Self {
        self.negate = negate;
        self
    }

    /// Set the case-insensitive flag
    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    /// Switch operator, clearing modifiers the new operator does not accept
    pub fn set_operator(&mut self, operator: Operator) {
        self.operator = operator;
        if !operator.modifiers() {
            self.negate = false;
            self.case_insensitive = false;
        }
    }

    /// Compile into a wire token
    pub fn compile(&self) -> FilterToken {
        compile(self)
    }

    /// Compile with the value percent-encoded for a query string
    pub fn compile_encoded(&self) -> FilterToken {
        compile_encoded(self)
    }
}

/// Compiled, wire-ready form of one filter condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterToken(String);

impl FilterToken {
    /// Token text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the token text
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for FilterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FilterToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compile a draft into its canonical token
///
/// Modifier characters are emitted only for operators that accept them; the
/// flags on a comparison operator are ignored.
pub fn compile(draft: &FilterDraft) -> FilterToken {
    render(draft, &draft.value)
}

/// Compile a draft with its value percent-encoded
///
/// Values containing `&`, `#` or spaces survive URL parsing intact. The
/// field, modifiers and operator symbol are emitted unchanged.
pub fn compile_encoded(draft: &FilterDraft) -> FilterToken {
    render(draft, &urlencoding::encode(&draft.value))
}

fn render(draft: &FilterDraft, value: &str) -> FilterToken {
    let symbol = draft.operator.symbol();
    let mut out = String::with_capacity(draft.field.len() + value.len() + symbol.len() + 3);

    out.push_str(&draft.field);
    out.push('=');
    if draft.operator.modifiers() {
        if draft.negate {
            out.push('!');
        }
        if draft.case_insensitive {
            out.push(':');
        }
    }
    out.push_str(symbol);
    out.push_str(value);

    FilterToken(out)
}

/// Join tokens into one query fragment, each prefixed with `&`
pub fn join_tokens<'a, I>(tokens: I) -> String
where
    I: IntoIterator<Item = &'a FilterToken>,
{
    let mut fragment = String::new();
    for token in tokens {
        fragment.push(TOKEN_SEPARATOR);
        fragment.push_str(token.as_str());
    }
    fragment
}

/// Ordered list of active filters for one view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    tokens: Vec<FilterToken>,
}

impl FilterSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a draft and append it
    pub fn add(&mut self, draft: &FilterDraft) -> &FilterToken {
        self.tokens.push(compile(draft));
        &self.tokens[self.tokens.len() - 1]
    }

    /// Remove the filter at `index`, returning it if present
    pub fn remove(&mut self, index: usize) -> Option<FilterToken> {
        if index < self.tokens.len() {
            Some(self.tokens.remove(index))
        } else {
            None
        }
    }

    /// Remove every filter
    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Active tokens in insertion order
    pub fn tokens(&self) -> &[FilterToken] {
        &self.tokens
    }

    /// Number of active filters
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True if no filter is active
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Query fragment for all active filters
    pub fn fragment(&self) -> String {
        join_tokens(&self.tokens)
    }
}

impl<'a> FromIterator<&'a FilterDraft> for FilterSet {
    fn from_iter<I: IntoIterator<Item = &'a FilterDraft>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().map(compile).collect(),
        }
    }
}
