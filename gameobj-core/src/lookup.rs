//! Resolve script queries to a single entity.
//!
//! Candidates arrive already flattened in registry priority order, so "first
//! registry with a hit wins" reduces to "first candidate with a hit wins".

use crate::entity::Entity;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use thiserror::Error;

lazy_static! {
    static ref INTEGER_ID: Regex = Regex::new(r"^-?[0-9]+$").unwrap();
}

/// Errors from interpreting a lookup request.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Unsupported lookup query: {0}")]
    UnsupportedQuery(String),
}

/// What a script asked for.
#[derive(Debug, Clone)]
pub enum Query {
    /// An id, a noun, or a name, depending on shape.
    Text(String),
    /// A pattern applied to names.
    Pattern(Regex),
    /// A bare integer; treated as its decimal text with a usage warning.
    Integer(i64),
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::Text(text.to_string())
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Query::Text(text)
    }
}

impl From<&String> for Query {
    fn from(text: &String) -> Self {
        Query::Text(text.clone())
    }
}

impl From<Regex> for Query {
    fn from(pattern: Regex) -> Self {
        Query::Pattern(pattern)
    }
}

impl From<i64> for Query {
    fn from(n: i64) -> Self {
        Query::Integer(n)
    }
}

impl From<i32> for Query {
    fn from(n: i32) -> Self {
        Query::Integer(n.into())
    }
}

impl From<u32> for Query {
    fn from(n: u32) -> Self {
        Query::Integer(n.into())
    }
}

impl TryFrom<&Value> for Query {
    type Error = LookupError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(Query::Text(text.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(Query::Integer)
                .ok_or_else(|| LookupError::UnsupportedQuery(value.to_string())),
            other => Err(LookupError::UnsupportedQuery(other.to_string())),
        }
    }
}

/// A text query after classification by shape.
#[derive(Debug)]
enum TextQuery<'q> {
    Id(&'q str),
    Noun(&'q str),
    /// Pattern tiers whose regex could not be built are skipped.
    Name {
        exact: &'q str,
        suffix: Option<Regex>,
        fuzzy: Option<Regex>,
    },
}

impl<'q> TextQuery<'q> {
    fn parse(text: &'q str) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        if INTEGER_ID.is_match(text) {
            return Some(TextQuery::Id(text));
        }
        let mut tokens = text.split_whitespace();
        if let (Some(word), None) = (tokens.next(), tokens.next()) {
            return Some(TextQuery::Noun(word));
        }
        Some(TextQuery::Name {
            exact: text,
            suffix: suffix_pattern(text),
            fuzzy: fuzzy_suffix_pattern(text),
        })
    }
}

/// `\b<query>$`, case-insensitive.
fn suffix_pattern(text: &str) -> Option<Regex> {
    build_anchored(&regex::escape(text.trim()))
}

/// Like [`suffix_pattern`], but each whitespace gap may swallow extra words.
fn fuzzy_suffix_pattern(text: &str) -> Option<Regex> {
    let body = text
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(" .*");
    build_anchored(&body)
}

fn build_anchored(body: &str) -> Option<Regex> {
    RegexBuilder::new(&format!(r"\b{}$", body))
        .case_insensitive(true)
        .build()
        .map_err(|e| tracing::warn!("Could not build lookup pattern: {}", e))
        .ok()
}

/// Find the first candidate matching `query`.
pub fn resolve<'a>(candidates: &[&'a Entity], query: &Query) -> Option<&'a Entity> {
    match query {
        Query::Text(text) => resolve_text(candidates, text),
        Query::Pattern(pattern) => first(candidates, |e| {
            e.name.as_deref().is_some_and(|name| pattern.is_match(name))
        }),
        Query::Integer(n) => {
            tracing::warn!(
                "Lookup called with integer {}; pass the id as a string instead",
                n
            );
            resolve_text(candidates, &n.to_string())
        }
    }
}

fn resolve_text<'a>(candidates: &[&'a Entity], text: &str) -> Option<&'a Entity> {
    match TextQuery::parse(text)? {
        TextQuery::Id(id) => first(candidates, |e| e.id == id),
        TextQuery::Noun(noun) => first(candidates, |e| e.noun.as_deref() == Some(noun)),
        TextQuery::Name {
            exact,
            suffix,
            fuzzy,
        } => first(candidates, |e| e.name.as_deref() == Some(exact))
            .or_else(|| first_by_name(candidates, suffix.as_ref()))
            .or_else(|| first_by_name(candidates, fuzzy.as_ref())),
    }
}

fn first_by_name<'a>(candidates: &[&'a Entity], pattern: Option<&Regex>) -> Option<&'a Entity> {
    let pattern = pattern?;
    first(candidates, |e| name_matches(e, pattern))
}

fn name_matches(entity: &Entity, pattern: &Regex) -> bool {
    entity.name.as_deref().is_some_and(|name| pattern.is_match(name))
}

fn first<'a>(candidates: &[&'a Entity], pred: impl Fn(&Entity) -> bool) -> Option<&'a Entity> {
    candidates.iter().copied().find(|e| pred(e))
}
