//! Row normalization for CSV ingestion.
//!
//! Reads the article CSV (`pageURL,title,publishedDate,author,tags`) and
//! produces [`ArticleRecord`]s. The `tags` column holds a string-encoded
//! list literal (e.g. `['machine learning', 'ai']`); a malformed literal
//! is a fatal error for the run. No deduplication happens here — later
//! rows with the same id simply overwrite at upsert time.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::models::ArticleRecord;

/// One raw CSV row, column names as they appear in the source file.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "pageURL")]
    page_url: String,
    title: String,
    #[serde(rename = "publishedDate")]
    published_date: String,
    author: String,
    tags: String,
}

/// Read and normalize every row of the article CSV.
///
/// Fails on I/O errors, missing columns, or a tags literal that does not
/// parse. Row order is preserved.
pub fn read_articles(path: &Path) -> Result<Vec<ArticleRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.with_context(|| format!("Failed to parse CSV row {}", i + 1))?;
        let tags = parse_tags_literal(row.tags.trim())
            .with_context(|| format!("Invalid tags literal on row {} ({})", i + 1, row.page_url))?;
        records.push(ArticleRecord {
            id: row.page_url,
            title: row.title,
            published_date: row.published_date,
            author: row.author,
            tags,
        });
    }

    Ok(records)
}

/// Parse a Python-style list literal of strings.
///
/// Accepts single- or double-quoted elements with backslash escapes,
/// e.g. `['machine learning', "ai"]`. The empty list `[]` is valid.
pub fn parse_tags_literal(raw: &str) -> Result<Vec<String>> {
    let inner = raw
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| anyhow::anyhow!("expected a bracketed list, got '{}'", raw))?;

    let mut tags = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        // Skip whitespace and element separators
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let quote = match chars.next() {
            None => break,
            Some(c @ ('\'' | '"')) => c,
            Some(c) => bail!("expected quoted element, found '{}'", c),
        };

        let mut element = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => element.push(escaped),
                    None => bail!("dangling escape in tags literal"),
                },
                c if c == quote => {
                    closed = true;
                    break;
                }
                c => element.push(c),
            }
        }
        if !closed {
            bail!("unterminated string in tags literal");
        }
        tags.push(element);
    }

    Ok(tags)
}
