//! Natural-language query interpretation.
//!
//! Two independent single-turn Gemini completions translate a user
//! question into (a) a structured metadata filter and (b) a short
//! semantic search phrase. The calls share no state and there is no
//! retry: a response that is not valid JSON (for the filter) propagates
//! as an error to the caller.
//!
//! The "current date" anchor used to resolve relative time expressions
//! ("last year", "this month") is an injected [`NaiveDate`], never a
//! string baked into the instructions, so behavior is reproducible in
//! tests and stable across days.

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::InterpretedQuery;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Metadata fields the filter grammar may reference.
pub const FILTER_FIELDS: [&str; 5] = [
    "published_year",
    "published_month",
    "published_day",
    "author",
    "tags",
];

/// Operators the filter grammar may use inside a constraint object.
pub const FILTER_OPERATORS: [&str; 3] = ["$in", "$gte", "$lt"];

/// Resolve the date anchor: explicit override, then config, then today (UTC).
pub fn resolve_reference_date(config: &LlmConfig, cli_override: Option<&str>) -> Result<NaiveDate> {
    let raw = cli_override.or(config.reference_date.as_deref());
    match raw {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid reference date '{}', expected YYYY-MM-DD", s)),
        None => Ok(Utc::now().date_naive()),
    }
}

/// Interpret a user question into a metadata filter and a semantic phrase.
///
/// Runs filter extraction and semantic extraction as two independent
/// completions (no data dependency between them), parses and validates
/// the filter, and strips the quoting from the phrase.
pub async fn interpret(
    config: &LlmConfig,
    user_text: &str,
    reference_date: NaiveDate,
) -> Result<InterpretedQuery> {
    let filter = extract_filter(config, user_text, reference_date).await?;
    let semantic_query = extract_semantic(config, user_text).await?;
    Ok(InterpretedQuery {
        filter,
        semantic_query,
    })
}

/// Filter extraction: user text → metadata filter JSON.
///
/// The model is instructed to emit only JSON. A surrounding markdown
/// code fence is tolerated and stripped; anything else that fails to
/// parse as JSON is a fatal error. The parsed filter is validated
/// against the schema before being returned.
pub async fn extract_filter(
    config: &LlmConfig,
    user_text: &str,
    reference_date: NaiveDate,
) -> Result<serde_json::Value> {
    let instructions = filter_instructions(reference_date);
    let text = generate(config, &instructions, user_text).await?;
    let cleaned = strip_code_fence(text.trim());

    let filter: serde_json::Value = serde_json::from_str(cleaned)
        .with_context(|| format!("Filter response was not valid JSON: {}", cleaned))?;
    validate_filter(&filter)?;
    Ok(filter)
}

/// Semantic extraction: user text → short search phrase.
///
/// The model returns a quoted phrase; surrounding quotes are stripped
/// and no further validation is performed.
pub async fn extract_semantic(config: &LlmConfig, user_text: &str) -> Result<String> {
    let text = generate(config, semantic_instructions(), user_text).await?;
    Ok(strip_quotes(text.trim()).to_string())
}

/// Check a filter against the metadata schema and operator grammar.
///
/// A filter is a JSON object mapping schema fields to either a literal
/// (bare equality) or a constraint object using only `$in` (array
/// membership) and `$gte`/`$lt` (numeric range). Anything outside that
/// grammar is rejected before the vector store ever sees it.
pub fn validate_filter(filter: &serde_json::Value) -> Result<()> {
    let object = match filter.as_object() {
        Some(o) => o,
        None => bail!("Filter must be a JSON object, got: {}", filter),
    };

    for (field, value) in object {
        if !FILTER_FIELDS.contains(&field.as_str()) {
            bail!(
                "Filter references unknown field '{}'. Allowed: {}",
                field,
                FILTER_FIELDS.join(", ")
            );
        }

        match value {
            serde_json::Value::String(_) | serde_json::Value::Number(_) => {}
            serde_json::Value::Object(constraint) => {
                if constraint.is_empty() {
                    bail!("Empty constraint object for field '{}'", field);
                }
                for (op, operand) in constraint {
                    match op.as_str() {
                        "$in" => {
                            if !operand.is_array() {
                                bail!("$in operand for '{}' must be an array", field);
                            }
                        }
                        "$gte" | "$lt" => {
                            if !operand.is_number() {
                                bail!("{} operand for '{}' must be a number", op, field);
                            }
                        }
                        other => bail!(
                            "Filter uses unknown operator '{}' on '{}'. Allowed: {}",
                            other,
                            field,
                            FILTER_OPERATORS.join(", ")
                        ),
                    }
                }
            }
            other => bail!(
                "Filter value for '{}' must be a literal or constraint object, got: {}",
                field,
                other
            ),
        }
    }

    Ok(())
}

fn filter_instructions(reference_date: NaiveDate) -> String {
    let year = reference_date.year();
    format!(
        r#"You are a natural-language to vector-database query agent. Convert user
queries to metadata filters.

SCHEMA:
- published_year: int
- published_month: int
- published_day: int
- author: string
- tags: array

SYNTAX:
- Equality: "field": value
- Arrays: "field": {{"$in": ["value1", "value2"]}}
- Ranges: "field": {{"$gte": start, "$lt": end}}

CURRENT DATE: {date}

PARSING:
- "last year" = published_year: {last_year}
- "this year" = published_year: {year}
- "June 2023" = published_year: 2023, published_month: 6
- Month names: January=1, February=2, March=3, April=4, May=5, June=6,
  July=7, August=8, September=9, October=10, November=11, December=12

EXAMPLES:

Input: "Show me articles by Alice Zhang from last year about machine learning"
Output:
{{
 "author": "Alice Zhang",
 "published_year": {last_year},
 "tags": {{"$in": ["machine learning"]}}
}}

Input: "Find posts tagged with 'LLMs' published in June, 2023"
Output:
{{
 "tags": {{"$in": ["LLMs"]}},
 "published_year": 2023,
 "published_month": 6
}}

Input: "Anything by John Doe on vector search?"
Output:
{{
 "author": "John Doe",
 "tags": {{"$in": ["vector search"]}}
}}

The user input may come from any topic or field; these are only examples.
Return only JSON. No markdown. No explanations."#,
        date = reference_date.format("%B %-d, %Y"),
        year = year,
        last_year = year - 1,
    )
}

fn semantic_instructions() -> &'static str {
    r#"You are a semantic query extractor for a vector search system.

Your only task is to extract the core topic or subject from a user's
natural-language query. This phrase will be used for vector similarity
search.

Instructions:
- Ignore metadata like author names, publication dates, or tags unless
  they are part of the actual search topic.
- Focus only on the main idea the user wants content about.
- Output a concise search phrase (ideally 3 to 7 words).
- Only return a quoted string with the semantic query.
- Do not return anything else: no explanations, no formatting.

Examples:

User Input: "Show me articles by Alice Zhang from last year about machine learning"
Output: "machine learning articles"

User Input: "Find posts tagged with 'LLMs' published in June, 2023."
Output: "LLM posts"

User Input: "Anything by John Doe on vector search?"
Output: "vector search content"

User Input: "I want research on retrieval-augmented generation."
Output: "retrieval-augmented generation research"

The user input may come from any topic or field; these are only examples.
Only return a quoted string."#
}

/// Strip a surrounding markdown code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the optional language tag on the opening fence line.
    let rest = match rest.split_once('\n') {
        Some((_lang, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").map(str::trim).unwrap_or(text)
}

/// Strip one pair of surrounding double quotes, if present.
fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(text)
}

// ============ Gemini generateContent ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

/// One blocking completion round trip: (system instructions, user text) → text.
async fn generate(config: &LlmConfig, instructions: &str, user_text: &str) -> Result<String> {
    let api_key =
        std::env::var("GEMINI_API_KEY").map_err(|_| anyhow::anyhow!("GEMINI_API_KEY not set"))?;

    let base = config.base_url.as_deref().unwrap_or(GEMINI_BASE_URL);
    let url = format!(
        "{}/models/{}:generateContent?key={}",
        base, config.model, api_key
    );

    let body = GenerateRequest {
        system_instruction: Content {
            parts: vec![Part {
                text: instructions.to_string(),
            }],
        },
        contents: vec![Content {
            parts: vec![Part {
                text: user_text.to_string(),
            }],
        }],
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let response = client.post(&url).json(&body).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Gemini completion API error {}: {}", status, body_text);
    }

    let parsed: GenerateResponse = response
        .json()
        .await
        .context("Invalid Gemini completion response")?;

    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or_else(|| anyhow::anyhow!("Gemini completion returned no candidates"))?;

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> LlmConfig {
        LlmConfig {
            model: "gemini-2.5-flash".to_string(),
            timeout_secs: 5,
            reference_date: None,
            base_url: Some(base_url.to_string()),
        }
    }

    fn completion(text: &str) -> serde_json::Value {
        json!({
            "candidates": [
                { "content": { "parts": [{ "text": text }] } }
            ]
        })
    }

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 31).unwrap()
    }

    // --- filter grammar ---

    #[test]
    fn canonical_filter_validates() {
        let filter = json!({
            "author": "Alice Zhang",
            "published_year": 2024,
            "tags": {"$in": ["machine learning"]}
        });
        validate_filter(&filter).unwrap();
    }

    #[test]
    fn range_constraint_validates() {
        let filter = json!({"published_month": {"$gte": 6, "$lt": 9}});
        validate_filter(&filter).unwrap();
    }

    #[test]
    fn empty_filter_validates() {
        validate_filter(&json!({})).unwrap();
    }

    #[test]
    fn unknown_field_rejected() {
        let err = validate_filter(&json!({"category": "sports"})).unwrap_err();
        assert!(err.to_string().contains("unknown field 'category'"));
    }

    #[test]
    fn unknown_operator_rejected() {
        let err = validate_filter(&json!({"published_year": {"$eq": 2024}})).unwrap_err();
        assert!(err.to_string().contains("unknown operator '$eq'"));
    }

    #[test]
    fn in_requires_array() {
        assert!(validate_filter(&json!({"tags": {"$in": "ml"}})).is_err());
    }

    #[test]
    fn range_requires_numbers() {
        assert!(validate_filter(&json!({"published_year": {"$gte": "2024"}})).is_err());
    }

    #[test]
    fn non_object_filter_rejected() {
        assert!(validate_filter(&json!(["author"])).is_err());
        assert!(validate_filter(&json!("author")).is_err());
    }

    #[test]
    fn array_literal_value_rejected() {
        // Bare arrays are not part of the grammar; membership goes through $in.
        assert!(validate_filter(&json!({"tags": ["ml"]})).is_err());
    }

    // --- text cleanup ---

    #[test]
    fn code_fence_is_stripped() {
        let fenced = "```json\n{\"author\": \"Jane\"}\n```";
        assert_eq!(strip_code_fence(fenced).trim(), "{\"author\": \"Jane\"}");
        assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn quotes_are_stripped_once() {
        assert_eq!(strip_quotes("\"machine learning articles\""), "machine learning articles");
        assert_eq!(strip_quotes("no quotes"), "no quotes");
        assert_eq!(strip_quotes("\"unbalanced"), "\"unbalanced");
    }

    // --- instructions ---

    #[test]
    fn instructions_carry_the_injected_anchor() {
        let text = filter_instructions(anchor());
        assert!(text.contains("CURRENT DATE: May 31, 2025"));
        assert!(text.contains("\"last year\" = published_year: 2024"));
        assert!(text.contains("\"this year\" = published_year: 2025"));
    }

    #[test]
    fn reference_date_prefers_cli_then_config() {
        let mut config = test_config("http://unused");
        config.reference_date = Some("2025-05-31".to_string());
        let date = resolve_reference_date(&config, Some("2024-01-01")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        let date = resolve_reference_date(&config, None).unwrap();
        assert_eq!(date, anchor());

        assert!(resolve_reference_date(&config, Some("garbage")).is_err());
    }

    // --- completions against a mock server ---

    #[tokio::test]
    async fn extract_filter_parses_and_validates() {
        let server = MockServer::start().await;
        std::env::set_var("GEMINI_API_KEY", "test-key");

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(body_string_contains("CURRENT DATE: May 31, 2025"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "{\"author\": \"Alice Zhang\", \"published_year\": 2024, \"tags\": {\"$in\": [\"machine learning\"]}}",
            )))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let filter = extract_filter(
            &config,
            "Show me articles by Alice Zhang from last year about machine learning",
            anchor(),
        )
        .await
        .unwrap();

        assert_eq!(filter["author"], "Alice Zhang");
        assert_eq!(filter["published_year"], 2024);
        assert_eq!(filter["tags"]["$in"][0], "machine learning");
    }

    #[tokio::test]
    async fn fenced_filter_response_is_accepted() {
        let server = MockServer::start().await;
        std::env::set_var("GEMINI_API_KEY", "test-key");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "```json\n{\"author\": \"Jane Doe\"}\n```",
            )))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let filter = extract_filter(&config, "anything by Jane Doe", anchor())
            .await
            .unwrap();
        assert_eq!(filter["author"], "Jane Doe");
    }

    #[tokio::test]
    async fn prose_filter_response_is_a_parse_error() {
        let server = MockServer::start().await;
        std::env::set_var("GEMINI_API_KEY", "test-key");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "Sure! Here is the filter you asked for.",
            )))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let err = extract_filter(&config, "anything", anchor()).await.unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn out_of_schema_filter_response_is_rejected() {
        let server = MockServer::start().await;
        std::env::set_var("GEMINI_API_KEY", "test-key");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "{\"publisher\": \"x\"}",
            )))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let err = extract_filter(&config, "anything", anchor()).await.unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[tokio::test]
    async fn extract_semantic_strips_quotes() {
        let server = MockServer::start().await;
        std::env::set_var("GEMINI_API_KEY", "test-key");

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("\"machine learning articles\"\n")),
            )
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let phrase = extract_semantic(
            &config,
            "Show me articles by Alice Zhang from last year about machine learning",
        )
        .await
        .unwrap();
        assert_eq!(phrase, "machine learning articles");
    }

    #[tokio::test]
    async fn completion_error_status_propagates() {
        let server = MockServer::start().await;
        std::env::set_var("GEMINI_API_KEY", "test-key");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let err = extract_semantic(&config, "anything").await.unwrap_err();
        assert!(err.to_string().contains("Gemini completion API error"));
    }
}
