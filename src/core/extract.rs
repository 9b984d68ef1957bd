//! Extraction of structured data from collaborator output.
//!
//! Model output is untrusted text. Structured extraction tries candidates in
//! preference order: the whole text as JSON, a fenced JSON block, then the
//! outermost brace slice. Each candidate must parse and validate against the
//! embedded schema before deserializing. Code extraction additionally falls
//! back to fenced code blocks when no candidate survives.

use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::types::TaskAction;

const PLAN_SCHEMA: &str = include_str!("../../schemas/plan_response.schema.json");
const GENERATE_SCHEMA: &str = include_str!("../../schemas/generate_response.schema.json");

static PLAN_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| compile_schema(PLAN_SCHEMA));
static GENERATE_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| compile_schema(GENERATE_SCHEMA));

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("static regex is valid"));
static THINK_EMPTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<think\s*/>").expect("static regex is valid"));
static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("static regex is valid")
});
static FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[a-zA-Z0-9_+-]*\n(.*?)```").expect("static regex is valid")
});
static FUNCTION_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:def|fn)\s+(\w+)\s*[(<]").expect("static regex is valid")
});

fn compile_schema(schema: &str) -> Validator {
    let schema: Value = serde_json::from_str(schema).expect("embedded schema is valid JSON");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("embedded schema compiles")
}

fn default_action() -> TaskAction {
    TaskAction::Append
}

/// Structured planning response.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanResponse {
    pub files: Vec<PlannedFile>,
    #[serde(default)]
    pub tasks: Vec<PlannedTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannedFile {
    pub path: String,
    pub purpose: String,
    #[serde(default)]
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannedTask {
    pub task_id: u32,
    pub target_file: String,
    #[serde(default = "default_action")]
    pub action: TaskAction,
    pub description: String,
}

/// Structured code-generation response.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub code: String,
    #[serde(default)]
    pub test_code: String,
    #[serde(default)]
    pub imports: Vec<String>,
}

/// Remove `<think>...</think>` blocks emitted by reasoning models.
pub fn strip_think_tags(text: &str) -> String {
    let stripped = THINK_BLOCK.replace_all(text, "");
    THINK_EMPTY.replace_all(&stripped, "").trim().to_string()
}

/// Extract a schema-validated plan from raw model output.
pub fn extract_plan(text: &str) -> Option<PlanResponse> {
    extract_structured(text, &PLAN_VALIDATOR)
}

/// Extract a schema-validated generation response from raw model output.
/// `None` sends the caller to the fenced-code-block fallback.
pub fn extract_generated(text: &str) -> Option<GenerateResponse> {
    extract_structured(text, &GENERATE_VALIDATOR)
}

fn extract_structured<T: DeserializeOwned>(text: &str, validator: &Validator) -> Option<T> {
    for candidate in json_candidates(text) {
        let Ok(value) = serde_json::from_str::<Value>(&candidate) else {
            continue;
        };
        if !validator.is_valid(&value) {
            continue;
        }
        if let Ok(parsed) = serde_json::from_value(value) {
            return Some(parsed);
        }
    }
    None
}

fn json_candidates(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    let mut candidates = vec![trimmed.to_string()];
    if let Some(captures) = FENCED_JSON.captures(trimmed) {
        candidates.push(captures[1].to_string());
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && start < end
    {
        candidates.push(trimmed[start..=end].to_string());
    }
    candidates
}

/// Fenced code blocks in order of appearance, fences stripped.
pub fn code_blocks(text: &str) -> Vec<String> {
    FENCED_CODE
        .captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .filter(|block| !block.is_empty())
        .collect()
}

/// Name of the first function declared in a snippet (`def name(` / `fn name(`).
pub fn function_name(snippet: &str) -> Option<String> {
    FUNCTION_HEAD
        .captures(snippet)
        .map(|c| c[1].to_string())
}

/// Top-level `def test_*` function bodies found in generated test text. Each
/// block runs until the next top-level `def` or end of text.
pub fn test_functions(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut functions = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in &lines {
        if line.starts_with("def ") {
            if let Some(block) = current.take() {
                functions.push(block.join("\n").trim_end().to_string());
            }
            if line.starts_with("def test_") {
                current = Some(vec![line]);
            }
        } else if let Some(block) = &mut current {
            block.push(line);
        }
    }
    if let Some(block) = current {
        functions.push(block.join("\n").trim_end().to_string());
    }
    functions
}

/// First `max` characters of a string, respecting char boundaries.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
