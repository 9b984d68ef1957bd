//! Prompt rendering for the generation collaborator.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::types::RetryContext;

const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");
const TESTS_TEMPLATE: &str = include_str!("prompts/tests.md");

/// Retry section of the generation prompt.
#[derive(Debug, Clone, Serialize)]
struct RetrySection {
    error_kind: String,
    error_details: String,
    attempt: u32,
    max_attempts: u32,
    previous_errors: Vec<String>,
}

impl RetrySection {
    fn from_context(ctx: &RetryContext) -> Self {
        Self {
            error_kind: ctx.error_kind.as_str().to_string(),
            error_details: ctx.error_details.clone(),
            attempt: ctx.attempt,
            max_attempts: ctx.max_attempts,
            previous_errors: ctx.previous_errors.clone(),
        }
    }
}

/// All inputs needed to render a generation prompt.
#[derive(Debug, Clone)]
pub struct GeneratePromptInputs<'a> {
    pub description: &'a str,
    pub target: &'a str,
    pub action: &'a str,
    pub current_content: &'a str,
    pub context: &'a str,
    pub retry: Option<&'a RetryContext>,
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("plan", PLAN_TEMPLATE)
            .expect("plan template should be valid");
        env.add_template("generate", GENERATE_TEMPLATE)
            .expect("generate template should be valid");
        env.add_template("tests", TESTS_TEMPLATE)
            .expect("tests template should be valid");
        Self { env }
    }
}

/// Render the planning prompt for a requirements document.
pub fn render_plan(requirements: &str) -> Result<String> {
    let engine = PromptEngine::new();
    let template = engine.env.get_template("plan")?;
    let rendered = template.render(context! {
        requirements => requirements.trim(),
    })?;
    Ok(rendered)
}

/// Render the per-task generation prompt, including the retry section when
/// a previous attempt failed.
pub fn render_generate(input: &GeneratePromptInputs<'_>) -> Result<String> {
    let engine = PromptEngine::new();
    let template = engine.env.get_template("generate")?;
    let rendered = template.render(context! {
        description => input.description,
        target => input.target,
        action => input.action,
        current_content => if input.current_content.is_empty() {
            "(empty file)"
        } else {
            input.current_content
        },
        context => input.context,
        retry => input.retry.map(RetrySection::from_context),
    })?;
    Ok(rendered)
}

/// Render the test-synthesis prompt for one finished file.
pub fn render_tests(path: &str, content: &str) -> Result<String> {
    let engine = PromptEngine::new();
    let template = engine.env.get_template("tests")?;
    let rendered = template.render(context! {
        path => path,
        content => content,
    })?;
    Ok(rendered)
}
