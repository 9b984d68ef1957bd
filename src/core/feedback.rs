//! Construction of [`FeedbackResult`] values under the gate-precedence rule.
//!
//! A syntax failure means lint and tests were never evaluated; a lint failure
//! means tests were never evaluated. `overall_passed` holds only when every
//! gate passed.

use crate::core::types::{FeedbackResult, LintFinding, LintSeverity, TestResult};

/// Feedback for a syntax failure. Downstream gates are marked failed because
/// they were never reached.
pub fn syntax_failure(syntax_errors: Vec<String>) -> FeedbackResult {
    let summary = match syntax_errors.first() {
        Some(first) => format!("Syntax error: {first}"),
        None => "Syntax error".to_string(),
    };
    FeedbackResult {
        syntax_valid: false,
        syntax_errors,
        lint_passed: false,
        lint_errors: Vec::new(),
        tests_passed: false,
        test_results: Vec::new(),
        overall_passed: false,
        summary,
    }
}

/// Feedback for a lint failure on syntactically valid code. Only
/// error-severity findings reach the summary; warnings ride along.
pub fn lint_failure(lint_errors: Vec<LintFinding>) -> FeedbackResult {
    let critical: Vec<String> = lint_errors
        .iter()
        .filter(|f| f.severity == LintSeverity::Error)
        .take(3)
        .map(|f| format!("{}:{} {}", f.code, f.line, f.message))
        .collect();
    FeedbackResult {
        syntax_valid: true,
        syntax_errors: Vec::new(),
        lint_passed: false,
        lint_errors,
        tests_passed: false,
        test_results: Vec::new(),
        overall_passed: false,
        summary: format!("Lint errors: {}", critical.join("; ")),
    }
}

/// Feedback after a test run on code that passed syntax and lint. The lint
/// findings carried here are warnings only.
pub fn from_test_results(
    lint_warnings: Vec<LintFinding>,
    test_results: Vec<TestResult>,
) -> FeedbackResult {
    let total = test_results.len();
    let passed = test_results.iter().filter(|r| r.passed).count();
    let tests_passed = passed == total;
    let summary = if tests_passed {
        format!("All {total} tests passed")
    } else {
        let failed: Vec<&str> = test_results
            .iter()
            .filter(|r| !r.passed)
            .take(3)
            .map(|r| r.name.as_str())
            .collect();
        format!("{passed}/{total} tests passed. Failed: {}", failed.join(", "))
    };
    FeedbackResult {
        syntax_valid: true,
        syntax_errors: Vec::new(),
        lint_passed: true,
        lint_errors: lint_warnings,
        tests_passed,
        test_results,
        overall_passed: tests_passed,
        summary,
    }
}
