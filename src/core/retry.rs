//! Failure classification and retry-context construction.
//!
//! The classifier follows gate precedence: syntax before lint before test.
//! Retry contexts carry a bounded ring of prior error details so the
//! generation prompt can show recent history without unbounded growth.

use crate::core::types::{ErrorKind, FeedbackResult, LintSeverity, RetryContext};

/// How many prior error details a retry context retains.
pub const MAX_PREVIOUS_ERRORS: usize = 3;

/// Classify a failed feedback into an error kind and diagnostic text.
pub fn classify_failure(feedback: &FeedbackResult) -> (ErrorKind, String) {
    if !feedback.syntax_valid {
        return (ErrorKind::Syntax, feedback.syntax_errors.join("\n"));
    }
    if !feedback.lint_passed {
        let details: Vec<String> = feedback
            .lint_errors
            .iter()
            .filter(|f| f.severity == LintSeverity::Error)
            .take(5)
            .map(|f| format!("Line {}: [{}] {}", f.line, f.code, f.message))
            .collect();
        return (ErrorKind::Lint, details.join("\n"));
    }
    if !feedback.tests_passed {
        let details: Vec<String> = feedback
            .test_results
            .iter()
            .filter(|r| !r.passed)
            .take(3)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.name,
                    r.error_message.as_deref().unwrap_or("failed")
                )
            })
            .collect();
        return (ErrorKind::Test, details.join("\n"));
    }
    (ErrorKind::Runtime, feedback.summary.clone())
}

/// Build the retry context for the next attempt, shifting the previous
/// context's details into the bounded history ring.
pub fn next_retry_context(
    error_kind: ErrorKind,
    failed_code: String,
    error_details: String,
    attempt: u32,
    max_attempts: u32,
    previous: Option<&RetryContext>,
) -> RetryContext {
    let mut previous_errors = Vec::new();
    if let Some(prev) = previous
        && !prev.error_details.is_empty()
    {
        previous_errors.clone_from(&prev.previous_errors);
        previous_errors.push(prev.error_details.clone());
        let excess = previous_errors.len().saturating_sub(MAX_PREVIOUS_ERRORS);
        previous_errors.drain(..excess);
    }
    RetryContext {
        error_kind,
        failed_code,
        error_details,
        attempt,
        max_attempts,
        previous_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feedback;
    use crate::core::types::{LintFinding, TestResult};

    #[test]
    fn syntax_outranks_lint_and_test() {
        let fb = feedback::syntax_failure(vec!["invalid syntax".to_string()]);
        let (kind, details) = classify_failure(&fb);
        assert_eq!(kind, ErrorKind::Syntax);
        assert_eq!(details, "invalid syntax");
    }

    #[test]
    fn lint_outranks_test() {
        let fb = feedback::lint_failure(vec![LintFinding {
            file: "calc.py".to_string(),
            line: 9,
            column: 1,
            code: "F811".to_string(),
            message: "redefinition of 'add'".to_string(),
            severity: LintSeverity::Error,
        }]);
        let (kind, details) = classify_failure(&fb);
        assert_eq!(kind, ErrorKind::Lint);
        assert_eq!(details, "Line 9: [F811] redefinition of 'add'");
    }

    #[test]
    fn test_failures_list_names_and_messages() {
        let fb = feedback::from_test_results(
            Vec::new(),
            vec![TestResult {
                name: "test_div".to_string(),
                passed: false,
                error_message: Some("division by zero".to_string()),
                traceback: None,
            }],
        );
        let (kind, details) = classify_failure(&fb);
        assert_eq!(kind, ErrorKind::Test);
        assert_eq!(details, "test_div: division by zero");
    }

    #[test]
    fn history_ring_never_exceeds_bound() {
        let mut ctx = next_retry_context(
            ErrorKind::Test,
            "code 1".to_string(),
            "error 1".to_string(),
            1,
            10,
            None,
        );
        assert!(ctx.previous_errors.is_empty());

        for attempt in 2..=6 {
            ctx = next_retry_context(
                ErrorKind::Test,
                format!("code {attempt}"),
                format!("error {attempt}"),
                attempt,
                10,
                Some(&ctx),
            );
            assert!(ctx.previous_errors.len() <= MAX_PREVIOUS_ERRORS);
        }
        // Oldest entries fall off the front.
        assert_eq!(
            ctx.previous_errors,
            vec!["error 3", "error 4", "error 5"]
        );
        assert_eq!(ctx.error_details, "error 6");
    }

    #[test]
    fn empty_previous_details_are_not_recorded() {
        let prev = RetryContext {
            error_kind: ErrorKind::Runtime,
            failed_code: String::new(),
            error_details: String::new(),
            attempt: 1,
            max_attempts: 3,
            previous_errors: Vec::new(),
        };
        let ctx = next_retry_context(
            ErrorKind::Test,
            String::new(),
            "error".to_string(),
            2,
            3,
            Some(&prev),
        );
        assert!(ctx.previous_errors.is_empty());
    }
}
