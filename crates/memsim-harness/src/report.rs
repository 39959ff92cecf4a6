//! Markdown report for script runs.

use crate::script::StepResult;

/// Renders a human-readable summary of a script run.
#[must_use]
pub fn render_report(name: &str, results: &[StepResult]) -> String {
    let passed = results.iter().filter(|r| r.passed).count();
    let mut out = String::new();

    out.push_str(&format!("# Script Report: {name}\n\n"));
    out.push_str(&format!("**Steps:** {} passed / {} total\n\n", passed, results.len()));
    out.push_str("| Command | Result |\n|---------|--------|\n");
    for result in results {
        let status = if result.passed { "PASS" } else { "FAIL" };
        out.push_str(&format!("| `{}` | {status} |\n", result.command));
    }

    let failures: Vec<&StepResult> = results.iter().filter(|r| !r.passed).collect();
    if !failures.is_empty() {
        out.push_str("\n## Failures\n\n");
        for failure in failures {
            out.push_str(&format!(
                "### `{}`\n\nexpected:\n```\n{}\n```\nactual:\n```\n{}\n```\n\n",
                failure.command,
                failure.expected.as_deref().unwrap_or("<none>"),
                failure.actual
            ));
        }
    }

    out
}
