use std::time::Duration;

use crate::error::Result;

use super::{ProcessSpec, RunResult, TestCase, normalize, run_process};

/// Classified outcome of one test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    /// Both sides normalized
    Failed { expected: String, actual: String },
    RuntimeError { message: String },
    TimedOut,
    /// Synthetic entry standing in for every test case when compilation fails
    CompileError { diagnostics: String },
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }

    /// Wire status; a compile failure reports as `failed`
    pub fn status(&self) -> &'static str {
        match self {
            Verdict::Passed => "passed",
            Verdict::Failed { .. } | Verdict::CompileError { .. } => "failed",
            Verdict::RuntimeError { .. } => "runtime_error",
            Verdict::TimedOut => "timed_out",
        }
    }

    pub fn diff(&self) -> Option<String> {
        match self {
            Verdict::Failed { expected, actual } => {
                Some(format!("Expected:\n{expected}\n\nGot:\n{actual}"))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseVerdict {
    pub input: String,
    pub expected_output: String,
    /// Raw stdout of the program, never normalized
    pub actual_output: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionVerdict {
    pub results: Vec<TestCaseVerdict>,
    pub passed: usize,
    /// Number of requested test cases, even when evaluation stopped early
    pub total: usize,
}

impl SubmissionVerdict {
    pub(crate) fn compile_failure(diagnostics: String, total: usize) -> Self {
        Self {
            results: vec![TestCaseVerdict {
                input: "N/A".to_string(),
                expected_output: "N/A".to_string(),
                actual_output: diagnostics.clone(),
                verdict: Verdict::CompileError { diagnostics },
            }],
            passed: 0,
            total,
        }
    }

    pub fn is_compile_failure(&self) -> bool {
        matches!(
            self.results.as_slice(),
            [TestCaseVerdict {
                verdict: Verdict::CompileError { .. },
                ..
            }]
        )
    }

    pub fn is_success(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }
}

/// Judges one run against its expected output
///
/// First match wins: timeout, then anything on stderr or a non-zero exit,
/// then normalized comparison.
pub fn classify(run: &RunResult, expected: &str) -> Verdict {
    if run.timed_out {
        return Verdict::TimedOut;
    }
    if !run.stderr.is_empty() {
        return Verdict::RuntimeError {
            message: run.stderr.clone(),
        };
    }
    if run.exit_code != 0 {
        return Verdict::RuntimeError {
            message: format!("process exited with code {}", run.exit_code),
        };
    }

    let expected = normalize(expected);
    let actual = normalize(&run.stdout);
    if expected == actual {
        Verdict::Passed
    } else {
        Verdict::Failed { expected, actual }
    }
}

/// Runs the program once per test case, strictly in order
pub(crate) async fn evaluate(
    program: &ProcessSpec,
    testcases: &[TestCase],
    time_limit: Duration,
    output_limit: usize,
) -> Result<SubmissionVerdict> {
    let mut results = Vec::with_capacity(testcases.len());
    let mut passed = 0;

    for (idx, case) in testcases.iter().enumerate() {
        let run = run_process(program, &case.input, time_limit, output_limit).await?;
        let verdict = classify(&run, &case.expected_output);
        log::debug!("Case {} -> {}", idx + 1, verdict.status());

        if verdict.is_passed() {
            passed += 1;
        }
        results.push(TestCaseVerdict {
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
            actual_output: run.stdout,
            verdict,
        });
    }

    Ok(SubmissionVerdict {
        results,
        passed,
        total: testcases.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::TIMEOUT_EXIT_CODE;
    use pretty_assertions::assert_eq;

    fn run(stdout: &str, stderr: &str, exit_code: i32) -> RunResult {
        RunResult {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
            timed_out: false,
            time_ms: 1,
        }
    }

    #[test]
    fn test_classify_passed_after_normalization() {
        assert_eq!(classify(&run("8\n\n\n", "", 0), "8"), Verdict::Passed);
        assert_eq!(classify(&run("1 2 \n", "", 0), "\n1 2\n"), Verdict::Passed);
    }

    #[test]
    fn test_classify_failed_carries_normalized_sides() {
        let verdict = classify(&run("7\n", "", 0), "8\n");
        assert_eq!(
            verdict,
            Verdict::Failed {
                expected: "8".to_string(),
                actual: "7".to_string()
            }
        );
        assert_eq!(verdict.diff().unwrap(), "Expected:\n8\n\nGot:\n7");
        assert_eq!(verdict.status(), "failed");
    }

    #[test]
    fn test_classify_stderr_wins_over_matching_stdout() {
        let verdict = classify(&run("8\n", "Traceback: boom\n", 1), "8");
        assert_eq!(
            verdict,
            Verdict::RuntimeError {
                message: "Traceback: boom\n".to_string()
            }
        );
        assert_eq!(verdict.status(), "runtime_error");
    }

    #[test]
    fn test_classify_nonzero_exit_without_stderr() {
        let verdict = classify(&run("8\n", "", 139), "8");
        assert_eq!(
            verdict,
            Verdict::RuntimeError {
                message: "process exited with code 139".to_string()
            }
        );
    }

    #[test]
    fn test_classify_timeout_first() {
        let mut result = run("8", "noise", TIMEOUT_EXIT_CODE);
        result.timed_out = true;
        assert_eq!(classify(&result, "8"), Verdict::TimedOut);
        assert_eq!(Verdict::TimedOut.status(), "timed_out");
    }

    #[test]
    fn test_compile_failure_verdict_shape() {
        let verdict = SubmissionVerdict::compile_failure("error: ';' expected".to_string(), 4);
        assert_eq!(verdict.results.len(), 1);
        assert_eq!(verdict.passed, 0);
        assert_eq!(verdict.total, 4);
        assert!(verdict.is_compile_failure());
        assert!(!verdict.is_success());
        assert_eq!(verdict.results[0].verdict.status(), "failed");
    }

    #[tokio::test]
    async fn test_evaluate_counts_and_keeps_order() {
        let program = ProcessSpec {
            program: "/bin/sh".to_string(),
            args: vec![
                "-c".to_string(),
                "read a; if [ \"$a\" = boom ]; then echo bad >&2; exit 1; fi; echo \"$a\"".to_string(),
            ],
            current_dir: std::env::temp_dir(),
        };
        let cases = vec![
            TestCase::new("1\n", "1"),
            TestCase::new("2\n", "3"),
            TestCase::new("boom\n", "boom"),
            TestCase::new("4\n", "4\n\n"),
        ];

        let verdict = evaluate(&program, &cases, Duration::from_secs(5), 1 << 16)
            .await
            .unwrap();

        let statuses: Vec<_> = verdict.results.iter().map(|r| r.verdict.status()).collect();
        assert_eq!(statuses, vec!["passed", "failed", "runtime_error", "passed"]);
        assert_eq!(verdict.passed, 2);
        assert_eq!(verdict.total, 4);
        assert_eq!(verdict.results[1].actual_output, "2\n");
        assert_eq!(verdict.results[2].input, "boom\n");
        assert!(!verdict.is_compile_failure());
    }
}
