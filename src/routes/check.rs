use actix_web::{HttpResponse, Responder, post, web};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::{default_language, dispatch, engine_error_response, invalid_argument};
use crate::queue::{JobMessage, JobQueue};
use crate::sandbox::{Language, Submission, SubmissionVerdict, TestCase, TestCaseVerdict, Verdict};

#[derive(Serialize, Deserialize, Debug)]
pub struct CheckRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub testcases: TestCases,
}

/// Test cases as a JSON list, or as a string holding that list
#[derive(Serialize, Deserialize, Debug)]
#[serde(untagged)]
pub enum TestCases {
    List(Vec<TestCase>),
    Encoded(String),
}

impl Default for TestCases {
    fn default() -> Self {
        TestCases::List(Vec::new())
    }
}

impl TestCases {
    pub fn into_list(self) -> Result<Vec<TestCase>, serde_json::Error> {
        match self {
            TestCases::List(list) => Ok(list),
            TestCases::Encoded(text) => serde_json::from_str(&text),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CaseReport {
    pub input: String,
    pub expected_output: String,
    pub user_output: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub compile_error: bool,
}

impl From<TestCaseVerdict> for CaseReport {
    fn from(case: TestCaseVerdict) -> Self {
        let status = case.verdict.status().to_string();
        let diff = case.verdict.diff();
        let (error, compile_error) = match case.verdict {
            Verdict::Passed | Verdict::Failed { .. } => (None, false),
            Verdict::RuntimeError { message } => (Some(message), false),
            Verdict::TimedOut => (Some("Code execution timed out".to_string()), false),
            Verdict::CompileError { diagnostics } => {
                (Some(format!("Compilation error: {diagnostics}")), true)
            }
        };

        Self {
            input: case.input,
            expected_output: case.expected_output,
            user_output: case.actual_output,
            status,
            diff,
            error,
            compile_error,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CheckResponse {
    pub results: Vec<CaseReport>,
    pub passed: usize,
    pub total: usize,
    pub success_rate: String,
    pub success: bool,
}

impl From<SubmissionVerdict> for CheckResponse {
    fn from(verdict: SubmissionVerdict) -> Self {
        let success = verdict.is_success();
        Self {
            success_rate: format!("{}/{}", verdict.passed, verdict.total),
            passed: verdict.passed,
            total: verdict.total,
            success,
            results: verdict.results.into_iter().map(CaseReport::from).collect(),
        }
    }
}

#[post("/check_code")]
pub async fn check_code_handler(
    job_queue: web::Data<JobQueue>,
    body: web::Json<CheckRequest>,
) -> impl Responder {
    let CheckRequest {
        code,
        language,
        testcases,
    } = body.into_inner();

    let language = match language.parse::<Language>() {
        Ok(language) => language,
        Err(e) => return engine_error_response(&e.into()),
    };
    let testcases = match testcases.into_list() {
        Ok(testcases) => testcases,
        Err(e) => return invalid_argument(format!("Invalid JSON format for testcases: {e}")),
    };

    let job_id = JobMessage::next_id();
    let (tx, rx) = oneshot::channel();
    let message = JobMessage::Check {
        job_id,
        submission: Submission::new(code, language),
        testcases,
        responder: tx,
    };

    match dispatch(&job_queue, job_id, message, rx).await {
        Ok(verdict) => HttpResponse::Ok().json(CheckResponse::from(verdict)),
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn test_encoded_testcases() {
        let request: CheckRequest = serde_json::from_value(json!({
            "code": "print(1)",
            "testcases": "[{\"input\": \"\", \"output\": \"1\"}]"
        }))
        .unwrap();
        assert_eq!(request.language, "python");
        assert_eq!(
            request.testcases.into_list().unwrap(),
            vec![TestCase::new("", "1")]
        );

        let broken = TestCases::Encoded("[{".to_string());
        assert!(broken.into_list().is_err());
    }

    #[test]
    fn test_compile_failure_response_shape() {
        let verdict = SubmissionVerdict {
            results: vec![TestCaseVerdict {
                input: "N/A".to_string(),
                expected_output: "N/A".to_string(),
                actual_output: "Main.java:3: error: ';' expected".to_string(),
                verdict: Verdict::CompileError {
                    diagnostics: "Main.java:3: error: ';' expected".to_string(),
                },
            }],
            passed: 0,
            total: 2,
        };

        let body = serde_json::to_value(CheckResponse::from(verdict)).unwrap();
        assert_json_eq!(
            body,
            json!({
                "results": [{
                    "input": "N/A",
                    "expected_output": "N/A",
                    "user_output": "Main.java:3: error: ';' expected",
                    "status": "failed",
                    "error": "Compilation error: Main.java:3: error: ';' expected",
                    "compile_error": true
                }],
                "passed": 0,
                "total": 2,
                "success_rate": "0/2",
                "success": false
            })
        );
    }

    #[test]
    fn test_mixed_results_response() {
        let verdict = SubmissionVerdict {
            results: vec![
                TestCaseVerdict {
                    input: "5\n3".to_string(),
                    expected_output: "8".to_string(),
                    actual_output: "8\n".to_string(),
                    verdict: Verdict::Passed,
                },
                TestCaseVerdict {
                    input: "1\n1".to_string(),
                    expected_output: "2".to_string(),
                    actual_output: "3\n".to_string(),
                    verdict: Verdict::Failed {
                        expected: "2".to_string(),
                        actual: "3".to_string(),
                    },
                },
            ],
            passed: 1,
            total: 2,
        };

        let body = serde_json::to_value(CheckResponse::from(verdict)).unwrap();
        assert_json_eq!(
            body,
            json!({
                "results": [
                    {
                        "input": "5\n3",
                        "expected_output": "8",
                        "user_output": "8\n",
                        "status": "passed"
                    },
                    {
                        "input": "1\n1",
                        "expected_output": "2",
                        "user_output": "3\n",
                        "status": "failed",
                        "diff": "Expected:\n2\n\nGot:\n3"
                    }
                ],
                "passed": 1,
                "total": 2,
                "success_rate": "1/2",
                "success": false
            })
        );
    }
}
