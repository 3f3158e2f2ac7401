use actix_web::{HttpResponse, Responder, post, web};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::{default_language, dispatch, engine_error_response};
use crate::queue::{JobMessage, JobQueue};
use crate::sandbox::{COMPILE_FAILED_EXIT_CODE, Language, RunResult, Submission};

const TIMEOUT_MESSAGE: &str = "Execution timed out. Your program took too long to run.";

#[derive(Serialize, Deserialize, Debug)]
pub struct RunRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub stdin: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct RunResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub compile_error: bool,
    pub time_ms: u64,
}

impl From<RunResult> for RunResponse {
    fn from(result: RunResult) -> Self {
        let stderr = if result.timed_out {
            TIMEOUT_MESSAGE.to_string()
        } else {
            trim_line_breaks(result.stderr)
        };

        Self {
            stdout: trim_line_breaks(result.stdout),
            stderr,
            exit_code: result.exit_code,
            timed_out: result.timed_out,
            compile_error: result.exit_code == COMPILE_FAILED_EXIT_CODE,
            time_ms: result.time_ms,
        }
    }
}

fn trim_line_breaks(mut text: String) -> String {
    let kept = text.trim_end_matches(['\n', '\r']).len();
    text.truncate(kept);
    text
}

#[post("/run_code")]
pub async fn run_code_handler(
    job_queue: web::Data<JobQueue>,
    body: web::Json<RunRequest>,
) -> impl Responder {
    let RunRequest {
        code,
        language,
        stdin,
    } = body.into_inner();

    let language = match language.parse::<Language>() {
        Ok(language) => language,
        Err(e) => return engine_error_response(&e.into()),
    };

    let job_id = JobMessage::next_id();
    let (tx, rx) = oneshot::channel();
    let message = JobMessage::Run {
        job_id,
        submission: Submission::new(code, language).with_stdin(stdin),
        responder: tx,
    };

    match dispatch(&job_queue, job_id, message, rx).await {
        Ok(result) => HttpResponse::Ok().json(RunResponse::from(result)),
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::TIMEOUT_EXIT_CODE;

    #[test]
    fn test_response_trims_trailing_line_breaks_only() {
        let response = RunResponse::from(RunResult {
            stdout: "  3\r\n\n".to_string(),
            stderr: "warn\n".to_string(),
            exit_code: 0,
            timed_out: false,
            time_ms: 12,
        });
        assert_eq!(response.stdout, "  3");
        assert_eq!(response.stderr, "warn");
        assert!(!response.compile_error);
    }

    #[test]
    fn test_timeout_response() {
        let response = RunResponse::from(RunResult {
            stdout: "partial\n".to_string(),
            stderr: String::new(),
            exit_code: TIMEOUT_EXIT_CODE,
            timed_out: true,
            time_ms: 10_000,
        });
        assert_eq!(response.stdout, "partial");
        assert_eq!(response.stderr, TIMEOUT_MESSAGE);
        assert!(response.timed_out);
    }

    #[test]
    fn test_request_defaults() {
        let request: RunRequest = serde_json::from_str(r#"{"code": "print(1)"}"#).unwrap();
        assert_eq!(request.language, "python");
        assert_eq!(request.stdin, "");
    }
}
