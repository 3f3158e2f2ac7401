mod check;
mod run;

pub use check::*;
pub use run::*;

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::EngineError;
use crate::queue::{JobMessage, JobQueue};

#[derive(Serialize)]
struct ErrorResponse {
    reason: &'static str,
    code: u32,
}

#[derive(Serialize)]
struct ErrorResponseWithMessage {
    reason: &'static str,
    code: u32,
    message: String,
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse {
        reason: "ERR_INVALID_ARGUMENT",
        code: 1,
    });
    InternalError::from_response(err, response).into()
}

fn default_language() -> String {
    "python".to_string()
}

fn invalid_argument(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponseWithMessage {
        reason: "ERR_INVALID_ARGUMENT",
        code: 1,
        message,
    })
}

fn engine_error_response(err: &EngineError) -> HttpResponse {
    match err {
        EngineError::Input(e) => invalid_argument(e.to_string()),
        e if e.is_configuration() => {
            HttpResponse::InternalServerError().json(ErrorResponseWithMessage {
                reason: "ERR_CONFIGURATION",
                code: 4,
                message: e.to_string(),
            })
        }
        e => HttpResponse::InternalServerError().json(ErrorResponseWithMessage {
            reason: "ERR_INTERNAL",
            code: 6,
            message: e.to_string(),
        }),
    }
}

/// Queues a job and waits for the worker's answer
async fn dispatch<T>(
    job_queue: &JobQueue,
    job_id: u64,
    message: JobMessage,
    rx: oneshot::Receiver<Result<T, EngineError>>,
) -> Result<T, HttpResponse> {
    job_queue.push(message).await;
    log::debug!("Sent job {job_id} to queue");

    match rx.await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(engine_error_response(&e)),
        Err(e) => {
            log::error!("Failed to receive job {job_id} response: {e}");
            Err(HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_INTERNAL",
                code: 6,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;

    #[test]
    fn test_engine_error_status_codes() {
        let input = EngineError::Input(InputError::EmptySource);
        assert_eq!(engine_error_response(&input).status(), 400);

        let missing = EngineError::ToolchainUnavailable {
            program: "javac".to_string(),
        };
        assert_eq!(engine_error_response(&missing).status(), 500);

        let crashed = EngineError::Crashed("boom".to_string());
        assert_eq!(engine_error_response(&crashed).status(), 500);
    }
}
