use std::sync::Arc;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::queue::{JobMessage, JobQueue};
use crate::sandbox::Engine;

pub async fn worker(
    id: u8,
    engine: Arc<Engine>,
    queue: Arc<JobQueue>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    log::info!("Worker {id} initialized");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                log::info!("Worker {id} received shutdown signal, stopping");
                break;
            }

            job_message = queue.pop() => {
                let job_id = job_message.id();
                log::info!("Worker {id} got job {job_id} from queue");

                match job_message {
                    JobMessage::Run { submission, responder, .. } => {
                        // Each job runs in its own task so a panic cannot take the worker down
                        let engine = Arc::clone(&engine);
                        let handle = tokio::spawn(async move { engine.run_once(&submission).await });
                        let result = settle(handle.await, job_id, id);

                        if responder.send(result).is_err() {
                            log::warn!("Failed to send job {job_id} result back to server");
                        }
                    }
                    JobMessage::Check { submission, testcases, responder, .. } => {
                        let engine = Arc::clone(&engine);
                        let handle = tokio::spawn(async move {
                            engine.check_against_tests(&submission, &testcases).await
                        });
                        let result = settle(handle.await, job_id, id);

                        if responder.send(result).is_err() {
                            log::warn!("Failed to send job {job_id} result back to server");
                        }
                    }
                }
                log::info!("Job {job_id} finished on worker {id}");
            }
        };
    }

    log::info!("Worker {id} has shut down gracefully");
    Ok(())
}

fn settle<T>(
    joined: Result<Result<T, EngineError>, JoinError>,
    job_id: u64,
    worker_id: u8,
) -> Result<T, EngineError> {
    joined.unwrap_or_else(|e| {
        if e.is_panic() {
            log::error!("Job {job_id} panicked on worker {worker_id}: {e:?}");
        } else {
            log::error!("Job {job_id} was cancelled on worker {worker_id}: {e:?}");
        }
        Err(EngineError::Crashed(e.to_string()))
    })
}
