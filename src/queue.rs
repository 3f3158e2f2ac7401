use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, Notify, oneshot};

use crate::error::EngineError;
use crate::sandbox::{RunResult, Submission, SubmissionVerdict, TestCase};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

pub enum JobMessage {
    Run {
        job_id: u64,
        submission: Submission,
        responder: oneshot::Sender<Result<RunResult, EngineError>>,
    },
    Check {
        job_id: u64,
        submission: Submission,
        testcases: Vec<TestCase>,
        responder: oneshot::Sender<Result<SubmissionVerdict, EngineError>>,
    },
}

impl JobMessage {
    pub fn next_id() -> u64 {
        NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)
    }

    pub fn id(&self) -> u64 {
        match self {
            Self::Run { job_id, .. } => *job_id,
            Self::Check { job_id, .. } => *job_id,
        }
    }
}

pub struct JobQueue {
    queue: Mutex<VecDeque<JobMessage>>,
    notify: Notify,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub async fn push(&self, job: JobMessage) {
        self.queue.lock().await.push_back(job);
        self.notify.notify_one();
    }

    pub async fn pop(&self) -> JobMessage {
        loop {
            if let Some(job) = self.queue.lock().await.pop_front() {
                return job;
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
