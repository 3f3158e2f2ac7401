use std::collections::HashMap;
use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::{EngineError, Result};

use super::{RunResult, TIMEOUT_EXIT_CODE};

/// How long pipe readers may keep draining once the process group is gone
const READER_GRACE: Duration = Duration::from_millis(500);
const READ_CHUNK: usize = 8192;

/// A fully resolved command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
}

impl ProcessSpec {
    /// Builds a command from a template, `None` if the template is empty
    pub fn from_template(
        template: &[String],
        mapping: &HashMap<&str, String>,
        current_dir: &Path,
    ) -> Option<Self> {
        let mut parts = apply_template(template, mapping).into_iter();
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            current_dir: current_dir.to_path_buf(),
        })
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Applies template substitutions to command arguments
fn apply_template(cmd_template: &[String], mapping: &HashMap<&str, String>) -> Vec<String> {
    cmd_template
        .iter()
        .map(|s| {
            let mut t = s.clone();
            for (k, v) in mapping.iter() {
                t = t.replace(k, v);
            }
            t
        })
        .collect()
}

/// Runs one process to completion or until `time_limit` elapses
///
/// The child gets its own process group. The whole group is killed on
/// timeout and again after a normal exit, so no descendant outlives the
/// call. A non-zero exit is a normal result, not an error; only failing to
/// start or wait for the process is.
pub async fn run_process(
    spec: &ProcessSpec,
    stdin: &str,
    time_limit: Duration,
    output_limit: usize,
) -> Result<RunResult> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.current_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    log::debug!("Spawning `{spec}` with limit {time_limit:?}");
    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|e| spawn_error(&spec.program, e))?;
    let pgid = child.id();

    let stdin_task = child
        .stdin
        .take()
        .map(|pipe| tokio::spawn(feed_stdin(pipe, stdin.as_bytes().to_vec())));
    let stdout = Capture::new(output_limit);
    let stderr = Capture::new(output_limit);
    let stdout_task = child.stdout.take().map(|pipe| tokio::spawn(drain(pipe, stdout.clone())));
    let stderr_task = child.stderr.take().map(|pipe| tokio::spawn(drain(pipe, stderr.clone())));

    let waited = timeout(time_limit, child.wait()).await;
    let elapsed = start.elapsed();

    if let Some(pgid) = pgid {
        kill_process_group(pgid);
    }

    let status = match waited {
        Ok(status) => Some(status.map_err(|e| {
            EngineError::io(format!("failed to wait for `{}`", spec.program), e)
        })?),
        Err(_) => {
            log::warn!(
                "`{}` exceeded {time_limit:?} and was killed",
                spec.program
            );
            if let Err(e) = child.kill().await {
                log::warn!("Failed to reap `{}`: {e}", spec.program);
            }
            None
        }
    };

    for task in [stdout_task, stderr_task].into_iter().flatten() {
        settle(task).await;
    }
    if let Some(task) = stdin_task {
        task.abort();
    }

    let time_ms = elapsed.as_millis() as u64;
    let result = match status {
        Some(status) => RunResult {
            stdout: stdout.into_string(),
            stderr: stderr.into_string(),
            exit_code: exit_code(status),
            timed_out: false,
            time_ms,
        },
        None => RunResult {
            stdout: stdout.into_string(),
            stderr: String::new(),
            exit_code: TIMEOUT_EXIT_CODE,
            timed_out: true,
            time_ms,
        },
    };

    log::debug!(
        "`{}` finished: exit={} timed_out={} time={}ms",
        spec.program,
        result.exit_code,
        result.timed_out,
        result.time_ms
    );
    Ok(result)
}

fn spawn_error(program: &str, error: io::Error) -> EngineError {
    if error.kind() == io::ErrorKind::NotFound {
        EngineError::ToolchainUnavailable {
            program: program.to_string(),
        }
    } else {
        EngineError::io(format!("failed to spawn `{program}`"), error)
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => TIMEOUT_EXIT_CODE,
    }
}

fn kill_process_group(pgid: u32) {
    // SAFETY: killpg only sends a signal to the group created for this child
    let ret = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if ret != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            log::warn!("Failed to kill process group {pgid}: {err}");
        }
    }
}

async fn feed_stdin(mut pipe: ChildStdin, input: Vec<u8>) {
    // The child may exit without reading; a broken pipe is expected then
    if let Err(e) = pipe.write_all(&input).await {
        log::debug!("stdin not fully consumed: {e}");
    }
    let _ = pipe.shutdown().await;
}

async fn drain<R: AsyncRead + Unpin>(mut pipe: R, sink: Capture) {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink.push(&chunk[..n]),
        }
    }
}

async fn settle(mut task: JoinHandle<()>) {
    if timeout(READER_GRACE, &mut task).await.is_err() {
        task.abort();
    }
}

/// Bounded output buffer shared with a pipe reader
#[derive(Clone)]
struct Capture {
    inner: Arc<Mutex<CaptureInner>>,
}

struct CaptureInner {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl Capture {
    fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CaptureInner {
                bytes: Vec::new(),
                limit,
                truncated: false,
            })),
        }
    }

    fn push(&self, data: &[u8]) {
        let mut inner = self.inner.lock();
        let room = inner.limit.saturating_sub(inner.bytes.len());
        if data.len() > room {
            inner.truncated = true;
        }
        let take = data.len().min(room);
        inner.bytes.extend_from_slice(&data[..take]);
    }

    fn into_string(self) -> String {
        let inner = self.inner.lock();
        if inner.truncated {
            log::warn!("Output truncated at {} bytes", inner.limit);
        }
        String::from_utf8_lossy(&inner.bytes).into_owned()
    }
}
