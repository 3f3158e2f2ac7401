mod compile;
mod engine;
mod materialize;
mod normalize;
mod runner;
mod testing;
mod workspace;

pub use compile::CompileOutcome;
pub use engine::Engine;
pub use materialize::{SourceFile, extract_public_class};
pub use normalize::normalize;
pub use runner::{ProcessSpec, run_process};
pub use testing::{SubmissionVerdict, TestCaseVerdict, Verdict, classify};
pub use workspace::Workspace;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Exit code reported when the process was killed for exceeding its time limit
pub const TIMEOUT_EXIT_CODE: i32 = -1;
/// Exit code reported by a single run whose compilation failed
pub const COMPILE_FAILED_EXIT_CODE: i32 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Java,
    Cpp,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Python, Language::Java, Language::Cpp];

    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Java => "java",
            Language::Cpp => "cpp",
        }
    }

    pub fn needs_compile(self) -> bool {
        !matches!(self, Language::Python)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "cpp" | "c++" => Ok(Language::Cpp),
            _ => Err(InputError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// One user's code, immutable for the duration of an execution
#[derive(Debug, Clone)]
pub struct Submission {
    pub code: String,
    pub language: Language,
    pub stdin: Option<String>,
}

impl Submission {
    pub fn new(code: impl Into<String>, language: Language) -> Self {
        Self {
            code: code.into(),
            language,
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn stdin(&self) -> &str {
        self.stdin.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input: String,
    #[serde(default, alias = "output")]
    pub expected_output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

/// Outcome of a single process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    /// Wall time in milliseconds
    pub time_ms: u64,
}

impl RunResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    pub(crate) fn compile_failure(diagnostics: &str) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("Compilation error:\n{diagnostics}"),
            exit_code: COMPILE_FAILED_EXIT_CODE,
            timed_out: false,
            time_ms: 0,
        }
    }
}
