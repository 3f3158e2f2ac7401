use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::sandbox::Language;

#[derive(Parser)]
#[command(name = "oj-runner", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<String>,

    /// Number of engine workers
    #[arg(long = "threads", short = 't', default_value_t = 4)]
    pub threads: u8,
}

impl CliArgs {
    /// Load the configuration from the specified file, or the defaults if none was given
    pub fn to_config(&self) -> std::io::Result<Config> {
        let Some(path) = &self.config_path else {
            return Ok(Config::default());
        };
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| e.into())
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Parent directory of the per-submission workspaces
    pub workspace_root: Option<PathBuf>,
    pub limits: LimitConfig,
    pub languages: LanguagesConfig,
    pub prompt_policy: PromptPolicy,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LimitConfig {
    pub compile_time_limit: MilliSecond,
    pub test_time_limit: MilliSecond,
    pub output_limit: ByteSize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            compile_time_limit: MilliSecond(5_000),
            test_time_limit: MilliSecond(2_000),
            output_limit: ByteSize(8 * 1024 * 1024),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LanguagesConfig {
    pub python: LanguageConfig,
    pub java: LanguageConfig,
    pub cpp: LanguageConfig,
}

impl LanguagesConfig {
    pub fn get(&self, language: Language) -> &LanguageConfig {
        match language {
            Language::Python => &self.python,
            Language::Java => &self.java,
            Language::Cpp => &self.cpp,
        }
    }
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            python: LanguageConfig {
                compile: None,
                run: strings(&["python3", "%SOURCE%"]),
                run_time_limit: MilliSecond(10_000),
            },
            java: LanguageConfig {
                compile: Some(strings(&["javac", "-encoding", "UTF-8", "%SOURCE%"])),
                run: strings(&["java", "-cp", "%WORKSPACE%", "%CLASS%"]),
                run_time_limit: MilliSecond(5_000),
            },
            cpp: LanguageConfig {
                compile: Some(strings(&[
                    "g++",
                    "-std=c++17",
                    "-O2",
                    "%SOURCE%",
                    "-o",
                    "%OUTPUT%",
                ])),
                run: strings(&["%OUTPUT%"]),
                run_time_limit: MilliSecond(5_000),
            },
        }
    }
}

/// Command templates of one language
///
/// `%SOURCE%`, `%OUTPUT%`, `%CLASS%` and `%WORKSPACE%` are substituted
/// for every invocation.
#[derive(Deserialize, Debug, Clone)]
pub struct LanguageConfig {
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
    /// Time limit of the interactive single run
    pub run_time_limit: MilliSecond,
}

/// What the Python launcher does with `input()` prompts on graded runs
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromptPolicy {
    /// Run the file untouched; prompts land on stdout
    Keep,
    #[default]
    Discard,
    Stderr,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MilliSecond(pub u64);

impl From<MilliSecond> for Duration {
    fn from(value: MilliSecond) -> Self {
        Duration::from_millis(value.0)
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
