use std::io;

use thiserror::Error;

use crate::sandbox::Language;

/// Rejections raised before any process is spawned
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("No code provided")]
    EmptySource,
    #[error("No valid testcases found")]
    NoTestCases,
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("Could not find a public class in your Java code")]
    MissingPublicClass,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Input(#[from] InputError),

    /// The configured interpreter or compiler does not exist on this host
    #[error("toolchain program `{program}` is not available on this host")]
    ToolchainUnavailable { program: String },

    #[error("no command configured for {0}")]
    EmptyCommand(Language),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("execution task crashed: {0}")]
    Crashed(String),
}

impl EngineError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the failure comes from host setup rather than the submission
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ToolchainUnavailable { .. } | Self::EmptyCommand(_)
        )
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
