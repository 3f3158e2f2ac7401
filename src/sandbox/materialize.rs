use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::PromptPolicy;
use crate::error::{EngineError, InputError, Result};

use super::{Language, Workspace};

const CPP_SOURCE_NAME: &str = "main.cpp";
const EXECUTABLE_NAME: &str = "main";
const PYTHON_LAUNCHER_NAME: &str = "_launcher.py";

static PUBLIC_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bpublic\s+(?:(?:final|abstract|strictfp)\s+)*class\s+([A-Za-z_$][A-Za-z0-9_$]*)")
        .expect("public class pattern is valid")
});

/// Finds the name of the first public class, which javac requires as file name
pub fn extract_public_class(code: &str) -> std::result::Result<String, InputError> {
    PUBLIC_CLASS
        .captures(code)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(InputError::MissingPublicClass)
}

/// File layout decided from the source text alone, before any workspace exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourcePlan {
    pub language: Language,
    /// Fixed file name; `None` means a random name is picked on write
    pub file_name: Option<String>,
    pub class_name: Option<String>,
}

impl SourcePlan {
    pub fn new(language: Language, code: &str) -> std::result::Result<Self, InputError> {
        let plan = match language {
            Language::Python => Self {
                language,
                file_name: None,
                class_name: None,
            },
            Language::Java => {
                let class_name = extract_public_class(code)?;
                Self {
                    language,
                    file_name: Some(format!("{class_name}.java")),
                    class_name: Some(class_name),
                }
            }
            Language::Cpp => Self {
                language,
                file_name: Some(CPP_SOURCE_NAME.to_string()),
                class_name: None,
            },
        };
        Ok(plan)
    }
}

/// Source written into a workspace, plus everything the command templates need
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub language: Language,
    /// The user's code, byte-for-byte
    pub path: PathBuf,
    /// The file handed to the interpreter; differs from `path` when a launcher wraps it
    pub entry: PathBuf,
    /// Compiled executable location (C++)
    pub output: PathBuf,
    pub class_name: Option<String>,
    pub workspace: PathBuf,
}

impl SourceFile {
    /// Placeholder substitutions for command templates
    pub fn placeholders(&self) -> HashMap<&'static str, String> {
        let mut mapping = HashMap::new();
        mapping.insert("%SOURCE%", self.entry.to_string_lossy().into_owned());
        mapping.insert("%OUTPUT%", self.output.to_string_lossy().into_owned());
        mapping.insert("%WORKSPACE%", self.workspace.to_string_lossy().into_owned());
        mapping.insert("%CLASS%", self.class_name.clone().unwrap_or_default());
        mapping
    }
}

/// Writes the submitted code into the workspace
///
/// `prompt_policy` only affects Python: anything but `Keep` adds a launcher
/// that replaces `input()` and then runs the untouched user file.
pub(crate) fn materialize(
    workspace: &Workspace,
    plan: &SourcePlan,
    code: &str,
    prompt_policy: PromptPolicy,
) -> Result<SourceFile> {
    let path = match &plan.file_name {
        Some(name) => {
            let path = workspace.join(name);
            fs::write(&path, code)
                .map_err(|e| EngineError::io(format!("failed to write {}", path.display()), e))?;
            path
        }
        None => write_random_file(workspace, plan.language, code)?,
    };

    let entry = match (plan.language, prompt_policy) {
        (Language::Python, PromptPolicy::Discard | PromptPolicy::Stderr) => {
            let launcher = workspace.join(PYTHON_LAUNCHER_NAME);
            fs::write(&launcher, python_launcher(&path, prompt_policy)).map_err(|e| {
                EngineError::io(format!("failed to write {}", launcher.display()), e)
            })?;
            launcher
        }
        _ => path.clone(),
    };

    log::debug!("Materialized {} source at {}", plan.language, path.display());
    Ok(SourceFile {
        language: plan.language,
        path,
        entry,
        output: workspace.join(EXECUTABLE_NAME),
        class_name: plan.class_name.clone(),
        workspace: workspace.path().to_path_buf(),
    })
}

fn write_random_file(workspace: &Workspace, language: Language, code: &str) -> Result<PathBuf> {
    let suffix = format!(".{}", language.extension());
    let mut file = tempfile::Builder::new()
        .prefix("main_")
        .suffix(&suffix)
        .tempfile_in(workspace.path())
        .map_err(|e| EngineError::io("failed to create source file", e))?;
    file.write_all(code.as_bytes())
        .map_err(|e| EngineError::io("failed to write source file", e))?;

    // The workspace owns the file from here on
    let (_, path) = file
        .keep()
        .map_err(|e| EngineError::io("failed to persist source file", e.error))?;
    Ok(path)
}

fn python_launcher(user_file: &std::path::Path, policy: PromptPolicy) -> String {
    // A JSON string literal is also a valid Python string literal
    let target = serde_json::to_string(&user_file.to_string_lossy())
        .unwrap_or_else(|_| "\"\"".to_string());
    let prompt = match policy {
        PromptPolicy::Stderr => {
            "    if prompt:\n        sys.stderr.write(str(prompt))\n        sys.stderr.flush()\n"
        }
        _ => "",
    };

    format!(
        r#"import builtins
import runpy
import sys


def _input(prompt=""):
{prompt}    line = sys.stdin.readline()
    if not line:
        raise EOFError("EOF when reading a line")
    return line[:-1] if line.endswith("\n") else line


builtins.input = _input
sys.argv = [{target}]
runpy.run_path({target}, run_name="__main__")
"#
    )
}
