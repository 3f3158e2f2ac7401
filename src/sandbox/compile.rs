use std::time::Duration;

use crate::config::LanguageConfig;
use crate::error::{EngineError, Result};

use super::{Language, ProcessSpec, SourceFile, run_process};

pub(crate) const COMPILE_TIMEOUT_MESSAGE: &str = "compilation timed out";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Succeeded,
    /// Raw compiler diagnostics
    Failed(String),
}

impl CompileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileOutcome::Succeeded)
    }
}

/// Compiles the source without running anything
///
/// A no-op for interpreted languages. Compiler diagnostics are passed through
/// verbatim; exceeding the time limit is reported as a failed compilation.
pub(crate) async fn compile_source(
    source: &SourceFile,
    language_config: &LanguageConfig,
    time_limit: Duration,
    output_limit: usize,
) -> Result<CompileOutcome> {
    let Some(template) = &language_config.compile else {
        return Ok(CompileOutcome::Succeeded);
    };

    let command = ProcessSpec::from_template(template, &source.placeholders(), &source.workspace)
        .ok_or(EngineError::EmptyCommand(source.language))?;

    log::debug!("Compiling {} source with `{command}`", source.language);
    let result = run_process(&command, "", time_limit, output_limit).await?;

    if result.timed_out {
        log::info!("Compilation of {} exceeded {time_limit:?}", source.language);
        return Ok(CompileOutcome::Failed(COMPILE_TIMEOUT_MESSAGE.to_string()));
    }

    if result.exit_code != 0 {
        // Some compilers report on stdout
        let diagnostics = if result.stderr.is_empty() {
            result.stdout
        } else {
            result.stderr
        };
        return Ok(CompileOutcome::Failed(diagnostics));
    }

    if source.language == Language::Cpp && !source.output.exists() {
        return Ok(CompileOutcome::Failed(format!(
            "compiler exited successfully but produced no executable at {}",
            source.output.display()
        )));
    }

    Ok(CompileOutcome::Succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MilliSecond, PromptPolicy};
    use crate::sandbox::Workspace;
    use crate::sandbox::materialize::{SourcePlan, materialize};

    fn fake_compiler(script: &str) -> LanguageConfig {
        LanguageConfig {
            compile: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                script.to_string(),
            ]),
            run: vec!["%OUTPUT%".to_string()],
            run_time_limit: MilliSecond(1000),
        }
    }

    fn source_in(workspace: &Workspace, language: Language, code: &str) -> SourceFile {
        let plan = SourcePlan::new(language, code).unwrap();
        materialize(workspace, &plan, code, PromptPolicy::Keep).unwrap()
    }

    #[tokio::test]
    async fn test_interpreted_language_is_noop() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::acquire(root.path()).unwrap();
        let source = source_in(&workspace, Language::Python, "print(1)");
        let config = LanguageConfig {
            compile: None,
            run: vec!["python3".to_string(), "%SOURCE%".to_string()],
            run_time_limit: MilliSecond(1000),
        };

        let outcome = compile_source(&source, &config, Duration::from_secs(1), 1024)
            .await
            .unwrap();
        assert_eq!(outcome, CompileOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_failure_keeps_diagnostics_verbatim() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::acquire(root.path()).unwrap();
        let source = source_in(&workspace, Language::Cpp, "int main() {");
        let config = fake_compiler("printf 'main.cpp:1:13: error: expected }\\n' >&2; exit 1");

        let outcome = compile_source(&source, &config, Duration::from_secs(5), 1 << 16)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CompileOutcome::Failed("main.cpp:1:13: error: expected }\n".to_string())
        );
    }

    #[tokio::test]
    async fn test_timeout_is_classified_failure() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::acquire(root.path()).unwrap();
        let source = source_in(&workspace, Language::Cpp, "int main() {}");
        let config = fake_compiler("sleep 30");

        let outcome = compile_source(&source, &config, Duration::from_millis(200), 1024)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CompileOutcome::Failed(COMPILE_TIMEOUT_MESSAGE.to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_executable_is_failure() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::acquire(root.path()).unwrap();
        let source = source_in(&workspace, Language::Cpp, "int main() {}");
        let config = fake_compiler("true");

        let outcome = compile_source(&source, &config, Duration::from_secs(5), 1024)
            .await
            .unwrap();
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_success_with_placeholders() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::acquire(root.path()).unwrap();
        let source = source_in(&workspace, Language::Cpp, "int main() {}");
        let config = fake_compiler("test -f main.cpp && touch main");

        let outcome = compile_source(&source, &config, Duration::from_secs(5), 1024)
            .await
            .unwrap();
        assert_eq!(outcome, CompileOutcome::Succeeded);
        assert!(source.output.exists());
    }
}
