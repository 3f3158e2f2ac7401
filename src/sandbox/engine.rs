use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{EngineConfig, PromptPolicy};
use crate::error::{EngineError, InputError, Result};

use super::compile::{CompileOutcome, compile_source};
use super::materialize::{SourceFile, SourcePlan, materialize};
use super::testing::{SubmissionVerdict, evaluate};
use super::workspace::{Workspace, prepare_root};
use super::{Language, ProcessSpec, RunResult, Submission, TestCase, run_process};

const PROBE_TIME_LIMIT: Duration = Duration::from_secs(10);

/// Entry point of the execution engine
///
/// Every call owns exactly one workspace, so an `Engine` can be shared
/// between any number of concurrent callers.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    workspace_root: PathBuf,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let workspace_root = prepare_root(config.workspace_root.as_deref())?;
        log::info!("Engine workspaces live in {}", workspace_root.display());
        Ok(Self {
            config,
            workspace_root,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Compiles if needed and runs the code once with the submission's stdin
    ///
    /// Uses the language's interactive time limit. A compile failure comes
    /// back as a result whose stderr carries the diagnostics.
    pub async fn run_once(&self, submission: &Submission) -> Result<RunResult> {
        let plan = validate(submission)?;

        let workspace = Workspace::acquire(&self.workspace_root)?;
        let result = self.run_in(&workspace, &plan, submission).await;
        workspace.release();

        log_outcome("run", submission.language, &result);
        result
    }

    /// Compiles if needed and judges the code against every test case
    pub async fn check_against_tests(
        &self,
        submission: &Submission,
        testcases: &[TestCase],
    ) -> Result<SubmissionVerdict> {
        let plan = validate(submission)?;
        if testcases.is_empty() {
            return Err(InputError::NoTestCases.into());
        }

        let workspace = Workspace::acquire(&self.workspace_root)?;
        let result = self.check_in(&workspace, &plan, submission, testcases).await;
        workspace.release();

        if let Ok(verdict) = &result {
            log::info!(
                "Checked {} submission: {}/{} passed{}",
                submission.language,
                verdict.passed,
                verdict.total,
                if verdict.is_compile_failure() {
                    " (compilation failed)"
                } else {
                    ""
                }
            );
        }
        log_outcome("check", submission.language, &result);
        result
    }

    /// Spawns every configured toolchain program once with `--version`
    pub async fn probe_toolchains(&self) -> Vec<(Language, Result<()>)> {
        let mut report = Vec::new();
        for language in Language::ALL {
            report.push((language, self.probe(language).await));
        }
        report
    }

    async fn probe(&self, language: Language) -> Result<()> {
        let language_config = self.config.languages.get(language);
        let templates = language_config
            .compile
            .iter()
            .chain(std::iter::once(&language_config.run));

        for template in templates {
            // Placeholder programs (e.g. the compiled executable) only exist per submission
            let Some(program) = template.first().filter(|p| !p.contains('%')) else {
                continue;
            };
            let spec = ProcessSpec {
                program: program.clone(),
                args: vec!["--version".to_string()],
                current_dir: self.workspace_root.clone(),
            };
            run_process(&spec, "", PROBE_TIME_LIMIT, self.output_limit()).await?;
        }
        Ok(())
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        plan: &SourcePlan,
        submission: &Submission,
    ) -> Result<RunResult> {
        let language_config = self.config.languages.get(submission.language);
        // Interactive runs show prompts as written
        let source = materialize(workspace, plan, &submission.code, PromptPolicy::Keep)?;

        if let CompileOutcome::Failed(diagnostics) = self.compile(&source).await? {
            return Ok(RunResult::compile_failure(&diagnostics));
        }

        let program = self.run_command(&source)?;
        run_process(
            &program,
            submission.stdin(),
            language_config.run_time_limit.into(),
            self.output_limit(),
        )
        .await
    }

    async fn check_in(
        &self,
        workspace: &Workspace,
        plan: &SourcePlan,
        submission: &Submission,
        testcases: &[TestCase],
    ) -> Result<SubmissionVerdict> {
        let source = materialize(
            workspace,
            plan,
            &submission.code,
            self.config.prompt_policy,
        )?;

        if let CompileOutcome::Failed(diagnostics) = self.compile(&source).await? {
            return Ok(SubmissionVerdict::compile_failure(
                diagnostics,
                testcases.len(),
            ));
        }

        let program = self.run_command(&source)?;
        evaluate(
            &program,
            testcases,
            self.config.limits.test_time_limit.into(),
            self.output_limit(),
        )
        .await
    }

    async fn compile(&self, source: &SourceFile) -> Result<CompileOutcome> {
        compile_source(
            source,
            self.config.languages.get(source.language),
            self.config.limits.compile_time_limit.into(),
            self.output_limit(),
        )
        .await
    }

    fn run_command(&self, source: &SourceFile) -> Result<ProcessSpec> {
        let template = &self.config.languages.get(source.language).run;
        ProcessSpec::from_template(template, &source.placeholders(), &source.workspace)
            .ok_or(EngineError::EmptyCommand(source.language))
    }

    fn output_limit(&self) -> usize {
        self.config.limits.output_limit.0 as usize
    }
}

/// Input checks that must pass before any workspace or process exists
fn validate(submission: &Submission) -> Result<SourcePlan> {
    if submission.code.trim().is_empty() {
        return Err(InputError::EmptySource.into());
    }
    Ok(SourcePlan::new(submission.language, &submission.code)?)
}

fn log_outcome<T>(operation: &str, language: Language, result: &Result<T>) {
    match result {
        Ok(_) => {}
        Err(EngineError::Input(e)) => log::debug!("Rejected {language} {operation}: {e}"),
        Err(e) if e.is_configuration() => {
            log::error!("Configuration error during {language} {operation}: {e}")
        }
        Err(e) => log::error!("Engine failure during {language} {operation}: {e:?}"),
    }
}
