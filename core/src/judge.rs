//! Test orchestration: compile once, then run each declared test case in
//! declaration order, classify the outcome and stop at the first failure
//! (the grading default; a keep-going mode is opt-in).

use std::path::{Path, PathBuf};

use crate::compare::{self, ComparisonOutcome, DivergenceKind};
use crate::error::Result;
use crate::runner::{SubprocessResult, Toolchain};
use crate::spec::{ExerciseSpec, TestCase};

pub const JUNIT_CLASS_NAME: &str = "TestExercise";
pub const JUNIT_FILE_NAME: &str = "TestExercise.java";
const JUNIT_LAUNCHER_CLASS: &str = "org.junit.platform.console.ConsoleLauncher";

/// First point of divergence plus both full line sequences, as the
/// presenter needs them for the annotated listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub expected_index: usize,
    pub found_index: usize,
    pub expected: Vec<String>,
    pub found: Vec<String>,
}

impl Divergence {
    pub fn kind(&self) -> DivergenceKind {
        compare::classify_divergence(
            self.expected_index,
            self.found_index,
            self.expected.len(),
            self.found.len(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Mismatch(Divergence),
    Timeout,
    Crash { stderr: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum VerdictCode {
    Pass,
    Mismatch,
    Timeout,
    Crash,
}

impl Verdict {
    pub fn code(&self) -> VerdictCode {
        match self {
            Self::Pass => VerdictCode::Pass,
            Self::Mismatch(_) => VerdictCode::Mismatch,
            Self::Timeout => VerdictCode::Timeout,
            Self::Crash { .. } => VerdictCode::Crash,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    pub id: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoRunOutcome {
    /// Compiler rejected the program; fatal for the whole run, no test
    /// case was executed.
    CompileError {
        program: String,
        stderr: Vec<String>,
    },
    /// One report per executed test case, in declaration order.
    Completed(Vec<TestReport>),
}

impl IoRunOutcome {
    pub fn all_passed(&self) -> bool {
        match self {
            Self::CompileError { .. } => false,
            Self::Completed(reports) => reports.iter().all(|r| r.verdict.is_pass()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JunitOutcome {
    CompileError { stderr: Vec<String> },
    Passed,
    Failed { output: Vec<String> },
}

#[derive(Debug)]
pub struct Orchestrator<'a, T> {
    toolchain: &'a T,
    spec: &'a ExerciseSpec,
    staging_dir: PathBuf,
    halt_on_failure: bool,
}

impl<'a, T: Toolchain> Orchestrator<'a, T> {
    pub fn new(toolchain: &'a T, spec: &'a ExerciseSpec, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            spec,
            staging_dir: staging_dir.into(),
            halt_on_failure: true,
        }
    }

    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub async fn run_io_tests(&self) -> Result<IoRunOutcome> {
        if self.spec.tests.is_empty() {
            return Ok(IoRunOutcome::Completed(Vec::new()));
        }

        let program = self.spec.main_program()?;
        let main_class = self.spec.main_class()?;

        log::info!("Compiling {}", program);
        let compiled = self.toolchain.compile(&program, &self.staging_dir).await?;
        if !compiled.success() {
            return Ok(IoRunOutcome::CompileError {
                program,
                stderr: compiled.stderr,
            });
        }

        let mut reports = Vec::with_capacity(self.spec.tests.len());
        for case in &self.spec.tests {
            log::info!("Running test {}", case.id);
            let res = self
                .toolchain
                .run(
                    main_class,
                    &self.staging_dir,
                    &case.stdin_text(),
                    case.args(),
                    self.spec.timeout,
                    true,
                )
                .await?;
            let verdict = self.classify(case, res);
            log::info!("Test {}: {}", case.id, verdict.code());
            let halt = self.halt_on_failure && !verdict.is_pass();
            reports.push(TestReport {
                id: case.id.clone(),
                verdict,
            });
            if halt {
                break;
            }
        }
        Ok(IoRunOutcome::Completed(reports))
    }

    fn classify(&self, case: &TestCase, res: SubprocessResult) -> Verdict {
        if res.is_timeout() {
            return Verdict::Timeout;
        }
        if !res.success() {
            return Verdict::Crash { stderr: res.stderr };
        }
        // Without a declared expected output only the exit status counts.
        let Some(expected) = &case.expected_stdout else {
            return Verdict::Pass;
        };
        let found = match &self.spec.translation {
            Some(tr) => tr.apply(&res.stdout),
            None => res.stdout,
        };
        match compare::compare_lines(expected, &found, self.spec.ignore_blank_lines) {
            ComparisonOutcome::Equal => Verdict::Pass,
            ComparisonOutcome::Diverged {
                expected: expected_index,
                found: found_index,
            } => Verdict::Mismatch(Divergence {
                expected_index,
                found_index,
                expected: expected.clone(),
                found,
            }),
        }
    }

    /// Compiles and runs the companion JUnit suite staged as
    /// `TestExercise.java`. Pass/fail is the launcher's exit status.
    pub async fn run_junit_tests(&self) -> Result<JunitOutcome> {
        let compiled = self
            .toolchain
            .compile(JUNIT_FILE_NAME, &self.staging_dir)
            .await?;
        if !compiled.success() {
            return Ok(JunitOutcome::CompileError {
                stderr: compiled.stderr,
            });
        }

        let args: Vec<String> = [
            "-c",
            JUNIT_CLASS_NAME,
            "--disable-banner",
            "--fail-if-no-tests",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect();

        let res = self
            .toolchain
            .run(
                JUNIT_LAUNCHER_CLASS,
                &self.staging_dir,
                "",
                &args,
                self.spec.timeout,
                false,
            )
            .await?;
        if res.success() {
            Ok(JunitOutcome::Passed)
        } else {
            Ok(JunitOutcome::Failed { output: res.stdout })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spec::TranslationTable;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StubToolchain {
        compile: SubprocessResult,
        runs: Mutex<VecDeque<SubprocessResult>>,
    }

    impl StubToolchain {
        fn new(compile: SubprocessResult, runs: Vec<SubprocessResult>) -> Self {
            Self {
                compile,
                runs: Mutex::new(runs.into()),
            }
        }

        fn compiling_fine(runs: Vec<SubprocessResult>) -> Self {
            Self::new(ok(&[], &[]), runs)
        }

        fn pending_runs(&self) -> usize {
            self.runs.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Toolchain for StubToolchain {
        async fn compile(
            &self,
            _program_file: &str,
            _dir: &std::path::Path,
        ) -> anyhow::Result<SubprocessResult> {
            Ok(self.compile.clone())
        }

        async fn run(
            &self,
            _class_name: &str,
            _dir: &std::path::Path,
            _stdin_text: &str,
            _args: &[String],
            _timeout: Duration,
            _sandboxed: bool,
        ) -> anyhow::Result<SubprocessResult> {
            Ok(self.runs.lock().unwrap().pop_front().expect("scripted run"))
        }
    }

    fn ok(stdout: &[&str], stderr: &[&str]) -> SubprocessResult {
        exited(0, stdout, stderr)
    }

    fn exited(exit_code: i32, stdout: &[&str], stderr: &[&str]) -> SubprocessResult {
        SubprocessResult {
            stdout: stdout.iter().map(|s| s.to_string()).collect(),
            stderr: stderr.iter().map(|s| s.to_string()).collect(),
            exit_code,
        }
    }

    fn spec_yaml(yaml: &str) -> ExerciseSpec {
        ExerciseSpec::from_yaml_str(yaml).unwrap()
    }

    const SUM_SPEC: &str = r#"
_mainclass: Sum
sum-small:
  stdin: ["3", "4"]
  stdout: "7"
sum-large:
  stdin: ["30", "40"]
  stdout: "70"
"#;

    #[tokio::test]
    async fn all_tests_passing() {
        let spec = spec_yaml(SUM_SPEC);
        let toolchain = StubToolchain::compiling_fine(vec![ok(&["7"], &[]), ok(&["70"], &[])]);
        let outcome = Orchestrator::new(&toolchain, &spec, "/tmp/x")
            .run_io_tests()
            .await
            .unwrap();

        assert!(outcome.all_passed());
        let IoRunOutcome::Completed(reports) = outcome else {
            panic!()
        };
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].id, "sum-small");
        assert_eq!(reports[1].id, "sum-large");
    }

    #[tokio::test]
    async fn mismatch_halts_the_run_by_default() {
        let spec = spec_yaml(SUM_SPEC);
        let toolchain = StubToolchain::compiling_fine(vec![ok(&["8"], &[]), ok(&["70"], &[])]);
        let outcome = Orchestrator::new(&toolchain, &spec, "/tmp/x")
            .run_io_tests()
            .await
            .unwrap();

        let IoRunOutcome::Completed(reports) = outcome else {
            panic!()
        };
        assert_eq!(reports.len(), 1);
        let Verdict::Mismatch(d) = &reports[0].verdict else {
            panic!("expected mismatch, got {:?}", reports[0].verdict)
        };
        assert_eq!((d.expected_index, d.found_index), (0, 0));
        assert_eq!(d.expected, vec!["7"]);
        assert_eq!(d.found, vec!["8"]);
        assert_eq!(d.kind(), DivergenceKind::DifferentLine);
        // Second scripted run must not have been consumed.
        assert_eq!(toolchain.pending_runs(), 1);
    }

    #[tokio::test]
    async fn keep_going_mode_reports_every_case() {
        let spec = spec_yaml(SUM_SPEC);
        let toolchain = StubToolchain::compiling_fine(vec![ok(&["8"], &[]), ok(&["70"], &[])]);
        let outcome = Orchestrator::new(&toolchain, &spec, "/tmp/x")
            .halt_on_failure(false)
            .run_io_tests()
            .await
            .unwrap();

        let IoRunOutcome::Completed(reports) = outcome else {
            panic!()
        };
        assert_eq!(reports.len(), 2);
        assert!(!reports[0].verdict.is_pass());
        assert!(reports[1].verdict.is_pass());
    }

    #[tokio::test]
    async fn timeout_sentinel_becomes_timeout_verdict() {
        let spec = spec_yaml(SUM_SPEC);
        let toolchain =
            StubToolchain::compiling_fine(vec![SubprocessResult::timeout_sentinel()]);
        let outcome = Orchestrator::new(&toolchain, &spec, "/tmp/x")
            .run_io_tests()
            .await
            .unwrap();

        let IoRunOutcome::Completed(reports) = outcome else {
            panic!()
        };
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].verdict, Verdict::Timeout);
    }

    #[tokio::test]
    async fn nonzero_exit_becomes_crash_with_captured_stderr() {
        let spec = spec_yaml(SUM_SPEC);
        let toolchain = StubToolchain::compiling_fine(vec![exited(
            1,
            &[],
            &["Exception in thread \"main\"", "\tat Sum.main(Sum.java:3)"],
        )]);
        let outcome = Orchestrator::new(&toolchain, &spec, "/tmp/x")
            .run_io_tests()
            .await
            .unwrap();

        let IoRunOutcome::Completed(reports) = outcome else {
            panic!()
        };
        let Verdict::Crash { stderr } = &reports[0].verdict else {
            panic!()
        };
        assert_eq!(stderr.len(), 2);
    }

    #[tokio::test]
    async fn compile_failure_is_fatal_and_runs_nothing() {
        let spec = spec_yaml(SUM_SPEC);
        let toolchain = StubToolchain::new(
            exited(1, &[], &["Sum.java:1: error: ';' expected"]),
            vec![ok(&["7"], &[])],
        );
        let outcome = Orchestrator::new(&toolchain, &spec, "/tmp/x")
            .run_io_tests()
            .await
            .unwrap();

        assert!(!outcome.all_passed());
        let IoRunOutcome::CompileError { program, stderr } = outcome else {
            panic!()
        };
        assert_eq!(program, "Sum.java");
        assert_eq!(stderr.len(), 1);
        assert_eq!(toolchain.pending_runs(), 1);
    }

    #[tokio::test]
    async fn translation_is_applied_before_comparison() {
        let mut spec = spec_yaml(SUM_SPEC);
        spec.translation = Some(TranslationTable::new("8", "7").unwrap());
        let toolchain = StubToolchain::compiling_fine(vec![ok(&["8"], &[]), ok(&["70"], &[])]);
        let outcome = Orchestrator::new(&toolchain, &spec, "/tmp/x")
            .run_io_tests()
            .await
            .unwrap();
        assert!(outcome.all_passed());
    }

    #[tokio::test]
    async fn missing_expected_output_only_checks_exit_status() {
        let spec = spec_yaml("_mainclass: M\njust-runs:\n");
        let toolchain = StubToolchain::compiling_fine(vec![ok(&["anything", "at all"], &[])]);
        let outcome = Orchestrator::new(&toolchain, &spec, "/tmp/x")
            .run_io_tests()
            .await
            .unwrap();
        assert!(outcome.all_passed());
    }

    #[tokio::test]
    async fn junit_pass_and_fail_follow_launcher_exit_code() {
        let spec = spec_yaml("_mainclass: M\n");

        let toolchain = StubToolchain::compiling_fine(vec![ok(&[], &[])]);
        let orch = Orchestrator::new(&toolchain, &spec, "/tmp/x");
        assert_eq!(orch.run_junit_tests().await.unwrap(), JunitOutcome::Passed);

        let toolchain =
            StubToolchain::compiling_fine(vec![exited(1, &["Failures (1):"], &[])]);
        let orch = Orchestrator::new(&toolchain, &spec, "/tmp/x");
        let JunitOutcome::Failed { output } = orch.run_junit_tests().await.unwrap() else {
            panic!()
        };
        assert_eq!(output, vec!["Failures (1):"]);
    }

    #[test]
    fn verdict_codes_render_by_name() {
        assert_eq!(Verdict::Pass.code().to_string(), "Pass");
        assert_eq!(Verdict::Timeout.code().to_string(), "Timeout");
        assert_eq!(
            Verdict::Crash { stderr: vec![] }.code().to_string(),
            "Crash"
        );
        let d = Divergence {
            expected_index: 0,
            found_index: 0,
            expected: vec![],
            found: vec![],
        };
        assert_eq!(Verdict::Mismatch(d).code(), VerdictCode::Mismatch);
    }

    #[tokio::test]
    async fn junit_compile_error_is_reported_as_such() {
        let spec = spec_yaml("_mainclass: M\n");
        let toolchain = StubToolchain::new(exited(1, &[], &["bad test file"]), vec![]);
        let orch = Orchestrator::new(&toolchain, &spec, "/tmp/x");
        assert_eq!(
            orch.run_junit_tests().await.unwrap(),
            JunitOutcome::CompileError {
                stderr: vec!["bad test file".to_owned()]
            }
        );
    }
}
