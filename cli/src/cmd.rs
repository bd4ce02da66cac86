use std::path::{Path, PathBuf};
use std::process::ExitCode;

use exercheck_core::{
    judge::{IoRunOutcome, JunitOutcome, Orchestrator, JUNIT_FILE_NAME},
    paths::Layout,
    report::Presenter,
    runner::JavaToolchain,
    spec::ExerciseSpec,
    vcs::VcsGuard,
    Error, Result,
};

use crate::util;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about = "Evaluates your programming exercises before you hand them in",
    long_about = None
)]
pub struct Args {
    /// Path to the repository holding your exercises
    #[arg(short = 'd', long, value_name = "path")]
    pub workdir: Option<PathBuf>,

    /// Print the working directory and exit
    #[arg(short = 'p', long)]
    pub show_workdir: bool,

    /// Print the path of the exercise under evaluation and exit
    #[arg(short = 't', long)]
    pub show_target: bool,

    /// Path to the exercise spec file (or the directory holding it)
    #[arg(short = 's', long, value_name = "path")]
    pub specs: Option<PathBuf>,

    /// Copy the JUnit test file into the exercise folder and exit
    #[arg(short = 'j', long)]
    pub copy_junit: bool,

    /// Report every failing test instead of stopping at the first one
    #[arg(short = 'k', long)]
    pub keep_going: bool,
}

pub async fn exec(args: &Args, presenter: &Presenter<'_>) -> Result<ExitCode> {
    let layout = Layout::resolve(args.workdir.as_deref(), &util::current_dir())?;

    if args.show_workdir {
        println!("{}", layout.working_dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    let spec = ExerciseSpec::from_file(layout.spec_file(args.specs.as_deref())?)?;

    if args.show_target {
        println!("{}", layout.target_dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    let junit_src = layout.junit_file(args.specs.as_deref())?;
    let has_junit = junit_src.is_file();

    if !is_testable(&spec) {
        presenter.exercise_without_tests();
        return Ok(ExitCode::SUCCESS);
    }

    if args.copy_junit {
        return copy_junit_to_target(&layout, &junit_src, has_junit);
    }

    layout.ensure_sources_compiled()?;

    if layout.protected {
        VcsGuard::new(&layout)?.ensure_committed()?;
    }

    let staging = layout.prepare_staging()?;
    let toolchain = JavaToolchain::new(&layout.support_dir()?);
    let orchestrator =
        Orchestrator::new(&toolchain, &spec, &staging).halt_on_failure(!args.keep_going);

    if !spec.tests.is_empty() {
        match orchestrator.run_io_tests().await? {
            IoRunOutcome::CompileError { program, stderr } => {
                presenter.compile_error(&program, &stderr);
                return Ok(ExitCode::FAILURE);
            }
            IoRunOutcome::Completed(reports) => {
                let mut failed = false;
                for report in &reports {
                    if report.verdict.is_pass() {
                        presenter.test_passed(&report.id);
                    } else {
                        let case = spec
                            .tests
                            .iter()
                            .find(|c| c.id == report.id)
                            .expect("report ids come from the spec");
                        presenter.show_io_failure(&spec, case, &report.verdict);
                        failed = true;
                    }
                }
                if failed {
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    if has_junit {
        fsutil::copy_file(&junit_src, staging.join(JUNIT_FILE_NAME))?;
        let outcome = orchestrator.run_junit_tests().await?;
        presenter.show_junit_outcome(&outcome);
        if outcome != JunitOutcome::Passed {
            return Ok(ExitCode::FAILURE);
        }
    }

    presenter.all_tests_passed();
    Ok(ExitCode::SUCCESS)
}

/// An exercise with an empty spec mapping is not testable, even when a
/// JUnit file ships next to its spec; a JUnit exercise declares at
/// least `_mainclass`.
fn is_testable(spec: &ExerciseSpec) -> bool {
    !spec.is_empty()
}

fn copy_junit_to_target(layout: &Layout, junit_src: &Path, has_junit: bool) -> Result<ExitCode> {
    if !has_junit {
        return Err(Error::user("This exercise has no unit tests"));
    }
    let dest = layout.target_dir.join(JUNIT_FILE_NAME);
    if dest.exists() {
        return Err(Error::user(format!(
            "A file named {} already exists",
            JUNIT_FILE_NAME
        )));
    }
    fsutil::copy_file(junit_src, &dest)?;
    println!("You will find the JUnit tests in the file {}", JUNIT_FILE_NAME);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_spec_is_not_testable_even_with_a_shipped_junit_suite() {
        let empty = ExerciseSpec::from_yaml_str("").unwrap();
        assert!(!is_testable(&empty));

        let junit_only = ExerciseSpec::from_yaml_str("_mainclass: M\n").unwrap();
        assert!(is_testable(&junit_only));
    }
}
