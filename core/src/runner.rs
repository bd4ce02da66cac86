//! Child-process plumbing: compiling and running the target program with
//! an explicit working directory, captured output and a wall-clock limit.

use std::{
    collections::HashMap,
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use anyhow::Context;
use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::Command,
};

/// Env var naming a java security policy file to sandbox graded runs with.
pub const JAVA_POLICY_ENV: &str = "EXERCHECK_JAVA_POLICY";

/// Captured result of one child process execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprocessResult {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit_code: i32,
}

impl SubprocessResult {
    /// Reserved exit code meaning "did not finish within the time limit".
    /// Never produced by a real child; translated into a Timeout verdict
    /// downstream and never surfaced as the tool's own exit code.
    pub const TIMEOUT_EXIT_CODE: i32 = 124;

    pub fn timeout_sentinel() -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: Self::TIMEOUT_EXIT_CODE,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_timeout(&self) -> bool {
        self.exit_code == Self::TIMEOUT_EXIT_CODE
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_owned)
        .collect()
}

/// Spawns `program args..` in `dir` with exactly `env` as environment,
/// feeds `stdin_text` to its standard input and waits for completion.
///
/// With a timeout, expiry kills the child and yields the sentinel result
/// instead of an error: not finishing in time is a first-class outcome,
/// and any partially captured output is discarded.
pub async fn run_command(
    program: impl AsRef<OsStr>,
    args: &[String],
    dir: &Path,
    env: &HashMap<String, String>,
    stdin_text: &str,
    timeout: Option<Duration>,
) -> anyhow::Result<SubprocessResult> {
    let program = program.as_ref();
    let mut proc = Command::new(program)
        .args(args)
        .current_dir(dir)
        .env_clear()
        .envs(env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| {
            format!(
                "Failed to spawn '{} {}' in {}",
                program.to_string_lossy(),
                args.join(" "),
                dir.display()
            )
        })?;

    let mut stdin = proc.stdin.take().context("Failed to open stdin")?;
    let mut stdout = proc.stdout.take().context("Failed to open stdout")?;
    let mut stderr = proc.stderr.take().context("Failed to open stderr")?;

    // A child that exits without draining stdin breaks the pipe; that is
    // its own business, not a harness failure.
    if let Err(e) = stdin.write_all(stdin_text.as_bytes()).await {
        log::debug!("Could not pass input-data to stdin: {}", e);
    }
    drop(stdin); // NOTE: this line is essential

    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    let res = {
        let fut_stdout = stdout.read_to_end(&mut stdout_buf);
        let fut_stderr = stderr.read_to_end(&mut stderr_buf);
        let fut_exit_status = proc.wait();

        let communicate = async {
            tokio::try_join!(fut_stdout, fut_stderr, fut_exit_status)
                .context("Failed to communicate with subprocess")
        };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, communicate).await,
            None => Ok(communicate.await),
        }
    };

    match res {
        Err(_) => {
            proc.kill()
                .await
                .unwrap_or_else(|e| log::warn!("Failed to kill timed-out process: {:#}", e));
            Ok(SubprocessResult::timeout_sentinel())
        }
        Ok(Err(e)) => Err(e),
        Ok(Ok((_, _, exit_status))) => Ok(SubprocessResult {
            stdout: split_lines(&stdout_buf),
            stderr: split_lines(&stderr_buf),
            exit_code: exit_status.code().unwrap_or(-1),
        }),
    }
}

/// Seam the orchestrator runs against; lets tests substitute a scripted
/// toolchain for the real javac/java pair.
#[async_trait]
pub trait Toolchain {
    /// Compiles `program_file` inside `dir`, after removing every stale
    /// build artifact so a compile failure cannot be masked.
    async fn compile(&self, program_file: &str, dir: &Path) -> anyhow::Result<SubprocessResult>;

    /// Runs `class_name` inside `dir`. `sandboxed` requests the security
    /// policy wrapping used for graded runs (not for tooling like the
    /// JUnit launcher).
    async fn run(
        &self,
        class_name: &str,
        dir: &Path,
        stdin_text: &str,
        args: &[String],
        timeout: Duration,
        sandboxed: bool,
    ) -> anyhow::Result<SubprocessResult>;
}

#[derive(Debug, Clone)]
pub struct JavaToolchain {
    env: HashMap<String, String>,
    policy_file: Option<PathBuf>,
}

impl JavaToolchain {
    const COMPILED_ARTIFACT_GLOB: &str = "*.class";

    /// Builds the child environment from the parent one, with the support
    /// dir appended to CLASSPATH (the JUnit jars live there).
    pub fn new(support_dir: &Path) -> Self {
        let mut env: HashMap<String, String> = std::env::vars().collect();
        let support = support_dir.display().to_string();
        let classpath = match env.get("CLASSPATH") {
            Some(cp) if cp.split(':').any(|p| Path::new(p) == support_dir) => cp.clone(),
            Some(cp) if !cp.is_empty() => format!("{}:{}", cp, support),
            _ => format!(".:{}", support),
        };
        env.insert("CLASSPATH".to_owned(), classpath);

        let policy_file = env.get(JAVA_POLICY_ENV).map(PathBuf::from);
        Self { env, policy_file }
    }
}

#[async_trait]
impl Toolchain for JavaToolchain {
    async fn compile(&self, program_file: &str, dir: &Path) -> anyhow::Result<SubprocessResult> {
        fsutil::remove_files_matching(dir, Self::COMPILED_ARTIFACT_GLOB)?;
        run_command(
            "javac",
            &[program_file.to_owned()],
            dir,
            &self.env,
            "",
            None,
        )
        .await
    }

    async fn run(
        &self,
        class_name: &str,
        dir: &Path,
        stdin_text: &str,
        args: &[String],
        timeout: Duration,
        sandboxed: bool,
    ) -> anyhow::Result<SubprocessResult> {
        let mut argv = Vec::with_capacity(args.len() + 3);
        if sandboxed {
            if let Some(policy) = &self.policy_file {
                argv.push("-Djava.security.manager".to_owned());
                argv.push(format!("-Djava.security.policy={}", policy.display()));
            }
        }
        argv.push(class_name.to_owned());
        argv.extend(args.iter().cloned());
        run_command("java", &argv, dir, &self.env, stdin_text, Some(timeout)).await
    }
}
