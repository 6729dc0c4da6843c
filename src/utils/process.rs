//! Process execution utilities
//!
//! Every external tool (build script, `jam`, `packager`, `pack`, `docker`)
//! is invoked through [`ToolRunner`]. Calls block until the tool exits.

use crate::error::{PackagerError, Result};
use std::{
    fmt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::{debug, info, instrument};

/// A single external tool call: program, arguments, environment and working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Program to run, either a bare name or a path
    pub program: PathBuf,
    /// Arguments in order
    pub args: Vec<String>,
    /// Extra environment variables layered on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Working directory, inherited when `None`
    pub current_dir: Option<PathBuf>,
    /// Capture stdout/stderr instead of streaming them to the terminal
    pub capture_output: bool,
}

impl ToolInvocation {
    /// Start an invocation of `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            capture_output: false,
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a path argument
    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Append several arguments in order
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Layer environment variables over the inherited environment
    #[must_use]
    pub fn envs(mut self, vars: &[(String, String)]) -> Self {
        self.env.extend_from_slice(vars);
        self
    }

    /// Run the tool from `dir`
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Keep the tool's output so a failure carries it in [`PackagerError::ExternalTool`]
    #[must_use]
    pub fn captured(mut self) -> Self {
        self.capture_output = true;
        self
    }

    /// Name of the program without its directory, used to identify tools in logs
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map_or_else(|| self.program.to_string_lossy(), |n| n.to_string_lossy())
            .into_owned()
    }

    /// Value following `flag` in the argument list, if any
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// All values passed with a repeatable `flag`, in order
    pub fn flag_values(&self, flag: &str) -> Vec<&str> {
        self.args
            .windows(2)
            .filter(|pair| pair[0] == flag)
            .map(|pair| pair[1].as_str())
            .collect()
    }

    /// Value of an environment variable set on this invocation
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Seam between the pipeline and the external tools it drives
pub trait ToolRunner {
    /// Run the invocation to completion, failing on a non-zero exit
    fn run(&self, invocation: &ToolInvocation) -> Result<()>;
}

/// Utility for running external processes
#[derive(Debug)]
pub struct ProcessRunner {
    debug: bool,
}

impl ProcessRunner {
    /// Create a new process runner
    #[must_use]
    pub const fn new(debug: bool) -> Self {
        Self { debug }
    }

    fn command(invocation: &ToolInvocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &invocation.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run an invocation, inheriting stdout/stderr so tool output stays visible
    #[instrument(skip(self, invocation), fields(tool = %invocation.program_name()))]
    pub fn run_inherited(&self, invocation: &ToolInvocation) -> Result<()> {
        let cmd_str = invocation.to_string();

        if self.debug {
            debug!("Running command: {}", cmd_str);
            if !invocation.env.is_empty() {
                debug!("Environment variables: {:?}", invocation.env);
            }
            if let Some(dir) = &invocation.current_dir {
                debug!("Working directory: {}", dir.display());
            }
        } else {
            info!("+ {}", cmd_str);
        }

        let status = Self::command(invocation)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| {
                PackagerError::external_tool(
                    cmd_str.clone(),
                    None,
                    String::new(),
                    format!("Failed to execute command: {e}"),
                )
            })?;

        if !status.success() {
            let exit_code = status.code();
            return Err(PackagerError::external_tool(
                cmd_str,
                exit_code,
                String::new(),
                format!("Command failed with exit code: {exit_code:?}"),
            ));
        }

        debug!("Command completed successfully");
        Ok(())
    }

    /// Run an invocation and capture its output, returning stdout.
    ///
    /// A non-zero exit carries the captured stdout and stderr in the error.
    #[instrument(skip(self, invocation), fields(tool = %invocation.program_name()))]
    pub fn run_with_output(&self, invocation: &ToolInvocation) -> Result<String> {
        let cmd_str = invocation.to_string();
        if self.debug {
            debug!("Running command with output capture: {}", cmd_str);
        } else {
            info!("+ {}", cmd_str);
        }

        let output = Self::command(invocation)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                PackagerError::external_tool(
                    cmd_str.clone(),
                    None,
                    String::new(),
                    format!("Failed to execute command: {e}"),
                )
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let success = output.status.success();
        let exit_code = output.status.code();

        debug!(
            "Command finished: success={}, exit_code={:?}, stdout_len={}, stderr_len={}",
            success,
            exit_code,
            stdout.len(),
            stderr.len()
        );

        if !success {
            return Err(PackagerError::external_tool(cmd_str, exit_code, stdout, stderr));
        }

        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", invocation.program_name(), stderr.trim());
        }
        Ok(stdout)
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<()> {
        if invocation.capture_output {
            let stdout = self.run_with_output(invocation)?;
            if !stdout.trim().is_empty() {
                info!("{}", stdout.trim());
            }
            Ok(())
        } else {
            self.run_inherited(invocation)
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(false)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_runner_creation() {
        let runner = ProcessRunner::new(true);
        assert!(runner.debug);

        let runner = ProcessRunner::default();
        assert!(!runner.debug);
    }

    #[test]
    fn test_run_simple_command() {
        let runner = ProcessRunner::new(false);
        let result = runner.run(&ToolInvocation::new("echo").arg("hello"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_run_with_output() {
        let runner = ProcessRunner::new(false);
        let stdout = runner
            .run_with_output(&ToolInvocation::new("echo").args(["hello", "world"]))
            .unwrap();

        assert_eq!(stdout.trim(), "hello world");
    }

    #[test]
    fn test_captured_failure_carries_tool_stderr() {
        let runner = ProcessRunner::new(false);
        let invocation = ToolInvocation::new("sh")
            .args(["-c", "echo manifest unknown >&2; exit 4"])
            .captured();

        match runner.run(&invocation) {
            Err(PackagerError::ExternalTool {
                exit_code, stderr, ..
            }) => {
                assert_eq!(exit_code, Some(4));
                assert_eq!(stderr.trim(), "manifest unknown");
            }
            other => panic!("Expected ExternalTool error, got {other:?}"),
        }
    }

    #[test]
    fn test_run_failing_command() {
        let runner = ProcessRunner::new(false);
        let result = runner.run(&ToolInvocation::new("false"));

        if let Err(PackagerError::ExternalTool {
            command, exit_code, ..
        }) = result
        {
            assert_eq!(command, "false");
            assert_eq!(exit_code, Some(1));
        } else {
            panic!("Expected ExternalTool error");
        }
    }

    #[test]
    fn test_missing_program_is_external_tool_error() {
        let runner = ProcessRunner::new(false);
        let result = runner.run(&ToolInvocation::new("nonexistent_command_12345"));
        assert!(matches!(
            result,
            Err(PackagerError::ExternalTool { exit_code: None, .. })
        ));
    }

    #[test]
    fn test_run_with_env_and_dir() {
        let runner = ProcessRunner::new(false);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let invocation = ToolInvocation::new("sh")
            .args(["-c", "echo $GOARCH; pwd"])
            .envs(&[("GOARCH".to_string(), "arm64".to_string())])
            .current_dir(temp_dir.path());

        let stdout = runner.run_with_output(&invocation).unwrap();
        let mut lines = stdout.lines();
        assert_eq!(lines.next(), Some("arm64"));
        let pwd = std::path::PathBuf::from(lines.next().unwrap());
        assert_eq!(
            pwd.canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_invocation_flag_lookup() {
        let invocation = ToolInvocation::new("/tools/pack")
            .args(["buildpack", "package", "out.cnb"])
            .args(["--target", "linux/amd64", "--target", "linux/arm64"])
            .args(["--path", "build/buildpack.tgz"]);

        assert_eq!(invocation.program_name(), "pack");
        assert_eq!(invocation.flag_value("--path"), Some("build/buildpack.tgz"));
        assert_eq!(
            invocation.flag_values("--target"),
            vec!["linux/amd64", "linux/arm64"]
        );
        assert_eq!(invocation.flag_value("--publish"), None);
        assert_eq!(
            invocation.to_string(),
            "/tools/pack buildpack package out.cnb --target linux/amd64 --target linux/arm64 --path build/buildpack.tgz"
        );
    }
}
