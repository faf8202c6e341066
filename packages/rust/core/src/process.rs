//! External process execution via `tokio::process`.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use migratebot_shared::{CommandOutput, CommandRunner};

/// Runs real processes, capturing stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    #[instrument(skip(self, args), fields(args = args.join(" ")))]
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> CommandOutput {
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(out) => {
                let result = CommandOutput {
                    exit_code: out.status.code(),
                    stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                    error: None,
                };
                debug!(exit_code = ?result.exit_code, "process finished");
                result
            }
            Err(e) => CommandOutput {
                error: Some(format!("failed to run `{program}`: {e}")),
                ..Default::default()
            },
        }
    }
}

/// Render `program args...` for messages.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn formats_command_line() {
        assert_eq!(command_line("npm", &args(&["run", "build"])), "npm run build");
        assert_eq!(command_line("git", &[]), "git");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = SystemRunner
            .run("sh", &args(&["-c", "echo out; echo err >&2; exit 3"]), dir.path())
            .await;
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert!(!out.success());
    }

    #[tokio::test]
    async fn missing_program_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = SystemRunner
            .run("migratebot-definitely-missing-binary", &[], dir.path())
            .await;
        assert!(out.error.is_some());
        assert_eq!(out.exit_code, None);
        assert!(!out.success());
    }
}
