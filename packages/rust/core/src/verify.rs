//! Verifier: the corpus's own format and build commands as a gate.

use tracing::{info, instrument, warn};

use migratebot_shared::{CommandRunner, CorpusConfig, MigrateError, Result};

use crate::process::command_line;

pub struct Verifier<'a> {
    runner: &'a dyn CommandRunner,
    corpus: &'a CorpusConfig,
}

impl<'a> Verifier<'a> {
    pub fn new(runner: &'a dyn CommandRunner, corpus: &'a CorpusConfig) -> Self {
        Self { runner, corpus }
    }

    /// Format (best effort), then build. A failed build fails verification.
    #[instrument(skip(self), fields(root = %self.corpus.root.display()))]
    pub async fn verify(&self) -> Result<()> {
        if let Some((program, args)) = self.corpus.format_command.split_first() {
            let out = self.runner.run(program, args, &self.corpus.root).await;
            if !out.success() {
                warn!(
                    diagnostic = %out.diagnostic(&command_line(program, args)),
                    "format command failed, continuing"
                );
            }
        }

        let Some((program, args)) = self.corpus.build_command.split_first() else {
            warn!("no build command configured, skipping verification");
            return Ok(());
        };

        let out = self.runner.run(program, args, &self.corpus.root).await;
        if !out.success() {
            return Err(MigrateError::BuildVerification {
                diagnostic: out.diagnostic(&command_line(program, args)),
            });
        }

        info!("corpus build passed");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use migratebot_shared::CommandOutput;

    use super::*;

    /// Records invocations and answers from a per-program script.
    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        pub calls: Mutex<Vec<String>>,
        /// `(command prefix, exit code, stderr)`; first matching prefix wins.
        pub responses: Vec<(String, i32, String)>,
    }

    impl ScriptedRunner {
        pub fn failing(prefix: &str, code: i32, stderr: &str) -> Self {
            Self {
                responses: vec![(prefix.into(), code, stderr.into())],
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, program: &str, args: &[String], _cwd: &Path) -> CommandOutput {
            let line = command_line(program, args);
            self.calls.lock().unwrap().push(line.clone());
            let (code, stderr) = self
                .responses
                .iter()
                .find(|(prefix, _, _)| line.starts_with(prefix.as_str()))
                .map(|(_, code, stderr)| (*code, stderr.clone()))
                .unwrap_or((0, String::new()));
            CommandOutput {
                exit_code: Some(code),
                stderr,
                ..Default::default()
            }
        }
    }

    fn corpus() -> CorpusConfig {
        CorpusConfig {
            root: PathBuf::from("/repo"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn runs_format_then_build() {
        let runner = ScriptedRunner::default();
        let corpus = corpus();
        Verifier::new(&runner, &corpus).verify().await.unwrap();
        assert_eq!(runner.calls(), vec!["npm run format", "npm run build"]);
    }

    #[tokio::test]
    async fn format_failure_is_not_fatal() {
        let runner = ScriptedRunner::failing("npm run format", 1, "prettier crashed");
        let corpus = corpus();
        assert!(Verifier::new(&runner, &corpus).verify().await.is_ok());
    }

    #[tokio::test]
    async fn build_failure_carries_diagnostic() {
        let runner = ScriptedRunner::failing("npm run build", 1, "MDX compile error: line 12");
        let corpus = corpus();
        let err = Verifier::new(&runner, &corpus).verify().await.unwrap_err();
        match &err {
            MigrateError::BuildVerification { diagnostic } => {
                assert!(diagnostic.contains("`npm run build` exited with code 1"));
                assert!(diagnostic.contains("MDX compile error: line 12"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn empty_build_command_skips_gate() {
        let runner = ScriptedRunner::default();
        let corpus = CorpusConfig {
            format_command: vec![],
            build_command: vec![],
            ..corpus()
        };
        Verifier::new(&runner, &corpus).verify().await.unwrap();
        assert!(runner.calls().is_empty());
    }
}
