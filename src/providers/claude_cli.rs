//! Claude CLI provider.
//!
//! Runs `claude -p --model <model> --output-format text --max-turns 1` with the
//! prompt on stdin. Authentication is whatever the installed CLI already has.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{Result, ScribeError};

use super::LlmProvider;

/// Variable set by an enclosing Claude session; the nested CLI refuses to run with it.
const NESTED_SESSION_ENV: &str = "CLAUDECODE";

/// [`LlmProvider`] backed by the `claude` command-line tool.
#[derive(Debug, Clone)]
pub struct ClaudeCliProvider {
    cli_path: String,
    default_model: String,
    timeout: Duration,
}

impl ClaudeCliProvider {
    pub fn new(
        cli_path: impl Into<String>,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            cli_path: cli_path.into(),
            default_model: default_model.into(),
            timeout,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            &config.cli_path,
            &config.default_model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Whether the configured executable resolves to something runnable.
    pub fn is_available(&self) -> bool {
        which::which(&self.cli_path).is_ok()
    }

    fn args(model: &str) -> [&str; 7] {
        [
            "-p",
            "--model",
            model,
            "--output-format",
            "text",
            "--max-turns",
            "1",
        ]
    }
}

#[async_trait]
impl LlmProvider for ClaudeCliProvider {
    fn name(&self) -> &str {
        "claude-cli"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        let model = model.unwrap_or(&self.default_model);

        let mut child = Command::new(&self.cli_path)
            .args(Self::args(model))
            .env_remove(NESTED_SESSION_ENV)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ScribeError::ProviderConfig(format!("Claude CLI not found: '{}'", self.cli_path))
                } else {
                    ScribeError::Provider(format!("Failed to execute Claude CLI: {}", e))
                }
            })?;

        // Feed stdin concurrently so a large prompt cannot deadlock against stdout.
        if let Some(mut stdin) = child.stdin.take() {
            let prompt = prompt.to_owned();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    debug!(error = %e, "Claude CLI closed stdin early");
                }
            });
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result
                .map_err(|e| ScribeError::Provider(format!("Failed to execute Claude CLI: {}", e)))?,
            Err(_) => {
                return Err(ScribeError::Provider(format!(
                    "Claude CLI timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let exit = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScribeError::Provider(format!(
                "Claude CLI failed (exit {}): {}",
                exit,
                stderr.trim()
            )));
        }

        let response = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if response.is_empty() {
            return Err(ScribeError::Provider(
                "Claude CLI returned empty response".to_string(),
            ));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(cli: &str) -> ClaudeCliProvider {
        ClaudeCliProvider::new(cli, "sonnet", Duration::from_secs(10))
    }

    #[test]
    fn test_from_config() {
        let cfg = LlmConfig {
            cli_path: "/opt/claude".into(),
            default_model: "haiku".into(),
            timeout_secs: 42,
            ..LlmConfig::default()
        };
        let p = ClaudeCliProvider::from_config(&cfg);
        assert_eq!(p.cli_path, "/opt/claude");
        assert_eq!(p.default_model(), "haiku");
        assert_eq!(p.timeout, Duration::from_secs(42));
        assert_eq!(p.name(), "claude-cli");
    }

    #[test]
    fn test_args_shape() {
        assert_eq!(
            ClaudeCliProvider::args("opus"),
            ["-p", "--model", "opus", "--output-format", "text", "--max-turns", "1"]
        );
    }

    #[test]
    fn test_unavailable_cli() {
        assert!(!provider("definitely-not-a-real-claude-binary").is_available());
        assert!(!provider("/nonexistent/dir/claude").is_available());
    }

    #[cfg(unix)]
    #[test]
    fn test_availability_requires_execute_bit() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let cli = tmp.path().join("claude");
        std::fs::write(&cli, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&cli, std::fs::Permissions::from_mode(0o644)).unwrap();
        let p = provider(cli.to_str().unwrap());
        assert!(!p.is_available());

        std::fs::set_permissions(&cli, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(p.is_available());
    }

    #[tokio::test]
    async fn test_missing_binary_is_config_error() {
        let err = provider("/nonexistent/dir/claude")
            .complete("hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScribeError::ProviderConfig(_)), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_returns_trimmed_stdout() {
        // `echo` ignores stdin and prints its arguments, which exercises the argument list.
        let p = provider("echo");
        assert!(p.is_available());
        let out = p.complete("ignored", Some("opus")).await.unwrap();
        assert_eq!(out, "-p --model opus --output-format text --max-turns 1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_default_model_used() {
        let out = provider("echo").complete("ignored", None).await.unwrap();
        assert!(out.contains("--model sonnet"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_provider_error() {
        let err = provider("false").complete("hi", None).await.unwrap_err();
        match err {
            ScribeError::Provider(msg) => assert!(msg.contains("exit 1"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_output_is_provider_error() {
        let err = provider("true").complete("hi", None).await.unwrap_err();
        assert!(err.to_string().contains("empty response"));
    }
}
