//! External relay reload action.
//!
//! The relay picks up a new secrets file only when its container is
//! recreated. The panel treats that command as a black box: it either exits
//! zero within the timeout or the sync attempt fails.

use crate::config::ReloadConfig;
use crate::error::ReloadError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

/// Applies the freshly written configuration to the running relay.
#[async_trait]
pub trait RelayReloader: Send + Sync + std::fmt::Debug {
    /// Run the reload. Errors, timeouts and non-zero exits are failures.
    async fn reload(&self) -> Result<(), ReloadError>;

    /// Whether this reloader does anything.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Reloader used when external reconfiguration is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledReloader;

#[async_trait]
impl RelayReloader for DisabledReloader {
    async fn reload(&self) -> Result<(), ReloadError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Runs an external command with a timeout.
#[derive(Debug, Clone)]
pub struct CommandReloader {
    program: OsString,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandReloader {
    /// Reloader running `program args...` with the given timeout.
    pub fn new<I, S>(program: impl Into<OsString>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            timeout,
        }
    }

    /// Run the command inside `dir`.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// `docker compose -p <project> -f <file> up -d --force-recreate <service>`.
    pub fn docker_compose(config: &ReloadConfig) -> Self {
        let args: Vec<OsString> = vec![
            "compose".into(),
            "-p".into(),
            config.project.clone().into(),
            "-f".into(),
            config.compose_file.clone().into_os_string(),
            "up".into(),
            "-d".into(),
            "--force-recreate".into(),
            config.service.clone().into(),
        ];
        Self::new(config.program.clone(), args, config.timeout())
            .with_working_dir(config.stack_dir.clone())
    }

    /// The full argument vector, for logging.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

#[async_trait]
impl RelayReloader for CommandReloader {
    async fn reload(&self) -> Result<(), ReloadError> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        // Dropping the output future on timeout kills the child.
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ReloadError::Timeout(self.timeout))?
            .map_err(ReloadError::Spawn)?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = [stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| format!("reload command failed ({})", output.status));

        Err(ReloadError::Failed {
            code: output.status.code(),
            output: message,
        })
    }
}

/// Build the reloader described by `config`.
pub fn from_config(config: &ReloadConfig) -> Arc<dyn RelayReloader> {
    if config.enabled {
        Arc::new(CommandReloader::docker_compose(config))
    } else {
        Arc::new(DisabledReloader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_arguments() {
        let config = ReloadConfig {
            project: "relay".into(),
            compose_file: PathBuf::from("/srv/stack/compose.yml"),
            service: "mtproxy".into(),
            ..Default::default()
        };
        let reloader = CommandReloader::docker_compose(&config);
        let args: Vec<_> = reloader
            .args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "compose",
                "-p",
                "relay",
                "-f",
                "/srv/stack/compose.yml",
                "up",
                "-d",
                "--force-recreate",
                "mtproxy"
            ]
        );
    }

    #[test]
    fn disabled_config_builds_noop() {
        let config = ReloadConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(!from_config(&config).is_enabled());
    }

    #[tokio::test]
    async fn disabled_reloader_succeeds() {
        DisabledReloader.reload().await.unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let reloader = CommandReloader::new(
            "/nonexistent/mtpanel-reload",
            Vec::<String>::new(),
            Duration::from_secs(5),
        );
        assert!(matches!(
            reloader.reload().await,
            Err(ReloadError::Spawn(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_succeeds() {
        let reloader = CommandReloader::new("sh", ["-c", "exit 0"], Duration::from_secs(5));
        reloader.reload().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        let reloader = CommandReloader::new(
            "sh",
            ["-c", "echo 'service not found' >&2; exit 3"],
            Duration::from_secs(5),
        );
        match reloader.reload().await {
            Err(ReloadError::Failed { code, output }) => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "service not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_failure_has_generic_message() {
        let reloader = CommandReloader::new("sh", ["-c", "exit 1"], Duration::from_secs(5));
        match reloader.reload().await {
            Err(ReloadError::Failed { output, .. }) => {
                assert!(output.starts_with("reload command failed"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let reloader = CommandReloader::new("sh", ["-c", "sleep 5"], Duration::from_millis(100));
        assert!(matches!(
            reloader.reload().await,
            Err(ReloadError::Timeout(_))
        ));
    }
}
