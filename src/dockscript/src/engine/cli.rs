//! Engine backend that drives the `docker` client binary
//!
//! Listing is two-phase: `<object> ls --quiet` yields identifiers and
//! `<object> inspect` returns the full JSON documents for them.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::*;
use super::{CommandOutput, Engine, EngineError, Streams};

/// `docker` subprocess backend
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut line = self.binary.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn spawn_error(&self, source: std::io::Error) -> EngineError {
        EngineError::Spawn {
            binary: self.binary.display().to_string(),
            source,
        }
    }

    /// Run to completion, returning stdout; non-zero exit is an error
    fn capture(&self, args: &[String]) -> Result<String, EngineError> {
        let output = self.run(args, Streams::Capture)?;
        if !output.success() {
            let stderr = output.stderr.trim();
            return Err(EngineError::Failed {
                command: self.command_line(args),
                status: output.status,
                stderr: if stderr.is_empty() {
                    "no error output".to_string()
                } else {
                    stderr.to_string()
                },
            });
        }
        Ok(output.stdout)
    }

    fn inspect<T: DeserializeOwned>(
        &self,
        object: &str,
        flags: &[&str],
        refs: &[String],
    ) -> Result<Vec<T>, EngineError> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec![object.to_string(), "inspect".to_string()];
        args.extend(flags.iter().map(|f| f.to_string()));
        args.extend(refs.iter().cloned());

        let json = self.capture(&args)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn list<T: DeserializeOwned>(
        &self,
        object: &str,
        ls_flags: &[&str],
        inspect_flags: &[&str],
        user_args: &[String],
    ) -> Result<Vec<T>, EngineError> {
        let mut args = vec![object.to_string(), "ls".to_string(), "--quiet".to_string()];
        args.extend(ls_flags.iter().map(|f| f.to_string()));
        args.extend(user_args.iter().cloned());

        let ids = unique_lines(&self.capture(&args)?);
        debug!("{} ls matched {} object(s)", object, ids.len());
        self.inspect(object, inspect_flags, &ids)
    }
}

/// Non-empty trimmed lines, first occurrence wins
fn unique_lines(output: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !seen.iter().any(|s: &String| s == line) {
            seen.push(line.to_string());
        }
    }
    seen
}

fn wants_size(args: &[String]) -> bool {
    args.iter().any(|a| a == "-s" || a == "--size")
}

impl Engine for DockerCli {
    fn list_containers(&self, args: &[String]) -> Result<Vec<ContainerInspect>, EngineError> {
        let inspect_flags: &[&str] = if wants_size(args) { &["--size"] } else { &[] };
        self.list("container", &["--no-trunc"], inspect_flags, args)
    }

    fn inspect_containers(&self, refs: &[String]) -> Result<Vec<ContainerInspect>, EngineError> {
        self.inspect("container", &[], refs)
    }

    fn list_images(&self, args: &[String]) -> Result<Vec<ImageInspect>, EngineError> {
        self.list("image", &["--no-trunc"], &[], args)
    }

    fn inspect_images(&self, refs: &[String]) -> Result<Vec<ImageInspect>, EngineError> {
        self.inspect("image", &[], refs)
    }

    fn list_volumes(&self, args: &[String]) -> Result<Vec<VolumeInspect>, EngineError> {
        self.list("volume", &[], &[], args)
    }

    fn list_networks(&self, args: &[String]) -> Result<Vec<NetworkInspect>, EngineError> {
        self.list("network", &["--no-trunc"], &[], args)
    }

    fn list_services(&self, args: &[String]) -> Result<Vec<ServiceInspect>, EngineError> {
        self.list("service", &[], &[], args)
    }

    fn list_secrets(&self, args: &[String]) -> Result<Vec<SecretInspect>, EngineError> {
        self.list("secret", &[], &[], args)
    }

    fn run(&self, args: &[String], streams: Streams) -> Result<CommandOutput, EngineError> {
        debug!("running {}", self.command_line(args));

        let mut cmd = Command::new(&self.binary);
        cmd.args(args);

        match streams {
            Streams::Inherit => {
                let status = cmd.status().map_err(|e| self.spawn_error(e))?;
                Ok(CommandOutput {
                    status: status.code().unwrap_or(-1),
                    ..CommandOutput::default()
                })
            }
            Streams::Capture => {
                let output = cmd
                    .stdin(Stdio::null())
                    .output()
                    .map_err(|e| self.spawn_error(e))?;
                Ok(CommandOutput {
                    status: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_lines_dedupes_repeated_ids() {
        let ids = unique_lines("sha256:aa\n\nsha256:bb\nsha256:aa\n  \n");
        assert_eq!(ids, vec!["sha256:aa", "sha256:bb"]);
    }

    #[test]
    fn test_size_flag_detection() {
        assert!(wants_size(&["-a".into(), "--size".into()]));
        assert!(wants_size(&["-s".into()]));
        assert!(!wants_size(&["-a".into()]));
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let engine = DockerCli::new("/nonexistent/dockscript-test/docker");
        let err = engine.run(&["ps".into()], Streams::Capture).unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }

    #[test]
    fn test_failed_listing_reports_stderr() {
        // `false` ignores its arguments and exits 1
        let engine = DockerCli::new("false");
        let err = engine.list_volumes(&[]).unwrap_err();
        match err {
            EngineError::Failed { status, command, .. } => {
                assert_eq!(status, 1);
                assert!(command.contains("volume ls --quiet"), "got: {}", command);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_listing_skips_inspect() {
        // `true` prints nothing, so no identifiers come back
        let engine = DockerCli::new("true");
        let volumes = engine.list_volumes(&[]).unwrap();
        assert!(volumes.is_empty());
    }
}
