//! Container engine access
//!
//! Everything that talks to the container engine goes through [`Engine`].
//! The production backend drives the `docker` binary; tests use an
//! in-memory fake.

use thiserror::Error;

mod cli;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::DockerCli;
pub use types::{ContainerInspect, ImageInspect, NetworkInspect, SecretInspect, ServiceInspect, VolumeInspect};

/// How a passthrough command's standard streams are wired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Streams {
    /// Child shares our terminal
    Inherit,
    /// Child output is collected into [`CommandOutput`]
    Capture,
}

/// Result of running an engine command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start {binary}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("failed to decode engine response")]
    Decode(#[from] serde_json::Error),
}

/// The container engine as seen by the sandbox and the dispatcher.
///
/// List operations take command-line style flags (`-a`, `--filter k=v`)
/// exactly as the engine's own `ls` subcommands accept them.
pub trait Engine: Send + Sync {
    fn list_containers(&self, args: &[String]) -> Result<Vec<ContainerInspect>, EngineError>;

    fn inspect_containers(&self, refs: &[String]) -> Result<Vec<ContainerInspect>, EngineError>;

    fn list_images(&self, args: &[String]) -> Result<Vec<ImageInspect>, EngineError>;

    fn inspect_images(&self, refs: &[String]) -> Result<Vec<ImageInspect>, EngineError>;

    fn list_volumes(&self, args: &[String]) -> Result<Vec<VolumeInspect>, EngineError>;

    fn list_networks(&self, args: &[String]) -> Result<Vec<NetworkInspect>, EngineError>;

    fn list_services(&self, args: &[String]) -> Result<Vec<ServiceInspect>, EngineError>;

    fn list_secrets(&self, args: &[String]) -> Result<Vec<SecretInspect>, EngineError>;

    /// Run an arbitrary client command. A non-zero exit is reported through
    /// [`CommandOutput::status`], not as an error.
    fn run(&self, args: &[String], streams: Streams) -> Result<CommandOutput, EngineError>;
}
