//! In-memory engine for tests

use std::path::PathBuf;
use std::sync::Mutex;

use super::types::*;
use super::{CommandOutput, Engine, EngineError, Streams};

/// Serves canned objects and records every call as `[operation, args...]`
#[derive(Default)]
pub struct FakeEngine {
    pub containers: Vec<ContainerInspect>,
    pub images: Vec<ImageInspect>,
    pub volumes: Vec<VolumeInspect>,
    pub networks: Vec<NetworkInspect>,
    pub services: Vec<ServiceInspect>,
    pub secrets: Vec<SecretInspect>,
    pub output: CommandOutput,
    pub(crate) calls: Mutex<Vec<Vec<String>>>,
    pub(crate) run_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeEngine {
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Working directory at the time of each `run`
    pub fn run_dirs(&self) -> Vec<PathBuf> {
        self.run_dirs.lock().unwrap().clone()
    }

    fn record(&self, op: &str, args: &[String]) {
        let mut call = vec![op.to_string()];
        call.extend(args.iter().cloned());
        self.calls.lock().unwrap().push(call);
    }
}

impl Engine for FakeEngine {
    fn list_containers(&self, args: &[String]) -> Result<Vec<ContainerInspect>, EngineError> {
        self.record("container.list", args);
        Ok(self.containers.clone())
    }

    fn inspect_containers(&self, refs: &[String]) -> Result<Vec<ContainerInspect>, EngineError> {
        self.record("container.inspect", refs);
        Ok(self
            .containers
            .iter()
            .filter(|c| refs.iter().any(|r| *r == c.id || c.name.trim_start_matches('/') == r))
            .cloned()
            .collect())
    }

    fn list_images(&self, args: &[String]) -> Result<Vec<ImageInspect>, EngineError> {
        self.record("image.list", args);
        Ok(self.images.clone())
    }

    fn inspect_images(&self, refs: &[String]) -> Result<Vec<ImageInspect>, EngineError> {
        self.record("image.inspect", refs);
        Ok(self.images.clone())
    }

    fn list_volumes(&self, args: &[String]) -> Result<Vec<VolumeInspect>, EngineError> {
        self.record("volume.list", args);
        Ok(self.volumes.clone())
    }

    fn list_networks(&self, args: &[String]) -> Result<Vec<NetworkInspect>, EngineError> {
        self.record("network.list", args);
        Ok(self.networks.clone())
    }

    fn list_services(&self, args: &[String]) -> Result<Vec<ServiceInspect>, EngineError> {
        self.record("service.list", args);
        Ok(self.services.clone())
    }

    fn list_secrets(&self, args: &[String]) -> Result<Vec<SecretInspect>, EngineError> {
        self.record("secret.list", args);
        Ok(self.secrets.clone())
    }

    fn run(&self, args: &[String], _streams: Streams) -> Result<CommandOutput, EngineError> {
        self.record("run", args);
        if let Ok(dir) = std::env::current_dir() {
            self.run_dirs.lock().unwrap().push(dir);
        }
        Ok(self.output.clone())
    }
}
