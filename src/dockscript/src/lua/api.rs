//! Engine API for project scripts
//!
//! Installed as the global `docker` (also reachable as `client`):
//!
//! ```lua
//! docker.cmd("run -d nginx")                 -- streams to the terminal
//! local out, err = docker.silentCmd("ps -q")  -- captured, trimmed
//! for _, c in ipairs(docker.container.list("-a")) do print(c.name) end
//! ```
//!
//! List functions take one optional string of command-line flags.

use std::error::Error as StdError;
use std::sync::Arc;

use mlua::{Error as LuaError, Function, Lua, MultiValue, Table};
use serde::Serialize;

use super::args::Args;
use super::marshal::{
    self, ContainerDetailsRecord, ContainerRecord, ImageRecord, NetworkRecord, SecretRecord,
    ServiceRecord, VolumeRecord,
};
use super::Host;
use crate::engine::{CommandOutput, Engine, EngineError, Streams};
use crate::scoping;

/// Install the engine API into `env`
pub fn install(lua: &Lua, env: &Table, host: &Arc<Host>) -> mlua::Result<()> {
    let docker = lua.create_table()?;

    let h = Arc::clone(host);
    docker.raw_set("cmd", lua.create_function(move |_, args: MultiValue| {
        run_command(&h, args, Streams::Inherit)?;
        Ok(())
    })?)?;

    let h = Arc::clone(host);
    docker.raw_set("silentCmd", lua.create_function(move |_, args: MultiValue| {
        let output = run_command(&h, args, Streams::Capture)?;
        let stderr = output.stderr.trim();
        let stderr = (!stderr.is_empty()).then(|| stderr.to_string());
        Ok((output.stdout.trim().to_string(), stderr))
    })?)?;

    let container = lua.create_table()?;
    container.raw_set("list", list_function(lua, host, true, |engine, args| {
        let containers = engine.list_containers(args)?;
        Ok(containers.iter().map(ContainerRecord::from).collect::<Vec<_>>())
    })?)?;
    container.raw_set("inspect", inspect_function(lua, host, |engine, refs| {
        let containers = engine.inspect_containers(refs)?;
        Ok(containers.iter().map(ContainerDetailsRecord::from).collect::<Vec<_>>())
    })?)?;
    docker.raw_set("container", container)?;

    let image = lua.create_table()?;
    image.raw_set("list", list_function(lua, host, true, |engine, args| {
        let images = engine.list_images(args)?;
        Ok(images.iter().map(ImageRecord::from).collect::<Vec<_>>())
    })?)?;
    image.raw_set("inspect", inspect_function(lua, host, |engine, refs| {
        let images = engine.inspect_images(refs)?;
        Ok(images.iter().map(ImageRecord::details).collect::<Vec<_>>())
    })?)?;
    docker.raw_set("image", image)?;

    let volume = lua.create_table()?;
    volume.raw_set("list", list_function(lua, host, true, |engine, args| {
        let volumes = engine.list_volumes(args)?;
        Ok(volumes.iter().map(VolumeRecord::from).collect::<Vec<_>>())
    })?)?;
    docker.raw_set("volume", volume)?;

    let network = lua.create_table()?;
    network.raw_set("list", list_function(lua, host, true, |engine, args| {
        let networks = engine.list_networks(args)?;
        Ok(networks.iter().map(NetworkRecord::from).collect::<Vec<_>>())
    })?)?;
    docker.raw_set("network", network)?;

    // services and secrets never carry project labels
    let service = lua.create_table()?;
    service.raw_set("list", list_function(lua, host, false, |engine, args| {
        let services = engine.list_services(args)?;
        Ok(services.iter().map(ServiceRecord::from).collect::<Vec<_>>())
    })?)?;
    docker.raw_set("service", service)?;

    let secret = lua.create_table()?;
    secret.raw_set("list", list_function(lua, host, false, |engine, args| {
        let secrets = engine.list_secrets(args)?;
        Ok(secrets.iter().map(SecretRecord::from).collect::<Vec<_>>())
    })?)?;
    docker.raw_set("secret", secret)?;

    env.raw_set("docker", docker.clone())?;
    env.raw_set("client", docker)?;

    Ok(())
}

/// Engine errors with their causes, as a script-level error
fn engine_error(err: EngineError) -> LuaError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    LuaError::runtime(message)
}

fn split_flags(line: &str) -> mlua::Result<Vec<String>> {
    shell_words::split(line)
        .map_err(|e| LuaError::runtime(format!("cannot parse {line:?}: {e}")))
}

fn run_command(host: &Host, args: MultiValue, streams: Streams) -> mlua::Result<CommandOutput> {
    let line = Args::new(args).require_string()?;
    let argv = split_flags(&line)?;
    if argv.is_empty() {
        return Err(LuaError::runtime("empty command"));
    }

    let argv = scoping::scope_command(&argv, host.project());
    let output = host.engine()?.run(&argv, streams).map_err(engine_error)?;

    if !output.success() {
        let stderr = output.stderr.trim();
        return Err(LuaError::runtime(if stderr.is_empty() {
            format!("`{}` exited with status {}", line, output.status)
        } else {
            stderr.to_string()
        }));
    }

    Ok(output)
}

fn list_function<R, F>(lua: &Lua, host: &Arc<Host>, scoped: bool, fetch: F) -> mlua::Result<Function>
where
    R: Serialize,
    F: Fn(&dyn Engine, &[String]) -> Result<Vec<R>, EngineError> + Send + 'static,
{
    let host = Arc::clone(host);
    lua.create_function(move |lua, args: MultiValue| {
        let flags = Args::new(args).pop_string()?.unwrap_or_default();
        let mut argv = split_flags(&flags)?;
        if scoped {
            argv = scoping::scope_listing(argv, host.project());
        }

        let records = fetch(host.engine()?, &argv).map_err(engine_error)?;
        marshal::to_lua(lua, &records)
    })
}

fn inspect_function<R, F>(lua: &Lua, host: &Arc<Host>, fetch: F) -> mlua::Result<Function>
where
    R: Serialize,
    F: Fn(&dyn Engine, &[String]) -> Result<Vec<R>, EngineError> + Send + 'static,
{
    let host = Arc::clone(host);
    lua.create_function(move |lua, args: MultiValue| {
        let refs = Args::new(args).rest_strings()?;
        if refs.is_empty() {
            return Err(LuaError::runtime("inspect needs at least one name or id"));
        }

        let records = fetch(host.engine()?, &refs).map_err(engine_error)?;
        marshal::to_lua(lua, &records)
    })
}
