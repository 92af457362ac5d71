//! Routing a command name to a built-in or a project task
//!
//! A project task wins over a built-in only when the built-in is on the
//! override allow-list. A task that shadows any other built-in is an error;
//! silently running the built-in would hide what the project asked for.

use std::process::ExitCode;

use thiserror::Error;
use tracing::debug;

use crate::project::Project;

/// Commands the wrapped client understands, plus our own `project`
pub const BUILTIN_COMMANDS: &[&str] = &[
    "attach", "build", "builder", "buildx", "checkpoint", "commit", "compose", "config",
    "container", "context", "cp", "create", "deploy", "diff", "events", "exec", "export",
    "history", "image", "images", "import", "info", "inspect", "kill", "load", "login",
    "logout", "logs", "manifest", "network", "node", "pause", "plugin", "port", "project",
    "ps", "pull", "push", "rename", "restart", "rm", "rmi", "run", "save", "search", "secret",
    "service", "stack", "start", "stats", "stop", "swarm", "system", "tag", "top", "trust",
    "unpause", "update", "version", "volume", "wait",
];

/// Built-ins a project task may replace
pub const OVERRIDABLE_COMMANDS: &[&str] = &[
    "build", "deploy", "export", "logs", "restart", "run", "start", "stats", "stop",
];

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(
        "{name} can't be overridden; commands that can be overridden: {}",
        OVERRIDABLE_COMMANDS.join(", ")
    )]
    OverrideRejected { name: String },

    #[error("unknown command {0:?}")]
    NotFound(String),
}

/// Where a command name leads
pub enum Route<'a> {
    Builtin,
    Task(&'a Project),
    OverrideRejected,
    NotFound,
}

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_COMMANDS.contains(&name)
}

pub fn is_overridable(name: &str) -> bool {
    OVERRIDABLE_COMMANDS.contains(&name)
}

pub fn resolve<'a>(name: &str, project: Option<&'a Project>) -> Route<'a> {
    match project {
        Some(project) if project.command_exists(name) => {
            if is_builtin(name) && !is_overridable(name) {
                Route::OverrideRejected
            } else {
                Route::Task(project)
            }
        }
        _ if is_builtin(name) => Route::Builtin,
        _ => Route::NotFound,
    }
}

/// Run `args[0]` with the rest of `args`. `builtin` handles built-in
/// commands and returns their exit status.
pub fn dispatch<F>(args: &[String], project: Option<&Project>, builtin: F) -> anyhow::Result<i32>
where
    F: FnOnce(&[String]) -> anyhow::Result<i32>,
{
    let Some(name) = args.first() else {
        return Err(DispatchError::NotFound(String::new()).into());
    };

    match resolve(name, project) {
        Route::Builtin => {
            debug!("{} is a built-in", name);
            builtin(args)
        }
        Route::Task(project) => {
            if !project.exec(args)? {
                return Err(DispatchError::NotFound(name.clone()).into());
            }
            Ok(0)
        }
        Route::OverrideRejected => Err(DispatchError::OverrideRejected { name: name.clone() }.into()),
        Route::NotFound => Err(DispatchError::NotFound(name.clone()).into()),
    }
}

/// Turn the outcome of a command into the process exit status, reporting
/// errors on stderr.
pub fn exit_status(result: anyhow::Result<i32>) -> ExitCode {
    match result {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1).max(1)),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
