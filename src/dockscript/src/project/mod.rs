//! Projects: a directory holding a `dockerproject.lua` marker script
//!
//! Loading a project runs the marker inside a fresh [`Sandbox`] with a
//! pre-seeded `project = { root = ... }` table, then reads back
//! `project.id`, `project.name` and `project.tasks`.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mlua::{Table, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::lua::args::ValueKind;
use crate::lua::{Host, Sandbox, SandboxError};
use crate::scoping::ProjectIdentity;

pub mod init;
mod locator;
pub mod recent;
mod tasks;

pub use locator::{find_project_root, is_project_root, MARKER_FILE};
pub use tasks::TaskCatalog;

const TASK_SHAPES: &str = "a function, {function}, {function, \"description\"}, \
    {function, \"short\", \"description\"} or {func = function, short = \"...\", desc = \"...\"}";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("lua error")]
    Lua(#[from] mlua::Error),

    #[error("i/o error")]
    Io(#[from] std::io::Error),

    #[error("json error")]
    Json(#[from] serde_json::Error),

    #[error("`project` must be a table, got a {0}")]
    NotATable(ValueKind),

    #[error("project.{field} must be a string, got a {found}")]
    InvalidField { field: &'static str, found: ValueKind },

    #[error("project.{0} must not be empty")]
    EmptyField(&'static str),

    #[error("invalid project.tasks: {0}")]
    InvalidTasks(String),

    #[error("task {name:?} is invalid: {reason}; expected {}", TASK_SHAPES)]
    InvalidTask { name: String, reason: String },

    #[error("task {name:?} failed")]
    Task {
        name: String,
        #[source]
        source: mlua::Error,
    },

    #[error("{} already holds a project", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("invalid project name {0:?}: only letters, digits, '.' and '-' are allowed")]
    InvalidName(String),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

pub type Result<T> = std::result::Result<T, ProjectError>;

/// A loaded project, bound to the sandbox that ran its marker
pub struct Project {
    root: PathBuf,
    identity: ProjectIdentity,
    tasks: TaskCatalog,
    // task functions live in this interpreter
    sandbox: Sandbox,
}

impl Project {
    /// Find and load the project governing `start`.
    ///
    /// `Ok(None)` when no marker is found above `start`, or when the marker
    /// cannot be read. On success the identity is bound to `host`, so every
    /// engine call made by the project's scripts is scoped to it.
    pub fn load(start: &Path, host: Arc<Host>) -> Result<Option<Self>> {
        let Some(root) = find_project_root(start) else {
            debug!("no project above {}", start.display());
            return Ok(None);
        };

        let sandbox = Sandbox::new(Arc::clone(&host), &root)?;
        let seed = sandbox.lua().create_table()?;
        seed.raw_set("root", root.display().to_string())?;
        sandbox.env().raw_set("project", seed)?;

        host.begin_load();
        match sandbox.exec_file(&root.join(MARKER_FILE)) {
            Ok(()) => {}
            Err(SandboxError::Read { path, source }) => {
                host.abort_load();
                warn!("ignoring unreadable project marker {}: {}", path.display(), source);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let project = match sandbox.env().raw_get::<Value>("project")? {
            Value::Table(t) => t,
            other => return Err(ProjectError::NotATable(ValueKind::of(&other))),
        };

        let identity = ProjectIdentity::new(
            string_field(&project, "id")?,
            string_field(&project, "name")?,
        );
        let tasks = TaskCatalog::parse(project.raw_get("tasks")?)?;

        debug!(
            "loaded project {} ({}) at {} with {} tasks",
            identity.name,
            identity.id,
            root.display(),
            tasks.len()
        );

        host.bind(identity.clone());

        Ok(Some(Self {
            root,
            identity,
            tasks,
            sandbox,
        }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn identity(&self) -> &ProjectIdentity {
        &self.identity
    }

    pub fn tasks(&self) -> &TaskCatalog {
        &self.tasks
    }

    pub fn command_exists(&self, name: &str) -> bool {
        self.tasks.contains(name)
    }

    /// Run the task named by `args[0]` with the remaining arguments.
    ///
    /// Returns `Ok(false)` when there is no such task. The task runs from the
    /// project root; the previous working directory is restored afterwards
    /// whether or not the task succeeded.
    pub fn exec(&self, args: &[String]) -> Result<bool> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(false);
        };
        let Some(task) = self.tasks.get(name) else {
            return Ok(false);
        };

        let task_args = self
            .sandbox
            .lua()
            .create_sequence_from(rest.iter().map(|arg| quote(arg)))?;

        let _cwd = WorkingDir::enter(&self.root)?;
        debug!("running task {} with {:?}", name, rest);

        task.call(task_args).map_err(|source| ProjectError::Task {
            name: name.clone(),
            source,
        })?;

        Ok(true)
    }
}

fn string_field(project: &Table, field: &'static str) -> Result<String> {
    match project.raw_get::<Value>(field)? {
        Value::String(s) => {
            let value = (*s.to_str()?).to_owned();
            if value.is_empty() {
                return Err(ProjectError::EmptyField(field));
            }
            Ok(value)
        }
        other => Err(ProjectError::InvalidField {
            field,
            found: ValueKind::of(&other),
        }),
    }
}

/// Wrap arguments containing whitespace in double quotes
fn quote(arg: &str) -> String {
    if arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// Switches the process into a directory until dropped
struct WorkingDir {
    previous: PathBuf,
}

impl WorkingDir {
    fn enter(dir: &Path) -> std::io::Result<Self> {
        let previous = env::current_dir()?;
        env::set_current_dir(dir)?;
        Ok(Self { previous })
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.previous) {
            warn!("failed to return to {}: {}", self.previous.display(), e);
        }
    }
}
