//! `project init`: write a fresh marker script

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;
use uuid::Uuid;

use super::{is_project_root, ProjectError, Result, MARKER_FILE};
use crate::scoping::ProjectIdentity;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.-]+$").expect("valid project name regex"));

const TEMPLATE: &str = r#"-- dockscript project

project.id = "@ID@"
project.name = "@NAME@"

local function status(args)
    for _, c in ipairs(docker.container.list("-a")) do
        print(c.name, c.status)
    end
end

local function clean(args)
    docker.cmd("container prune -f")
end

project.tasks = {
    status = {status, "list project containers"},
    clean = {func = clean, short = "remove stopped containers",
             desc = "Removes every stopped container created in this project."},
}
"#;

pub fn validate_name(name: &str) -> Result<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(ProjectError::InvalidName(name.to_string()))
    }
}

/// Make `dir` a project root. The name defaults to the directory's own name.
pub fn init(dir: &Path, name: Option<&str>) -> Result<ProjectIdentity> {
    if !dir.is_dir() {
        return Err(ProjectError::NotADirectory(dir.to_path_buf()));
    }

    let name = match name {
        Some(name) => name.to_string(),
        None => dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    validate_name(&name)?;

    if is_project_root(dir) {
        return Err(ProjectError::AlreadyInitialized(dir.to_path_buf()));
    }

    let identity = ProjectIdentity::new(Uuid::new_v4().to_string(), name);
    let script = TEMPLATE
        .replace("@ID@", &identity.id)
        .replace("@NAME@", &identity.name);
    fs::write(dir.join(MARKER_FILE), script)?;

    info!("initialised project {} in {}", identity.name, dir.display());
    Ok(identity)
}
