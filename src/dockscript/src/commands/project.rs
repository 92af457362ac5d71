//! `dockscript project ...`

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;

use crate::config::Config;
use crate::project::recent::{RecentProject, RecentProjects};
use crate::project::{init, Project};

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Make a directory a project root
    Init {
        /// Target directory (default is the current directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Project name (default is the directory name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List recently used projects
    Ls {
        /// Only print root directories
        #[arg(short, long)]
        quiet: bool,

        /// Output format: table, json, or a template using
        /// {{.ID}}, {{.Name}}, {{.Root}} and {{.Timestamp}}
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// List the tasks of the current project, or describe one
    Tasks {
        /// Task to describe
        name: Option<String>,
    },
}

pub fn run(
    command: ProjectCommand,
    config: &Config,
    project: Option<&Project>,
    out: &mut dyn Write,
) -> Result<i32> {
    match command {
        ProjectCommand::Init { dir, name } => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            let dir = match dir {
                Some(dir) => cwd.join(dir),
                None => cwd,
            };

            let identity = init::init(&dir, name.as_deref())?;
            writeln!(out, "project {} created in {}", identity.name, dir.display())?;
        }
        ProjectCommand::Ls { quiet, format } => {
            let projects = RecentProjects::new(config.recent_projects_file()).load();
            write_projects(&projects, &format, quiet, out)?;
        }
        ProjectCommand::Tasks { name } => {
            let Some(project) = project else {
                bail!("not inside a project");
            };
            match name {
                Some(name) => write_task(project, &name, out)?,
                None => write_tasks(project, out)?,
            }
        }
    }

    Ok(0)
}

fn write_projects(projects: &[RecentProject], format: &str, quiet: bool, out: &mut dyn Write) -> Result<()> {
    match format {
        "table" if quiet => {
            for p in projects {
                writeln!(out, "{}", p.root.display())?;
            }
        }
        "table" => {
            const NAME_HEADER: &str = "PROJECT NAME";
            let width = projects
                .iter()
                .map(|p| p.name.len())
                .chain([NAME_HEADER.len()])
                .max()
                .unwrap_or_default();

            writeln!(out, "{:<width$}   ROOT DIRECTORY", NAME_HEADER)?;
            for p in projects {
                writeln!(out, "{:<width$}   {}", p.name, p.root.display())?;
            }
        }
        "json" => {
            writeln!(out, "{}", serde_json::to_string_pretty(projects)?)?;
        }
        template => {
            for p in projects {
                writeln!(out, "{}", render_template(template, p))?;
            }
        }
    }
    Ok(())
}

fn render_template(template: &str, project: &RecentProject) -> String {
    template
        .replace("\\t", "\t")
        .replace("{{.ID}}", &project.id)
        .replace("{{.Name}}", &project.name)
        .replace("{{.Root}}", &project.root.display().to_string())
        .replace("{{.Timestamp}}", &project.timestamp.to_string())
}

/// The "Project Commands" section shown by `project tasks` and bare help
pub fn write_tasks(project: &Project, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Project Commands ({}):", project.identity().name)?;

    let tasks = project.tasks();
    if tasks.is_empty() {
        writeln!(out, "  (none)")?;
        return Ok(());
    }

    let width = tasks.iter().map(|t| t.name.len()).max().unwrap_or_default();
    for task in tasks.iter() {
        let line = format!("  {:<width$}   {}", task.name, task.short_description);
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

fn write_task(project: &Project, name: &str, out: &mut dyn Write) -> Result<()> {
    let Some(task) = project.tasks().get(name) else {
        bail!("project {} has no task {:?}", project.identity().name, name);
    };

    if task.short_description.is_empty() {
        writeln!(out, "{}", task.name)?;
    } else {
        writeln!(out, "{} - {}", task.name, task.short_description)?;
    }
    if !task.description.is_empty() && task.description != task.short_description {
        writeln!(out)?;
        writeln!(out, "{}", task.description)?;
    }
    Ok(())
}
