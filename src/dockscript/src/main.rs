//! dockscript - project-scoped docker client
//!
//! Wraps the `docker` command line. Inside a project directory (one holding
//! a `dockerproject.lua` marker, here or above) created resources are
//! labelled with the project, listings are filtered to it, and the tasks
//! declared by the marker script become extra top-level commands.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod dispatch;
mod engine;
mod lua;
mod project;
mod scoping;

use commands::project::ProjectCommand;
use config::Config;
use engine::{DockerCli, Engine, Streams};
use lua::Host;
use project::recent::RecentProjects;
use project::Project;
use scoping::ProjectIdentity;

/// dockscript - docker with project scoping and Lua tasks
#[derive(Parser, Debug)]
#[command(name = "dockscript")]
#[command(author = "CVH Linux Team")]
#[command(version)]
#[command(disable_help_subcommand = true)]
#[command(about = "Project-scoped docker client with sandboxed Lua tasks")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Do not label or filter resources by the current project
    #[arg(long)]
    no_scope: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Any docker command, or a task of the current project
    #[command(external_subcommand)]
    External(Vec<String>),
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        "dockscript=debug"
    } else {
        "dockscript=warn"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    dispatch::exit_status(run(args))
}

fn run(args: Args) -> Result<i32> {
    let config = Config::load(args.config.as_deref())?;

    let engine: Arc<dyn Engine> = Arc::new(DockerCli::new(&config.docker_binary));
    let host = Host::new(Arc::clone(&engine), config.scope_resources && !args.no_scope);

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let project = Project::load(&cwd, Arc::clone(&host))?;

    if let Some(project) = &project {
        if config.remember_projects {
            remember(&config, project);
        }
    }

    match args.command {
        None => {
            Args::command().print_help()?;
            if let Some(project) = &project {
                println!();
                commands::project::write_tasks(project, &mut io::stdout())?;
            }
            Ok(0)
        }
        Some(Command::Project(command)) => {
            let words = ["project".to_string()];
            dispatch::dispatch(&words, project.as_ref(), |_| {
                commands::project::run(command, &config, project.as_ref(), &mut io::stdout())
            })
        }
        Some(Command::External(words)) => dispatch::dispatch(&words, project.as_ref(), |words| {
            passthrough(engine.as_ref(), words, host.project())
        }),
    }
}

/// Hand a built-in command to the client, scoped to the project
fn passthrough(engine: &dyn Engine, args: &[String], project: Option<&ProjectIdentity>) -> Result<i32> {
    let args = scoping::scope_command(args, project);
    debug!("passing through {:?}", args);

    let output = engine.run(&args, Streams::Inherit)?;
    Ok(output.status)
}

fn remember(config: &Config, project: &Project) {
    let recent = RecentProjects::new(config.recent_projects_file());
    let now = chrono::Utc::now().timestamp();

    if let Err(e) = recent.record(project.identity(), project.root(), now) {
        warn!("failed to update {}: {:#}", recent.path().display(), anyhow::Error::from(e));
    }
}
