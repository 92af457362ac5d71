use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

const MARKER: &str = "dockerproject.lua";

/// Scratch area with a config that points the client at `echo`, so
/// passthrough commands print the arguments they would have run.
struct Sandbox {
    tmp: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = format!(
            "docker_binary = \"/bin/echo\"\nclient_config_dir = \"{}\"\n",
            tmp.path().join("client").display()
        );
        fs::write(tmp.path().join("config.toml"), config).expect("write config");
        fs::create_dir(tmp.path().join("work")).expect("work dir");
        Self { tmp }
    }

    fn work(&self) -> PathBuf {
        self.tmp.path().join("work").canonicalize().expect("canonical work dir")
    }

    fn write_marker(&self, script: &str) {
        fs::write(self.work().join(MARKER), script).expect("write marker");
    }

    fn run(&self, dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
        cargo_bin_cmd!("dockscript")
            .current_dir(dir)
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.tmp.path().join("config.toml"))
            .args(args)
            .assert()
    }
}

fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout")
}

fn stderr_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stderr.clone()).expect("utf8 stderr")
}

const DEMO: &str = r#"
project.id = "0f9c"
project.name = "demo"

project.tasks = {
    hello = {function(args) print("hello", table.concat(args, " ")) end, "greets"},
    build = function() print("custom build") end,
    push = function() print("should never run") end,
    fail = function() error("deliberate failure") end,
}
"#;

#[test]
fn project_init_writes_marker() {
    let sb = Sandbox::new();
    let assert = sb.run(&sb.work(), &["project", "init", "-n", "shop"]).success();

    assert!(stdout_of(&assert).contains("project shop created in"));
    let marker = fs::read_to_string(sb.work().join(MARKER)).unwrap();
    assert!(marker.contains("project.name = \"shop\""), "marker: {marker}");
}

#[test]
fn project_init_rejects_bad_name() {
    let sb = Sandbox::new();
    let assert = sb.run(&sb.work(), &["project", "init", "-n", "not ok"]).failure();

    assert!(stderr_of(&assert).contains("invalid project name"));
    assert!(!sb.work().join(MARKER).exists());
}

#[test]
fn task_runs_with_arguments() {
    let sb = Sandbox::new();
    sb.write_marker(DEMO);

    let assert = sb.run(&sb.work(), &["hello", "big", "world"]).success();
    assert_eq!(stdout_of(&assert), "hello big world\n");
}

#[test]
fn task_runs_from_subdirectory() {
    let sb = Sandbox::new();
    sb.write_marker(DEMO);
    let nested = sb.work().join("src");
    fs::create_dir(&nested).unwrap();

    let assert = sb.run(&nested, &["build"]).success();
    assert_eq!(stdout_of(&assert), "custom build\n");
}

#[test]
fn non_overridable_task_is_rejected() {
    let sb = Sandbox::new();
    sb.write_marker(DEMO);

    let assert = sb.run(&sb.work(), &["push"]).failure();
    let stderr = stderr_of(&assert);
    assert!(stderr.contains("push can't be overridden"), "stderr: {stderr}");
    assert!(stderr.contains("build, deploy, export"), "stderr: {stderr}");
    assert!(stdout_of(&assert).is_empty());
}

#[test]
fn failing_task_exits_non_zero() {
    let sb = Sandbox::new();
    sb.write_marker(DEMO);

    let assert = sb.run(&sb.work(), &["fail"]).failure();
    let stderr = stderr_of(&assert);
    assert!(stderr.contains("task \"fail\" failed"), "stderr: {stderr}");
    assert!(stderr.contains("deliberate failure"), "stderr: {stderr}");
}

#[test]
fn malformed_task_names_the_task() {
    let sb = Sandbox::new();
    sb.write_marker("project.id = 'x'\nproject.name = 'y'\nproject.tasks = { broken = 42 }\n");

    let assert = sb.run(&sb.work(), &["ps"]).failure();
    assert!(stderr_of(&assert).contains("task \"broken\" is invalid"));
}

#[test]
fn passthrough_is_scoped_inside_project() {
    let sb = Sandbox::new();
    sb.write_marker(DEMO);

    let listed = sb.run(&sb.work(), &["ps", "-a"]).success();
    assert_eq!(stdout_of(&listed), "ps --filter label=project.id:0f9c -a\n");

    let created = sb.run(&sb.work(), &["volume", "create", "data"]).success();
    assert_eq!(
        stdout_of(&created),
        "volume create --label project.id:0f9c --label project.name:demo data\n"
    );
}

#[test]
fn passthrough_unscoped_with_flag_or_outside_project() {
    let sb = Sandbox::new();
    sb.write_marker(DEMO);

    let assert = sb.run(&sb.work(), &["--no-scope", "ps", "-a"]).success();
    assert_eq!(stdout_of(&assert), "ps -a\n");

    let assert = sb.run(sb.tmp.path(), &["ps", "-a"]).success();
    assert_eq!(stdout_of(&assert), "ps -a\n");
}

#[test]
fn unknown_command_outside_project() {
    let sb = Sandbox::new();
    let assert = sb.run(sb.tmp.path(), &["hello"]).failure();
    assert!(stderr_of(&assert).contains("unknown command \"hello\""));
}

#[test]
fn visited_projects_are_listed() {
    let sb = Sandbox::new();
    sb.write_marker(DEMO);

    sb.run(&sb.work(), &["project", "tasks"]).success();

    let assert = sb.run(sb.tmp.path(), &["project", "ls", "-q"]).success();
    assert_eq!(stdout_of(&assert), format!("{}\n", sb.work().display()));

    let assert = sb
        .run(sb.tmp.path(), &["project", "ls", "--format", "{{.Name}} {{.ID}}"])
        .success();
    assert_eq!(stdout_of(&assert), "demo 0f9c\n");
}

#[test]
fn project_tasks_lists_short_descriptions() {
    let sb = Sandbox::new();
    sb.write_marker(DEMO);

    let assert = sb.run(&sb.work(), &["project", "tasks"]).success();
    let stdout = stdout_of(&assert);
    assert!(stdout.starts_with("Project Commands (demo):"), "stdout: {stdout}");
    assert!(stdout.contains("  hello   greets"), "stdout: {stdout}");
}

#[test]
fn task_named_help_runs() {
    let sb = Sandbox::new();
    sb.write_marker(
        "project.id = 'h1'\nproject.name = 'helpful'\n\
         project.tasks = { help = function() print('project help') end }\n",
    );

    let assert = sb.run(&sb.work(), &["help"]).success();
    assert_eq!(stdout_of(&assert), "project help\n");
}

#[test]
fn project_tasks_describes_one_task() {
    let sb = Sandbox::new();
    sb.write_marker(
        "project.id = 'd1'\nproject.name = 'docs'\n\
         project.tasks = { ship = {function() end, 'ships it', 'Builds and pushes every image.'} }\n",
    );

    let assert = sb.run(&sb.work(), &["project", "tasks", "ship"]).success();
    assert_eq!(stdout_of(&assert), "ship - ships it\n\nBuilds and pushes every image.\n");

    let assert = sb.run(&sb.work(), &["project", "tasks", "nope"]).failure();
    assert!(stderr_of(&assert).contains("project docs has no task \"nope\""));
}
