//! Project scoping of engine resources
//!
//! Resources created inside a project carry two presence-only labels,
//! `project.id:<ID>` and `project.name:<NAME>`. Listings inside a project
//! filter on the id label. The active project is always passed in
//! explicitly; `None` means "not in a project" and leaves everything as is.

use std::collections::BTreeMap;

pub const ID_LABEL_PREFIX: &str = "project.id:";
pub const NAME_LABEL_PREFIX: &str = "project.name:";

/// The part of a project that scoping needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
    pub id: String,
    pub name: String,
}

impl ProjectIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Add the project labels to `labels`. Idempotent.
pub fn apply_project_labels(labels: &mut BTreeMap<String, String>, project: Option<&ProjectIdentity>) {
    let Some(project) = project else {
        return;
    };

    labels.insert(format!("{ID_LABEL_PREFIX}{}", project.id), String::new());
    labels.insert(format!("{NAME_LABEL_PREFIX}{}", project.name), String::new());
}

/// Filter expression selecting the project's resources
pub fn project_filter(project: Option<&ProjectIdentity>) -> Option<String> {
    project.map(|p| format!("label={ID_LABEL_PREFIX}{}", p.id))
}

/// Client options placed before the subcommand that take a separate value
const VALUED_GLOBAL_OPTIONS: &[&str] = &[
    "-H", "--host", "-c", "--context", "-l", "--log-level", "--config",
    "--tlscacert", "--tlscert", "--tlskey",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Create,
    List,
    Other,
}

/// Classify a client command line, returning the kind and how many leading
/// words name the (sub)command.
fn classify(args: &[String]) -> (CommandKind, usize) {
    let first = args.first().map(String::as_str);
    let second = args.get(1).map(String::as_str);

    match (first, second) {
        (Some("run" | "create" | "build"), _) => (CommandKind::Create, 1),
        (Some("ps" | "images"), _) => (CommandKind::List, 1),
        (Some("container"), Some("run" | "create")) => (CommandKind::Create, 2),
        (Some("image" | "builder"), Some("build")) => (CommandKind::Create, 2),
        (Some("volume" | "network"), Some("create")) => (CommandKind::Create, 2),
        (Some("container"), Some("ls" | "list" | "ps" | "prune")) => (CommandKind::List, 2),
        (Some("image" | "volume" | "network"), Some("ls" | "list" | "prune")) => {
            (CommandKind::List, 2)
        }
        (Some("system"), Some("prune")) => (CommandKind::List, 2),
        _ => (CommandKind::Other, 0),
    }
}

/// Number of leading words that are global client options, values included
fn global_options_len(args: &[String]) -> usize {
    let mut len = 0;
    while let Some(word) = args.get(len) {
        if !word.starts_with('-') {
            break;
        }
        // `--context=x` and `-Hhost` carry their value inline
        len += if VALUED_GLOBAL_OPTIONS.contains(&word.as_str()) { 2 } else { 1 };
    }
    len.min(args.len())
}

/// Rewrite a client command line so that creations are labelled and
/// listings are filtered for `project`. Injected flags go right after the
/// (sub)command words, past any global options.
pub fn scope_command(args: &[String], project: Option<&ProjectIdentity>) -> Vec<String> {
    let start = global_options_len(args);
    let (kind, words) = classify(&args[start..]);
    let split = start + words;

    let injected: Vec<String> = match kind {
        CommandKind::Create => {
            let mut labels = BTreeMap::new();
            apply_project_labels(&mut labels, project);
            labels
                .into_keys()
                .flat_map(|label| ["--label".to_string(), label])
                .collect()
        }
        CommandKind::List => project_filter(project)
            .map(|filter| vec!["--filter".to_string(), filter])
            .unwrap_or_default(),
        CommandKind::Other => Vec::new(),
    };

    if injected.is_empty() {
        return args.to_vec();
    }

    let mut scoped = Vec::with_capacity(args.len() + injected.len());
    scoped.extend_from_slice(&args[..split]);
    scoped.extend(injected);
    scoped.extend_from_slice(&args[split..]);
    scoped
}

/// Prefix listing flags with the project filter
pub fn scope_listing(args: Vec<String>, project: Option<&ProjectIdentity>) -> Vec<String> {
    match project_filter(project) {
        Some(filter) => {
            let mut scoped = vec!["--filter".to_string(), filter];
            scoped.extend(args);
            scoped
        }
        None => args,
    }
}
