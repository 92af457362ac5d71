//! Index of recently used projects, kept as JSON in the client config dir

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Result;
use crate::scoping::ProjectIdentity;

pub const RECENT_PROJECTS_FILE: &str = ".recentProjects.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentProject {
    pub id: String,
    pub name: String,
    pub root: PathBuf,
    /// Last use, Unix seconds
    pub timestamp: i64,
}

/// Handle on the index file
pub struct RecentProjects {
    path: PathBuf,
}

impl RecentProjects {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries, most recent first. A missing or unreadable index is empty.
    pub fn load(&self) -> Vec<RecentProject> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("failed to read {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<RecentProject>>(&content) {
            Ok(mut projects) => {
                sort(&mut projects);
                projects
            }
            Err(e) => {
                warn!("ignoring corrupt project index {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Insert or refresh a project. One entry per id; an older timestamp never
    /// replaces a newer one.
    pub fn record(&self, project: &ProjectIdentity, root: &Path, timestamp: i64) -> Result<()> {
        let mut projects = self.load();

        match projects.iter_mut().find(|p| p.id == project.id) {
            Some(existing) => {
                existing.name = project.name.clone();
                existing.root = root.to_path_buf();
                existing.timestamp = existing.timestamp.max(timestamp);
            }
            None => projects.push(RecentProject {
                id: project.id.clone(),
                name: project.name.clone(),
                root: root.to_path_buf(),
                timestamp,
            }),
        }
        sort(&mut projects);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&projects)?)?;

        debug!("recorded project {} in {}", project.id, self.path.display());
        Ok(())
    }
}

fn sort(projects: &mut [RecentProject]) {
    projects.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
