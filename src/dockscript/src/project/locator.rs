//! Upward search for the project marker

use std::path::{Component, Path, PathBuf};

/// File that marks a directory as a project root
pub const MARKER_FILE: &str = "dockerproject.lua";

/// Lexically normalize `path`, resolving `.` and `..` without touching the
/// filesystem. Relative paths are taken from the current directory.
fn clean(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

pub fn is_project_root(dir: &Path) -> bool {
    dir.join(MARKER_FILE).is_file()
}

/// Nearest directory at or above `start` holding the marker file
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = clean(start);
    loop {
        if is_project_root(&dir) {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}
