//! Host tool discovery: implements the `ToolLocator` port.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::application::ports::ToolLocator;

/// Looks tools up on a `PATH`-style search list, like `command -v`.
pub struct PathLocator {
    search_path: Option<OsString>,
}

impl PathLocator {
    /// Search the process `PATH`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Search an explicit `PATH`-style list.
    #[must_use]
    pub fn with_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }
}

impl ToolLocator for PathLocator {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        // An empty entry would make `which` search the working directory.
        let dirs: Vec<PathBuf> = std::env::split_paths(search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect();
        if dirs.is_empty() {
            return None;
        }
        let joined = std::env::join_paths(dirs).ok()?;
        let cwd = std::env::current_dir().ok()?;
        match which::which_in(tool, Some(joined), cwd) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::debug!(tool, error = %e, "tool not found");
                None
            }
        }
    }
}
