use std::path::{Component, Path, PathBuf};

/// Roots visited so far, with a cursor for back and forward.
///
/// Navigating somewhere new drops every entry ahead of the cursor, the
/// way a browser history does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationHistory {
    paths: Vec<PathBuf>,
    index: usize,
}

impl NavigationHistory {
    pub fn new(start: &Path) -> Self {
        Self {
            paths: vec![start.to_path_buf()],
            index: 0,
        }
    }

    pub fn current(&self) -> &Path {
        &self.paths[self.index]
    }

    /// Record a visit to `path`. Returns `false` when it is already current.
    pub fn navigate(&mut self, path: &Path) -> bool {
        if self.current() == path {
            return false;
        }
        self.paths.truncate(self.index + 1);
        self.paths.push(path.to_path_buf());
        self.index += 1;
        true
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.index + 1 < self.paths.len()
    }

    pub fn back(&mut self) -> Option<&Path> {
        if !self.can_go_back() {
            return None;
        }
        self.index -= 1;
        Some(self.current())
    }

    pub fn forward(&mut self) -> Option<&Path> {
        if !self.can_go_forward() {
            return None;
        }
        self.index += 1;
        Some(self.current())
    }

    /// Forget `path` after it failed to load and step back to the entry
    /// before it. Returns the root to show instead.
    pub fn discard(&mut self, path: &Path) -> Option<&Path> {
        if self.current() != path || self.paths.len() == 1 {
            return None;
        }
        self.paths.remove(self.index);
        self.index = self.index.saturating_sub(1);
        Some(self.current())
    }
}

/// Turn what the user typed into an absolute path.
///
/// A leading `~` is the home directory and relative input is taken from
/// `base`. `.` and `..` are folded lexically; symlinks are left alone.
pub fn resolve_typed_path(input: &str, base: &Path) -> Option<PathBuf> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let joined = if input == "~" {
        dirs::home_dir()?
    } else if let Some(rest) = input.strip_prefix("~/") {
        dirs::home_dir()?.join(rest)
    } else {
        base.join(input)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(paths: &[&str]) -> NavigationHistory {
        let mut h = NavigationHistory::new(Path::new(paths[0]));
        for p in &paths[1..] {
            h.navigate(Path::new(p));
        }
        h
    }

    #[test]
    fn back_and_forward_walk_the_visits() {
        let mut h = history(&["/a", "/b", "/c"]);
        assert!(!h.can_go_forward());
        assert_eq!(h.back(), Some(Path::new("/b")));
        assert_eq!(h.back(), Some(Path::new("/a")));
        assert_eq!(h.back(), None);
        assert_eq!(h.forward(), Some(Path::new("/b")));
        assert_eq!(h.current(), Path::new("/b"));
    }

    #[test]
    fn navigating_after_back_drops_forward_entries() {
        let mut h = history(&["/a", "/b", "/c"]);
        h.back();
        h.back();
        assert!(h.navigate(Path::new("/d")));
        assert!(!h.can_go_forward());
        assert_eq!(h.back(), Some(Path::new("/a")));
    }

    #[test]
    fn navigating_to_the_current_path_is_a_no_op() {
        let mut h = history(&["/a"]);
        assert!(!h.navigate(Path::new("/a")));
        assert!(!h.can_go_back());
    }

    #[test]
    fn discard_returns_to_the_previous_root() {
        let mut h = history(&["/a", "/missing"]);
        assert_eq!(h.discard(Path::new("/other")), None);
        assert_eq!(h.discard(Path::new("/missing")), Some(Path::new("/a")));
        assert!(!h.can_go_forward());
        assert_eq!(h.discard(Path::new("/a")), None);
    }

    #[test]
    fn typed_paths_resolve_against_the_root() {
        let base = Path::new("/srv/project");
        assert_eq!(
            resolve_typed_path("src/../docs", base),
            Some(PathBuf::from("/srv/project/docs"))
        );
        assert_eq!(
            resolve_typed_path("/etc/./ssh", base),
            Some(PathBuf::from("/etc/ssh"))
        );
        assert_eq!(resolve_typed_path("..", base), Some(PathBuf::from("/srv")));
        assert_eq!(resolve_typed_path("   ", base), None);
    }

    #[test]
    fn tilde_expands_to_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(resolve_typed_path("~", Path::new("/x")), Some(home.clone()));
        assert_eq!(
            resolve_typed_path("~/notes", Path::new("/x")),
            Some(home.join("notes"))
        );
    }
}
