use std::path::{Path, PathBuf};

use reune_core::paths::REUNE_DIR;

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `REUNE_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.reune/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_marked_ancestor(&cwd).unwrap_or(cwd)
}

fn find_marked_ancestor(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(REUNE_DIR).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn finds_reune_dir_above() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".reune")).unwrap();
        let subdir = dir.path().join("src/deep");
        std::fs::create_dir_all(&subdir).unwrap();
        assert_eq!(find_marked_ancestor(&subdir).unwrap(), dir.path());
    }

    #[test]
    fn no_marker_found() {
        let dir = TempDir::new().unwrap();
        assert!(find_marked_ancestor(dir.path()).is_none());
    }
}
