use std::path::{Path, PathBuf};

pub const REUNE_DIR: &str = ".reune";
pub const CONFIG_FILE: &str = ".reune/config.yaml";

pub fn reune_dir(root: &Path) -> PathBuf {
    root.join(REUNE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve a configured database path. Relative paths live under `.reune/`.
pub fn database_path(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        reune_dir(root).join(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_lives_under_reune_dir() {
        let root = Path::new("/srv/acme");
        assert_eq!(
            config_path(root),
            PathBuf::from("/srv/acme/.reune/config.yaml")
        );
    }

    #[test]
    fn relative_database_path_is_anchored() {
        let root = Path::new("/srv/acme");
        assert_eq!(
            database_path(root, Path::new("reune.redb")),
            PathBuf::from("/srv/acme/.reune/reune.redb")
        );
    }

    #[test]
    fn absolute_database_path_is_kept() {
        let root = Path::new("/srv/acme");
        assert_eq!(
            database_path(root, Path::new("/var/lib/reune.redb")),
            PathBuf::from("/var/lib/reune.redb")
        );
    }
}
