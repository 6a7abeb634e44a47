use std::io;
use std::path::{Path, PathBuf};

/// Errors that can occur during path validation
#[derive(Debug, thiserror::Error)]
pub enum PathSecurityError {
    #[error("Path '{path}' is outside data root '{root}'")]
    OutsideRootDirectory { path: PathBuf, root: PathBuf },

    #[error("Symlink '{path}' is not allowed under the data root")]
    SymlinkNotAllowed { path: PathBuf },

    #[error("Path does not exist: '{path}'")]
    PathNotFound { path: PathBuf },

    #[error("IO error for path '{path}': {error}")]
    IoError { path: PathBuf, error: io::Error },
}

/// Validates that `input_path` resolves to a location inside `root`.
///
/// The path is canonicalized, so `..` segments and symlinks are resolved
/// before the containment check. When `allow_symlinks` is false, a path
/// that is itself a symlink is rejected even if its target is inside the
/// root.
///
/// Returns the canonical path on success.
pub fn validate_data_path(
    input_path: &Path,
    root: &Path,
    allow_symlinks: bool,
) -> Result<PathBuf, PathSecurityError> {
    let canonical_root = root.canonicalize().map_err(|e| PathSecurityError::IoError {
        path: root.to_path_buf(),
        error: e,
    })?;

    if !allow_symlinks && input_path.is_symlink() {
        return Err(PathSecurityError::SymlinkNotAllowed {
            path: input_path.to_path_buf(),
        });
    }

    let canonical_path = input_path.canonicalize().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            PathSecurityError::PathNotFound {
                path: input_path.to_path_buf(),
            }
        } else {
            PathSecurityError::IoError {
                path: input_path.to_path_buf(),
                error: e,
            }
        }
    })?;

    if !canonical_path.starts_with(&canonical_root) {
        return Err(PathSecurityError::OutsideRootDirectory {
            path: canonical_path,
            root: canonical_root,
        });
    }

    Ok(canonical_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_path_within_root() {
        let temp_dir = TempDir::new().unwrap();
        let part = temp_dir.path().join("part-0.parquet");
        fs::write(&part, "x").unwrap();

        let result = validate_data_path(&part, temp_dir.path(), false);

        assert!(result.is_ok());
    }

    #[test]
    fn test_path_outside_root() {
        let root_dir = TempDir::new().unwrap();
        let outside_dir = TempDir::new().unwrap();
        let outside_file = outside_dir.path().join("outside.parquet");
        fs::write(&outside_file, "x").unwrap();

        let result = validate_data_path(&outside_file, root_dir.path(), true);

        assert!(matches!(
            result,
            Err(PathSecurityError::OutsideRootDirectory { .. })
        ));
    }

    #[test]
    fn test_path_traversal_blocked() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("gold");
        fs::create_dir(&root).unwrap();
        fs::write(temp_dir.path().join("secret.parquet"), "x").unwrap();

        let traversal_path = root.join("../secret.parquet");
        let result = validate_data_path(&traversal_path, &root, true);

        assert!(matches!(
            result,
            Err(PathSecurityError::OutsideRootDirectory { .. })
        ));
    }

    #[test]
    fn test_nonexistent_path() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("country=ES");

        let result = validate_data_path(&missing, temp_dir.path(), true);

        assert!(matches!(result, Err(PathSecurityError::PathNotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_policy() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let target_file = temp_dir.path().join("target.parquet");
        let link_file = temp_dir.path().join("link.parquet");
        fs::write(&target_file, "x").unwrap();
        symlink(&target_file, &link_file).unwrap();

        assert!(validate_data_path(&link_file, temp_dir.path(), true).is_ok());
        assert!(matches!(
            validate_data_path(&link_file, temp_dir.path(), false),
            Err(PathSecurityError::SymlinkNotAllowed { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_outside_root_blocked() {
        use std::os::unix::fs::symlink;

        let root_dir = TempDir::new().unwrap();
        let outside_dir = TempDir::new().unwrap();
        let target_file = outside_dir.path().join("target.parquet");
        let link_file = root_dir.path().join("link.parquet");
        fs::write(&target_file, "x").unwrap();
        symlink(&target_file, &link_file).unwrap();

        let result = validate_data_path(&link_file, root_dir.path(), true);

        assert!(matches!(
            result,
            Err(PathSecurityError::OutsideRootDirectory { .. })
        ));
    }
}
