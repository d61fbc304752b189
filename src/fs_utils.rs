use std::fs;
use std::io;
use std::path::Path;

/// Create a directory and its parents, owner rwx and group/other rx on unix
pub fn create_dir_all(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }

    builder.create(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_nested_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b").join("c");

        create_dir_all(&nested).unwrap();
        assert!(nested.is_dir());

        // Already existing is fine
        create_dir_all(&nested).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_dir_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("logs");
        create_dir_all(&dir).unwrap();

        let mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        // umask may only remove bits
        assert_eq!(mode & !0o755, 0);
        assert_ne!(mode & 0o700, 0);
    }
}
