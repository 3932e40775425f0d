//! Host to sandbox path mapping.
//!
//! The sandbox always mounts the project root at one fixed mount point, so
//! a host path under the root maps to `<mount point>/<relative path>` no
//! matter where the root lives on the host.

use std::path::{Component, Path};

use filestate_flutter_core::{Error, ProjectRoot, Result};

/// Map `host_path` (absolute, or relative to the root) to its path inside
/// the sandbox.
///
/// This function:
/// 1. Strips the root prefix from absolute paths.
/// 2. Normalizes `.` and `..` without leaving the root.
/// 3. Joins the remaining components onto `mount_point` with `/`.
pub fn container_path(root: &ProjectRoot, host_path: &Path, mount_point: &str) -> Result<String> {
    let outside = || Error::PathOutsideRoot {
        path: host_path.display().to_string(),
        root: root.key(),
    };

    let relative = if host_path.is_absolute() {
        host_path.strip_prefix(root.path()).map_err(|_| outside())?
    } else {
        host_path
    };

    let mut parts: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(c) => parts.push(c.to_string_lossy().into_owned()),
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(outside());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(outside()),
            Component::CurDir => {}
        }
    }

    let mount = mount_point.trim_end_matches('/');
    if parts.is_empty() {
        return Ok(if mount.is_empty() { "/".to_string() } else { mount.to_string() });
    }
    Ok(format!("{}/{}", mount, parts.join("/")))
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,@".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> (tempfile::TempDir, ProjectRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = ProjectRoot::resolve(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_maps_absolute_paths_under_root() {
        let (_dir, root) = root();
        let host = root.join("lib").join("main.dart");
        assert_eq!(
            container_path(&root, &host, "/var/www/html").unwrap(),
            "/var/www/html/lib/main.dart"
        );
    }

    #[test]
    fn test_independent_of_root_location() {
        let (_a, root_a) = root();
        let (_b, root_b) = root();
        let rel = Path::new("lib/src/widget.dart");
        assert_eq!(
            container_path(&root_a, &root_a.join(rel), "/var/www/html").unwrap(),
            container_path(&root_b, &root_b.join(rel), "/var/www/html").unwrap(),
        );
    }

    #[test]
    fn test_relative_and_normalized_paths() {
        let (_dir, root) = root();
        assert_eq!(
            container_path(&root, Path::new("./lib/../bin/app.dart"), "/var/www/html/").unwrap(),
            "/var/www/html/bin/app.dart"
        );
        assert_eq!(
            container_path(&root, root.path(), "/var/www/html").unwrap(),
            "/var/www/html"
        );
    }

    #[test]
    fn test_rejects_paths_outside_root() {
        let (_dir, root) = root();
        assert!(container_path(&root, Path::new("../etc/passwd"), "/var/www/html").is_err());
        assert!(container_path(&root, Path::new("/etc/passwd"), "/var/www/html").is_err());
        assert!(container_path(&root, &root.join("lib/../../x.dart"), "/var/www/html").is_err());
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/var/www/html/lib/main.dart"), "/var/www/html/lib/main.dart");
        assert_eq!(shell_quote("/var/www/html/my file.dart"), "'/var/www/html/my file.dart'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
