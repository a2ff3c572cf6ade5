//! Workspace confinement for file paths.

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Resolve `requested` against the canonical workspace `root` and ensure the
/// result stays inside it.
///
/// Existing prefixes are canonicalized (so symlinks are followed) and `..` is
/// applied to the path resolved so far, matching how the kernel would walk it.
/// Components that do not exist yet are appended lexically, which lets
/// `write_text` target new files. A dangling symlink cannot be checked and is
/// rejected.
pub fn confine(root: &Path, requested: &str) -> Result<PathBuf, String> {
    let outside = || {
        format!(
            "Path '{}' is outside workspace root '{}'",
            requested,
            root.display()
        )
    };

    let mut resolved = PathBuf::new();
    for component in root.join(requested).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                resolved = PathBuf::from(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => {
                resolved.push(part);
                if fs::symlink_metadata(&resolved).is_ok() {
                    resolved = fs::canonicalize(&resolved).map_err(|_| outside())?;
                }
            }
        }
    }

    if resolved.starts_with(root) {
        Ok(resolved)
    } else {
        Err(outside())
    }
}

/// `path` relative to `root`, as a display string (empty for the root itself).
pub fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = fs::canonicalize(temp.path()).expect("canonicalize");
        (temp, root)
    }

    #[test]
    fn relative_paths_resolve_inside_root() {
        let (_temp, root) = workspace();
        fs::create_dir(root.join("data")).expect("mkdir");
        assert_eq!(confine(&root, "data/notes.txt"), Ok(root.join("data/notes.txt")));
        assert_eq!(confine(&root, "./data/../x.txt"), Ok(root.join("x.txt")));
        assert_eq!(confine(&root, "."), Ok(root.clone()));
    }

    #[test]
    fn parent_escape_is_rejected() {
        let (_temp, root) = workspace();
        let err = confine(&root, "../outside.txt").expect_err("escape");
        assert!(err.contains("outside workspace"), "{err}");
        assert!(confine(&root, "a/../../b").is_err());
    }

    #[test]
    fn absolute_path_outside_is_rejected() {
        let (_temp, root) = workspace();
        let err = confine(&root, "/etc/passwd").expect_err("absolute");
        assert_eq!(
            err,
            format!("Path '/etc/passwd' is outside workspace root '{}'", root.display())
        );
    }

    #[test]
    fn absolute_path_inside_is_accepted() {
        let (_temp, root) = workspace();
        let inside = root.join("file.txt");
        let requested = inside.to_string_lossy().into_owned();
        assert_eq!(confine(&root, &requested), Ok(inside));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let (_temp, root) = workspace();
        let (_other, outside) = workspace();
        fs::write(outside.join("secret.txt"), "s").expect("write");
        std::os::unix::fs::symlink(&outside, root.join("link")).expect("symlink");

        assert!(confine(&root, "link/secret.txt").is_err());
        assert!(confine(&root, "link/new.txt").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_rejected() {
        let (_temp, root) = workspace();
        std::os::unix::fs::symlink("/nonexistent/target", root.join("dangling")).expect("symlink");
        assert!(confine(&root, "dangling").is_err());
    }

    #[test]
    fn relative_display_strips_root() {
        let root = Path::new("/w");
        assert_eq!(relative_display(root, Path::new("/w/a/b.txt")), "a/b.txt");
        assert_eq!(relative_display(root, Path::new("/elsewhere")), "/elsewhere");
    }
}
