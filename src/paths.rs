//! Path normalisation and containment checks
//!
//! All paths stored in directives and checked against the allow-list use a
//! lexically normalised absolute form: `.` and `..` components are resolved
//! without touching the filesystem, and symbolic links are left alone.
//! Containment uses component-wise prefix comparison so that `/a/b` never
//! satisfies an allow-list entry of `/a/bc`.

use std::path::{Component, Path, PathBuf};

/// Lexically normalise a path, resolving `.` and `..` components.
///
/// Relative paths are made absolute against the current working directory.
/// No symlink resolution is performed.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };
    normalize_components(&absolute)
}

/// Normalise `path` against `base`: absolute paths pass through (normalised),
/// relative paths are joined to `base` first.
pub fn normalize_against(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_components(path)
    } else {
        normalize(&base.join(path))
    }
}

fn normalize_components(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // never pop past the root
                if !matches!(
                    result.components().last(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    result.pop();
                }
            }
            other => result.push(other),
        }
    }
    result
}

/// Returns true if `child` equals `parent` or is a descendant of it.
///
/// Comparison is component-wise, so `/a/b` is not under `/a/bc`.
pub fn is_under(child: &Path, parent: &Path) -> bool {
    child == parent || child.starts_with(parent)
}

/// Render a path relative to the current working directory for display.
///
/// Falls back to the absolute form when the path is not under the cwd.
pub fn to_relative(path: &Path) -> String {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(_) => return path.display().to_string(),
    };
    match path.strip_prefix(&cwd) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

/// Compute a POSIX-style relative path from `base_dir` to `target`.
///
/// Used for link targets in compiled output. Falls back to the file name
/// when the two paths share no common ancestor component.
pub fn relative_link(target: &Path, base_dir: &Path) -> String {
    let target_components: Vec<_> = target.components().collect();
    let base_components: Vec<_> = base_dir.components().collect();

    let common = target_components
        .iter()
        .zip(base_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if common == 0 {
        return target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.display().to_string());
    }

    let mut parts: Vec<String> = Vec::new();
    for _ in common..base_components.len() {
        parts.push("..".to_string());
    }
    for component in &target_components[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_resolves_dot_components() {
        let normalized = normalize(Path::new("/a/./b/../c"));
        assert_eq!(normalized, PathBuf::from("/a/c"));
    }

    #[test]
    fn test_normalize_does_not_pop_past_root() {
        let normalized = normalize(Path::new("/../../a"));
        assert_eq!(normalized, PathBuf::from("/a"));
    }

    #[test]
    fn test_normalize_against_joins_relative() {
        let normalized = normalize_against(Path::new("./child.md"), Path::new("/docs"));
        assert_eq!(normalized, PathBuf::from("/docs/child.md"));
    }

    #[test]
    fn test_normalize_against_passes_absolute_through() {
        let normalized = normalize_against(Path::new("/other/file.md"), Path::new("/docs"));
        assert_eq!(normalized, PathBuf::from("/other/file.md"));
    }

    #[test]
    fn test_equivalent_spellings_normalize_identically() {
        let base = Path::new("/docs");
        let a = normalize_against(Path::new("./sub/../sub/x.md"), base);
        let b = normalize_against(Path::new("sub/x.md"), base);
        assert_eq!(a, b);
    }

    #[test]
    fn test_is_under_component_wise() {
        assert!(is_under(Path::new("/a/b"), Path::new("/a")));
        assert!(is_under(Path::new("/a"), Path::new("/a")));
        assert!(!is_under(Path::new("/a/b"), Path::new("/a/bc")));
        assert!(!is_under(Path::new("/ab"), Path::new("/a")));
    }

    #[test]
    fn test_relative_link_same_dir() {
        let link = relative_link(Path::new("/docs/src/lib.rs"), Path::new("/docs/src"));
        assert_eq!(link, "lib.rs");
    }

    #[test]
    fn test_relative_link_up_and_down() {
        let link = relative_link(Path::new("/docs/src/lib.rs"), Path::new("/docs/out"));
        assert_eq!(link, "../src/lib.rs");
    }
}
