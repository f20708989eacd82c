use crate::error::{FsError, Result};

/// Split an absolute, canonical path into its components.
///
/// The empty string and `/` denote the root and split into no components.
/// Anything else must start with `/`, must not end with `/`, and must not
/// contain empty, `.` or `..` components; callers supply canonical paths
/// and non-canonical forms are rejected rather than normalized.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    if path.is_empty() || path == "/" {
        return Ok(Vec::new());
    }
    if !path.starts_with('/') || path.ends_with('/') {
        return Err(FsError::ParamError);
    }

    let mut components = Vec::new();
    for component in path[1..].split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(FsError::ParamError);
        }
        components.push(component);
    }
    Ok(components)
}

/// Join a directory path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/").unwrap(), Vec::<&str>::new());
        assert_eq!(split_path("").unwrap(), Vec::<&str>::new());
        assert_eq!(split_path("/foo").unwrap(), vec!["foo"]);
        assert_eq!(split_path("/foo/bar").unwrap(), vec!["foo", "bar"]);
    }

    #[test]
    fn test_split_path_rejects_non_canonical() {
        assert_eq!(split_path("foo/bar"), Err(FsError::ParamError));
        assert_eq!(split_path("/foo/"), Err(FsError::ParamError));
        assert_eq!(split_path("/foo//bar"), Err(FsError::ParamError));
        assert_eq!(split_path("/foo/./bar"), Err(FsError::ParamError));
        assert_eq!(split_path("/foo/../bar"), Err(FsError::ParamError));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "foo"), "/foo");
        assert_eq!(join_path("/foo", "bar"), "/foo/bar");
    }
}
