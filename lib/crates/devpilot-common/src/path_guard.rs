//! Lexical containment check for caller-supplied paths.
//!
//! `resolve` never touches the filesystem, so it works for targets that do
//! not exist yet (patch creates). Containment is decided component by
//! component: a root of `/srv/fo` never contains `/srv/foo/x`.
//!
//! Symlinks are not followed. A link inside a project root that points
//! outside it is a residual risk this module does not address.
//!
//! Every caller path is percent-decoded before it is joined, so `..%2f`
//! cannot smuggle a traversal past the check. As a consequence, a `%` in a
//! real file name must itself be escaped as `%25`: a file listed as
//! `a%41.txt` is addressed as `a%2541.txt`, since `a%41.txt` decodes to
//! `aA.txt`.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Why a caller-supplied path was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathGuardError {
    #[error("path traversal not allowed: {0}")]
    Escapes(String),

    #[error("malformed path: {0}")]
    Malformed(String),
}

/// Join `user_path` onto `root` and return the normalized absolute path,
/// or refuse it if the result leaves the root subtree.
///
/// The user path is percent-decoded first so `..%2f..%2f` is treated as
/// `../../`. An absolute user path replaces the root (as `Path::join` does)
/// and is therefore refused unless it happens to point inside the root.
/// The root itself is accepted.
///
/// # Errors
///
/// [`PathGuardError::Malformed`] when the decoded path is not UTF-8 or
/// contains a NUL byte, [`PathGuardError::Escapes`] when the normalized
/// result is not below `root`.
pub fn resolve(root: &Path, user_path: &str) -> Result<PathBuf, PathGuardError> {
    let decoded = percent_decode_str(user_path)
        .decode_utf8()
        .map_err(|_| PathGuardError::Malformed(user_path.to_string()))?;
    if decoded.contains('\0') {
        return Err(PathGuardError::Malformed(user_path.to_string()));
    }

    let root = normalize(root);
    let candidate = normalize(&root.join(decoded.as_ref()));

    if candidate.starts_with(&root) {
        Ok(candidate)
    } else {
        Err(PathGuardError::Escapes(user_path.to_string()))
    }
}

/// Collapse `.` and `..` without consulting the filesystem.
///
/// `..` never climbs above a root or prefix component; leading `..` of a
/// relative path are kept.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::ParentDir | Component::CurDir) | None => out.push(".."),
            },
            Component::Normal(segment) => out.push(segment),
        }
    }
    out
}
