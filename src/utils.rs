//! Utility functions for file naming and path manipulation

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Characters that are illegal in file names on common filesystems, paired with
/// the look-alike replacement used for destination names.
///
/// Existing libraries on disk were named with exactly these substitutes, so the
/// table must not change or duplicate detection against them breaks.
const FILENAME_SUBSTITUTIONS: &[(char, &str)] = &[
    (':', "\u{A789}"),  // MODIFIER LETTER COLON
    ('"', "'"),
    ('?', "\u{FF1F}"),  // FULLWIDTH QUESTION MARK
    ('*', "\u{2217}"),  // ASTERISK OPERATOR
    ('|', "\u{FF5C}"),  // FULLWIDTH VERTICAL LINE
    ('<', "\u{227A}"),  // PRECEDES
    ('>', "\u{227B}"),  // SUCCEEDS
    ('/', "\u{2215}"),  // DIVISION SLASH
    ('\\', "\u{29F5}"), // REVERSE SOLIDUS OPERATOR
];

/// Replace characters that are illegal in file names with visually similar substitutes
///
/// # Examples
///
/// ```
/// use episode_dl::utils::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("Re:Zero"), "Re\u{A789}Zero");
/// assert_eq!(sanitize_file_name("What?"), "What\u{FF1F}");
/// assert_eq!(sanitize_file_name("plain"), "plain");
/// ```
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for c in name.chars() {
        match FILENAME_SUBSTITUTIONS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => cleaned.push_str(to),
            None => cleaned.push(c),
        }
    }
    cleaned
}

/// Lexically normalize a path: drop `.` components and resolve `..` against
/// preceding normal components
///
/// Does not touch the filesystem, so symlinks are not resolved.
///
/// # Examples
///
/// ```
/// use episode_dl::utils::normalize_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     normalize_path(Path::new("/tv/./shows/../downloads/ep.mp4")),
///     PathBuf::from("/tv/downloads/ep.mp4")
/// );
/// ```
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Build the destination path for a download: `<dir>/<sanitized name>.<extension>`
///
/// The name is sanitized so it always forms a single path segment.
#[must_use]
pub fn destination_path(dir: &Path, name: &str, extension: &str) -> PathBuf {
    let file_name = if extension.is_empty() {
        sanitize_file_name(name)
    } else {
        format!("{}.{}", sanitize_file_name(name), extension)
    };
    normalize_path(&dir.join(file_name))
}

/// Check that a path can serve as the download work directory
///
/// The directory must exist, be a directory, and not be read-only. Returns the
/// absolute, normalized form of the path.
pub fn validate_work_dir(path: &Path) -> Result<PathBuf> {
    let invalid = |reason: &str| Error::InvalidWorkDir {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let metadata = std::fs::metadata(path).map_err(|_| invalid("does not exist"))?;
    if !metadata.is_dir() {
        return Err(invalid("is not a directory"));
    }
    if metadata.permissions().readonly() {
        return Err(invalid("is not writable"));
    }

    let absolute = std::path::absolute(path)?;
    Ok(normalize_path(&absolute))
}
