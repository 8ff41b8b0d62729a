//! Subject directory discovery.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CohortError;

/// One subject directory in a cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectDir {
    /// Subject identifier, taken from the directory name.
    pub id: String,
    pub path: PathBuf,
}

/// Lists the immediate subdirectories of `root`, sorted by name.
///
/// The sort makes output row order independent of filesystem enumeration
/// order. Plain files at the top level are ignored; symlinks to directories
/// count as subjects.
///
/// # Errors
///
/// Returns `CohortError` if `root` does not exist, is not a directory, or
/// cannot be listed.
pub fn discover_subjects(root: &Path) -> Result<Vec<SubjectDir>, CohortError> {
    if !root.exists() {
        return Err(CohortError::InputNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(CohortError::NotADirectory(root.to_path_buf()));
    }

    let discovery_err = |source| CohortError::Discovery {
        path: root.to_path_buf(),
        source,
    };

    let mut subjects = Vec::new();
    for entry in fs::read_dir(root).map_err(discovery_err)? {
        let entry = entry.map_err(discovery_err)?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        subjects.push(SubjectDir {
            id: entry.file_name().to_string_lossy().into_owned(),
            path,
        });
    }

    subjects.sort_by(|a, b| a.id.cmp(&b.id));
    debug!(root = %root.display(), subjects = subjects.len(), "Discovered subject directories");
    Ok(subjects)
}
