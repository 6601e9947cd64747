use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SortError};
use crate::tree::{NodeId, SeriesTree};

/// Expands the selected nodes into file paths. Selecting a group node means
/// every file below it; a file reachable from two selected nodes is listed
/// twice.
pub fn resolve_selection(tree: &SeriesTree, selected: &[NodeId]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for &id in selected {
        tree.collect_files(id, &mut files);
    }
    files
}

/// Copies every file under the selection into `destination`, keeping file
/// names and overwriting existing ones. Returns the number of copies made.
///
/// Files that no longer exist are skipped, as are files whose target is the
/// source itself. Any other I/O failure stops the batch; copies already made
/// are kept.
pub fn resolve_and_copy(
    tree: &SeriesTree,
    selected: &[NodeId],
    destination: Option<&Path>,
) -> Result<usize> {
    if selected.is_empty() {
        return Err(SortError::NoSelection);
    }
    let destination = destination.ok_or(SortError::NoDestination)?;

    let files = resolve_selection(tree, selected);
    let mut copied = 0;
    for source in &files {
        if !source.is_file() {
            log::warn!("Skipping {}: no longer a regular file", source.display());
            continue;
        }
        let Some(file_name) = source.file_name() else {
            continue;
        };
        let target = destination.join(file_name);
        if is_same_file(source, &target) {
            log::warn!("Skipping {}: source and target are the same file", source.display());
            continue;
        }
        fs::copy(source, &target).map_err(|err| SortError::io(source, err))?;
        copied += 1;
    }

    log::info!(
        "Copied {copied} of {} selected files to {}",
        files.len(),
        destination.display()
    );
    Ok(copied)
}

/// True when both paths resolve to one existing file.
fn is_same_file(source: &Path, target: &Path) -> bool {
    match (fs::canonicalize(source), fs::canonicalize(target)) {
        (Ok(source), Ok(target)) => source == target,
        _ => false,
    }
}
