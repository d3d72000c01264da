/// Folder indexer — structural snapshot of a copied-in folder.
///
/// Walks the arrival root once and emits one [`FolderNode`] per visited
/// directory (root first, depth-first, entries sorted by name) recording its
/// immediate files and subdirectory names, plus running totals. The sorted
/// walk makes the node sequence reproducible from identical on-disk state,
/// so a tree renderer can rebuild the structure from order + depth alone.
///
/// Failure policy: a file that cannot be stat-ed is skipped; a directory
/// that cannot be read is logged and its branch is not descended. Neither
/// aborts the walk.
use crate::model::{FileEntry, FolderIndex, FolderNode};
use compact_str::CompactString;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Build the index for one folder arrival.
pub fn index(root: &Path) -> FolderIndex {
    let mut nodes: Vec<FolderNode> = Vec::new();
    // Maps a visited directory's relative path to its slot in `nodes`, so
    // files and subfolder names land in their parent as the walk yields them.
    let mut dir_slots: HashMap<PathBuf, usize> = HashMap::new();

    let mut total_files: u64 = 0;
    let mut total_folders: u64 = 0;
    let mut total_size: u64 = 0;

    let walker = jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .sort(true)
        .parallelism(jwalk::Parallelism::RayonNewPool(num_cpus::get()));

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                // Typically access-denied on a subdirectory; the walk skips
                // that branch and carries on.
                warn!("folder index: cannot read {:?}: {err}", err.path());
                continue;
            }
        };

        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        if entry.file_type().is_dir() {
            if !rel.as_os_str().is_empty() {
                let parent_rel = rel.parent().map(Path::to_path_buf).unwrap_or_default();
                if let Some(&slot) = dir_slots.get(&parent_rel) {
                    nodes[slot]
                        .subfolders
                        .push(CompactString::new(entry.file_name().to_string_lossy().as_ref()));
                }
                total_folders += 1;
            }
            let slot = nodes.len();
            nodes.push(FolderNode::new(rel.to_string_lossy().into_owned()));
            dir_slots.insert(rel, slot);
        } else {
            let parent_rel = rel.parent().map(Path::to_path_buf).unwrap_or_default();
            let Some(&slot) = dir_slots.get(&parent_rel) else {
                // Parent was unreadable; its contents were never indexed.
                debug!("folder index: no parent node for {:?}", path);
                continue;
            };

            let size = match std::fs::symlink_metadata(&path) {
                Ok(meta) => meta.len(),
                Err(err) => {
                    warn!("folder index: cannot stat {:?}: {err}", path);
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy();
            nodes[slot].files.push(FileEntry {
                name: CompactString::new(name.as_ref()),
                size,
                extension: file_extension(&name),
            });
            total_files += 1;
            total_size += size;
        }
    }

    FolderIndex {
        nodes,
        total_files,
        total_folders,
        total_size,
    }
}

/// Lower-cased extension of a file name, without the dot; empty when absent.
pub(crate) fn file_extension(name: &str) -> CompactString {
    Path::new(name)
        .extension()
        .map(|ext| CompactString::new(ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
