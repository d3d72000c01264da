/// Structural snapshot of a copied-in folder.
///
/// One [`FolderNode`] per visited directory, in walk order (root first,
/// depth-first). A consumer can reconstruct a readable tree purely from the
/// node sequence plus each node's relative-path depth. The snapshot is taken
/// once and never re-scanned.
use compact_str::CompactString;
use serde::Serialize;

/// A single file inside one directory of the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// File name only (no path).
    pub name: CompactString,
    /// Logical size in bytes at snapshot time.
    pub size: u64,
    /// Lower-cased extension without the dot; empty when the name has none.
    #[serde(rename = "type")]
    pub extension: CompactString,
}

/// One directory level of the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FolderNode {
    /// Path relative to the arrival root; the empty string is the root itself.
    pub path: String,
    /// Immediate files of this directory.
    pub files: Vec<FileEntry>,
    /// Names of this directory's immediate subdirectories.
    pub subfolders: Vec<CompactString>,
}

impl FolderNode {
    pub fn new(path: String) -> Self {
        Self {
            path,
            files: Vec::new(),
            subfolders: Vec::new(),
        }
    }
}

/// The full index of one folder arrival: node sequence plus aggregates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderIndex {
    /// Nodes in walk order; `nodes[0]` is always the arrival root.
    pub nodes: Vec<FolderNode>,
    /// Count of every stat-able file across all nodes.
    pub total_files: u64,
    /// Count of every visited subdirectory, from its parent's perspective.
    pub total_folders: u64,
    /// Sum of all file sizes across all nodes.
    pub total_size: u64,
}
