//! Plain-text knowledge base used as retrieved context.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Concatenate every `*.txt` file in `dir`, sorted by file name.
///
/// Each file contributes a block `\n---\n# <file name>\n<trimmed contents>`.
/// Files that cannot be read are logged and skipped. An empty directory
/// yields an empty string, which the stages treat as "no context".
pub fn load_context(dir: &Path) -> Result<String> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();

    let mut blocks = Vec::with_capacity(files.len());
    for path in &files {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                blocks.push(format!("\n---\n# {}\n{}", name, content.trim()));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable knowledge file"),
        }
    }

    info!(dir = %dir.display(), files = blocks.len(), "loaded knowledge base");
    Ok(blocks.join("\n").trim().to_string())
}
