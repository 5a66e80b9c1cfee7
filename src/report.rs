//! Persisting final reports as Markdown.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Path the report for `image_path` is written to inside `dir`.
pub fn report_path(dir: &Path, image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    dir.join(format!("{}_report.md", stem))
}

/// Write `text` verbatim to `<dir>/<image stem>_report.md`, creating `dir`.
pub fn save_markdown(dir: &Path, image_path: &Path, text: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = report_path(dir, image_path);
    std::fs::write(&path, text)?;
    info!(path = %path.display(), bytes = text.len(), "report saved");
    Ok(path)
}
