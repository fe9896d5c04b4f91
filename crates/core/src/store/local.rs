//! Local directory helpers shared by output sink implementations.

use std::path::{Path, PathBuf};

/// One local file and the object key it is uploaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub path: PathBuf,
    pub key: String,
}

/// Object key for `relative` inside the output of `job_id`, always `/`-separated.
pub fn object_key(job_id: &str, relative: &Path) -> String {
    let mut key = job_id.trim_end_matches('/').to_string();
    for part in relative.components() {
        key.push('/');
        key.push_str(&part.as_os_str().to_string_lossy());
    }
    key
}

/// Walks `dir` recursively and returns every regular file with its object key.
///
/// Entries are sorted by key so uploads happen in a stable order.
pub async fn collect_upload_files(job_id: &str, dir: &Path) -> std::io::Result<Vec<UploadFile>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let relative = path.strip_prefix(dir).unwrap_or(&path).to_path_buf();
                files.push(UploadFile {
                    key: object_key(job_id, &relative),
                    path,
                });
            }
        }
    }

    files.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(files)
}

/// Content type for a DASH output file, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mpd") => "application/dash+xml",
        Some("m4s") => "video/iso.segment",
        Some("mp4") => "video/mp4",
        Some("m4a") => "audio/mp4",
        Some("webm") => "video/webm",
        Some("log") | Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
