use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Disk-backed object store for post images.
///
/// Files are laid out `{external_auth_id}/{generated_filename}` under the
/// uploads root and exposed under `public_base` ("/media" by default).
/// Deletes are best-effort: a failure is logged and swallowed, an orphaned
/// file is an accepted risk.
pub struct FileStore {
    root: PathBuf,
    public_base: String,
    max_bytes: u64,
}

/// A stored image: the store-relative path plus its derived public URL.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub path: String,
    pub url: String,
}

impl FileStore {
    pub fn new(root: PathBuf, public_base: String, max_bytes: u64) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_base: public_base.trim_end_matches('/').to_string(),
            max_bytes,
        })
    }

    /// Validate and persist an uploaded image. Returns the relative path
    /// and public URL on success.
    pub fn store(
        &self,
        external_id: &str,
        content_type: &str,
        data: &[u8],
    ) -> AppResult<StoredImage> {
        let ext = extension_for(content_type).ok_or_else(|| {
            AppError::Validation(format!("Unsupported image type: {}", content_type))
        })?;

        if data.is_empty() {
            return Err(AppError::Validation("Image file is empty".into()));
        }
        if data.len() as u64 > self.max_bytes {
            return Err(AppError::Validation(format!(
                "Image exceeds maximum size of {} bytes",
                self.max_bytes
            )));
        }

        let filename = format!("{}.{}", uuid::Uuid::now_v7(), ext);
        let rel_path = format!("{}/{}", sanitize_segment(external_id), filename);

        let full_path = self.root.join(&rel_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Internal(format!("Failed to create upload dir: {}", e)))?;
        }
        std::fs::write(&full_path, data)
            .map_err(|e| AppError::Internal(format!("Failed to write upload: {}", e)))?;

        let url = format!("{}/{}", self.public_base, rel_path);
        Ok(StoredImage { path: rel_path, url })
    }

    /// Best-effort delete. Missing files and I/O failures are logged at
    /// warn and swallowed; callers never block on cleanup.
    pub fn remove(&self, rel_path: &str) {
        let Some(full_path) = self.resolve(rel_path) else {
            tracing::warn!("Refusing to delete suspicious path: {}", rel_path);
            return;
        };
        if let Err(e) = std::fs::remove_file(&full_path) {
            tracing::warn!("Failed to delete file {}: {}", rel_path, e);
        }
    }

    /// Resolve a relative path for serving. Returns None for anything that
    /// would escape the uploads root.
    pub fn resolve(&self, rel_path: &str) -> Option<PathBuf> {
        let rel = Path::new(rel_path);
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return None;
        }
        Some(self.root.join(rel))
    }
}

/// Map a declared image content type to the extension we store under.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// External-auth ids can contain separators ("auth0|abc"); keep the
/// directory name filesystem-friendly.
fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
