//! Uploaded file storage under `<root>/media`
//!
//! Files are written as `<category>/<uuid>_<sanitized name>` and the
//! relative path is stored in the database row.

use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "file";

const PROPOSAL_EXTENSIONS: &[&str] = &["pdf"];
const REVIEW_EXTENSIONS: &[&str] = &["pdf", "ppt", "pptx", "doc", "docx", "zip"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Proposals,
    Reviews,
}

impl MediaCategory {
    fn dir_name(&self) -> &'static str {
        match self {
            MediaCategory::Proposals => "proposals",
            MediaCategory::Reviews => "reviews",
        }
    }

    fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            MediaCategory::Proposals => PROPOSAL_EXTENSIONS,
            MediaCategory::Reviews => REVIEW_EXTENSIONS,
        }
    }
}

/// An uploaded file as received from the client
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Where an upload ended up
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub stored_path: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    max_upload_bytes: usize,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, max_upload_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_upload_bytes,
        }
    }

    /// Body limit for upload routes: the file plus room for multipart framing
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes + 64 * 1024
    }

    /// Validate and write an upload, returning its stored location
    pub async fn store(&self, category: MediaCategory, upload: &Upload) -> ApiResult<StoredFile> {
        if upload.data.is_empty() {
            return Err(ApiError::BadRequest("The uploaded file is empty.".to_string()));
        }
        if upload.data.len() > self.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "Files may be at most {} bytes.",
                self.max_upload_bytes
            )));
        }

        let file_name = sanitize_file_name(&upload.file_name);
        let allowed = category.allowed_extensions();
        if !has_allowed_extension(&file_name, allowed) {
            return Err(ApiError::BadRequest(format!(
                "Only {} files are accepted.",
                allowed.join(", ").to_uppercase()
            )));
        }

        let stored_path = format!(
            "{}/{}_{}",
            category.dir_name(),
            Uuid::new_v4().simple(),
            file_name
        );
        let full_path = self.root.join(&stored_path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::Internal(format!("Cannot create media folder: {}", e)))?;
        }
        tokio::fs::write(&full_path, &upload.data)
            .await
            .map_err(|e| ApiError::Internal(format!("Cannot write upload: {}", e)))?;

        debug!("Stored upload at {}", full_path.display());

        Ok(StoredFile {
            file_name,
            stored_path,
            size_bytes: upload.data.len() as i64,
        })
    }

    /// Delete a stored file whose database row could not be written
    pub async fn discard(&self, stored: &StoredFile) {
        let full_path = self.root.join(&stored.stored_path);
        if let Err(e) = tokio::fs::remove_file(&full_path).await {
            warn!("Cannot remove orphaned upload {}: {}", full_path.display(), e);
        }
    }

    /// Read a stored file back
    pub async fn read(&self, stored_path: &str) -> ApiResult<Vec<u8>> {
        let relative = Path::new(stored_path);
        if relative.is_absolute() || relative.components().any(|c| c.as_os_str() == "..") {
            return Err(ApiError::NotFound("File not found.".to_string()));
        }
        tokio::fs::read(self.root.join(relative))
            .await
            .map_err(|_| ApiError::NotFound("File not found.".to_string()))
    }
}

/// Pull the `file` field out of a multipart body
pub async fn read_upload(multipart: &mut Multipart) -> ApiResult<Upload> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await?;
        return Ok(Upload {
            file_name,
            data: data.to_vec(),
        });
    }
    Err(ApiError::BadRequest("No file was uploaded.".to_string()))
}

/// Keep the final path component and replace anything unusual with `_`
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// MIME type for a download, by extension
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

fn has_allowed_extension(file_name: &str, allowed: &[&str]) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}
