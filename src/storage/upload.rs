use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use bytes::Bytes;

use crate::error::{AppError, AppResult};

pub const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Extensions a non-image file may keep. Anything else (html, svg, js, ...)
/// is stored as `.bin` so `/storage` never serves it as active content.
const INERT_EXTENSIONS: &[&str] = &[
    "pdf", "txt", "csv", "rtf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp",
    "epub", "zip", "mp3", "m4a", "wav", "ogg", "mp4", "mov", "webm", "jpg", "jpeg", "png", "gif",
    "webp",
];

fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// One file part of a multipart request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

impl Upload {
    /// Extension for the stored blob. Images get the one matching their
    /// validated type; other files keep their own only when it is inert.
    pub fn extension(&self) -> String {
        if let Some(ext) = image_extension(&self.content_type) {
            return ext.to_string();
        }
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| INERT_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or_else(|| "bin".to_string())
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn validate_size(&self, max_bytes: usize) -> AppResult<()> {
        if self.data.is_empty() {
            return Err(AppError::field(
                &self.field,
                format!("The {} must not be empty.", self.field),
            ));
        }
        if self.data.len() > max_bytes {
            return Err(AppError::field(
                &self.field,
                format!(
                    "The {} may not be greater than {} kilobytes.",
                    self.field,
                    max_bytes / 1024
                ),
            ));
        }
        Ok(())
    }

    pub fn validate_image(&self, max_bytes: usize) -> AppResult<()> {
        if !IMAGE_TYPES.contains(&self.content_type.as_str()) {
            return Err(AppError::field(
                &self.field,
                format!("The {} must be a file of type: jpeg, png, gif, webp.", self.field),
            ));
        }
        self.validate_size(max_bytes)
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Read every file part of the request; plain text parts are skipped.
pub async fn read_files(mut multipart: Multipart) -> AppResult<Vec<Upload>> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .map(str::to_string)
            .filter(|ct| ct != "application/octet-stream")
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
        let data = field.bytes().await.map_err(multipart_error)?;

        uploads.push(Upload {
            field: name,
            file_name: Some(file_name),
            content_type,
            data,
        });
    }
    Ok(uploads)
}

/// Pull the named file out of the parts, or a 422 naming it.
pub fn take(uploads: &mut Vec<Upload>, field: &str) -> AppResult<Upload> {
    take_optional(uploads, field)
        .ok_or_else(|| AppError::field(field, format!("The {} field is required.", field)))
}

pub fn take_optional(uploads: &mut Vec<Upload>, field: &str) -> Option<Upload> {
    let index = uploads.iter().position(|u| u.field == field)?;
    Some(uploads.remove(index))
}
