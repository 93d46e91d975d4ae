use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::errors::{ClientError, ClientResult};

/// Largest file accepted for upload (5 MB). Checked before any network call.
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// A file staged for a multipart upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    file_name: String,
    content_type: String,
    bytes: Bytes,
}

impl FileUpload {
    /// Stages in-memory bytes. Fails with `FileTooLarge` above the limit.
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> ClientResult<Self> {
        let file_name = file_name.into();
        let bytes = bytes.into();
        check_size(&file_name, bytes.len() as u64)?;
        Ok(Self {
            file_name,
            content_type: content_type.into(),
            bytes,
        })
    }

    /// Reads a file from disk. The size is checked from metadata before reading.
    pub async fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let size = tokio::fs::metadata(path).await?.len();
        check_size(&file_name, size)?;

        let bytes = tokio::fs::read(path).await?;
        let content_type = guess_content_type(&file_name).to_string();
        Self::new(file_name, content_type, bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Builds a one-part multipart form under `field`.
    pub fn into_form(self, field: &'static str) -> ClientResult<Form> {
        let part = Part::bytes(self.bytes.to_vec())
            .file_name(self.file_name)
            .mime_str(&self.content_type)?;
        Ok(Form::new().part(field, part))
    }
}

fn check_size(file_name: &str, size: u64) -> ClientResult<()> {
    if size > MAX_UPLOAD_BYTES {
        return Err(ClientError::FileTooLarge {
            name: file_name.to_string(),
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Content type for the document formats the upload fields accept.
pub fn guess_content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}
