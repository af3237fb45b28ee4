use std::{io::Write, path::Path};

use axum::extract::Multipart;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use tempfile::NamedTempFile;

use crate::error::AppError;

/// Maximum number of images accepted in one upload batch.
pub const MAX_IMAGES: usize = 4;

/// An uploaded image spooled to a scratch file for the duration of one
/// request. The file is removed when the value is dropped, so cleanup happens
/// on every exit path without the caller doing anything.
pub struct StagedImage {
    filename: String,
    mime_type: String,
    file: NamedTempFile,
    len: usize,
}

impl StagedImage {
    /// Writes the uploaded bytes to a scratch file in `dir`.
    pub fn stage(
        dir: &Path,
        filename: String,
        mime_type: String,
        bytes: &[u8],
    ) -> Result<Self, AppError> {
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        log::debug!(
            "Staged {} ({} bytes) at {}",
            filename,
            bytes.len(),
            file.path().display()
        );

        Ok(Self {
            filename,
            mime_type,
            file,
            len: bytes.len(),
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Path of the scratch file, valid until this value is dropped.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Size of the staged payload in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Re-reads the staged file and encodes it as an RFC 2397 data URI, the
    /// inline form the vision API expects for images.
    pub fn data_uri(&self) -> Result<String, AppError> {
        let bytes = std::fs::read(self.file.path())?;
        Ok(format!(
            "data:{};base64,{}",
            self.mime_type,
            STANDARD.encode(&bytes)
        ))
    }

    /// Consumes the staged image, deletes its scratch file and returns the
    /// original filename.
    pub fn into_filename(self) -> String {
        self.filename
    }
}

/// The images and optional instruction text submitted in one request.
pub struct UploadBatch {
    pub images: Vec<StagedImage>,
    pub prompt: Option<String>,
}

impl UploadBatch {
    /// Drains a multipart form into a staged batch, in `dir`.
    ///
    /// Fields named `images` are staged in submission order; a `prompt` field
    /// overrides the default system instruction (whitespace-only text is
    /// treated as absent). Anything else is ignored. The batch bounds are
    /// enforced here, before any call to the vision service: zero images and
    /// more than [`MAX_IMAGES`] are both rejected as validation errors.
    pub async fn from_multipart(dir: &Path, mut multipart: Multipart) -> Result<Self, AppError> {
        let mut images = Vec::new();
        let mut prompt = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("images") => {
                    if images.len() == MAX_IMAGES {
                        return Err(AppError::validation("too many images"));
                    }

                    let filename = field
                        .file_name()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("image-{}", images.len() + 1));
                    let mime_type = field
                        .content_type()
                        .map(str::to_string)
                        .unwrap_or_else(|| "application/octet-stream".to_string());
                    let bytes = field.bytes().await?;

                    images.push(StagedImage::stage(dir, filename, mime_type, &bytes)?);
                }
                Some("prompt") => {
                    let text = field.text().await?;
                    let text = text.trim();
                    if !text.is_empty() {
                        prompt = Some(text.to_string());
                    }
                }
                other => {
                    log::warn!("Ignoring unexpected form field: {:?}", other);
                }
            }
        }

        if images.is_empty() {
            return Err(AppError::validation("no image supplied"));
        }

        Ok(Self { images, prompt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stage_then_encode_as_data_uri() {
        let dir = TempDir::new().unwrap();
        let staged = StagedImage::stage(
            dir.path(),
            "hammer.png".to_string(),
            "image/png".to_string(),
            &[0x89, 0x50, 0x4e, 0x47],
        )
        .unwrap();

        assert_eq!(staged.filename(), "hammer.png");
        assert_eq!(staged.len(), 4);
        assert_eq!(staged.data_uri().unwrap(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn scratch_file_is_deleted_on_drop() {
        let dir = TempDir::new().unwrap();
        let staged = StagedImage::stage(
            dir.path(),
            "a.jpg".to_string(),
            "image/jpeg".to_string(),
            b"not really a jpeg",
        )
        .unwrap();

        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn into_filename_removes_the_scratch_file() {
        let dir = TempDir::new().unwrap();
        let staged = StagedImage::stage(
            dir.path(),
            "b.png".to_string(),
            "image/png".to_string(),
            b"bytes",
        )
        .unwrap();

        let path = staged.path().to_path_buf();
        assert_eq!(staged.into_filename(), "b.png");
        assert!(!path.exists());
    }
}
