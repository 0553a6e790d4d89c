//! Multipart upload collection
//!
//! Flattens a multipart stream into named file parts (bytes) and text
//! fields, with a total-size guard. Handlers parse the text fields into
//! validated parameters before any pixel work happens.

use std::collections::HashMap;

use actix_multipart::Multipart;
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use thiserror::Error;

/// Uploads above this total size are rejected outright
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid multipart payload: {0}")]
    Malformed(String),
    #[error("Upload exceeds {0} bytes")]
    TooLarge(usize),
    #[error("Missing required part: {0}")]
    MissingPart(&'static str),
}

/// A collected multipart form
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: HashMap<String, Bytes>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn file(&self, name: &'static str) -> Result<&Bytes, UploadError> {
        self.files.get(name).ok_or(UploadError::MissingPart(name))
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    /// "true"/"1" are truthy, everything else (and absence) is false
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.field(name), Some("true") | Some("1"))
    }
}

/// Drain a multipart stream into memory.
pub async fn collect(mut payload: Multipart) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();
    let mut total = 0usize;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| UploadError::Malformed(e.to_string()))?
    {
        let name = field.name().to_string();
        let is_file = field
            .content_disposition()
            .get_filename()
            .map(|f| !f.is_empty())
            .unwrap_or(false);

        let mut data = BytesMut::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| UploadError::Malformed(e.to_string()))?
        {
            total += chunk.len();
            if total > MAX_UPLOAD_BYTES {
                return Err(UploadError::TooLarge(MAX_UPLOAD_BYTES));
            }
            data.extend_from_slice(&chunk);
        }

        if is_file {
            form.files.insert(name, data.freeze());
        } else {
            let value = String::from_utf8_lossy(&data).trim().to_string();
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse_truthy_values_only() {
        let mut form = UploadForm::default();
        form.fields.insert("overwrite".to_string(), "true".to_string());
        form.fields.insert("knockout".to_string(), "yes".to_string());
        assert!(form.flag("overwrite"));
        assert!(!form.flag("knockout"));
        assert!(!form.flag("absent"));
    }

    #[test]
    fn missing_parts_are_reported_by_name() {
        let form = UploadForm::default();
        let err = form.file("artwork").unwrap_err();
        assert!(matches!(err, UploadError::MissingPart("artwork")));
    }
}
