//! Form payload parsing for the authoring routes.

use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use serde::Deserialize;
use thiserror::Error;
use tracing::error;

use crate::application::error::HttpError;
use crate::application::posts::{ImageChange, ImageUpload, PostDraft};

const SOURCE: &str = "infra::http::forms";

#[derive(Debug, Error)]
pub enum FormError {
    #[error("form payload exceeds the configured size limit")]
    PayloadTooLarge,
    #[error("malformed form data: {0}")]
    Malformed(String),
}

impl From<FormError> for HttpError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::PayloadTooLarge => HttpError::from_error(
                SOURCE,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Upload is too large",
                &err,
            ),
            FormError::Malformed(_) => {
                HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Invalid form data", &err)
            }
        }
    }
}

/// Comment form body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

/// Read the post form: `text`, `group`, `image` and the `image-clear`
/// checkbox. A file input left empty keeps the current image.
pub async fn read_post_draft(multipart: &mut Multipart) -> Result<PostDraft, FormError> {
    let mut draft = PostDraft::default();
    let mut upload: Option<ImageUpload> = None;
    let mut clear = false;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = SOURCE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                return Err(match status {
                    StatusCode::PAYLOAD_TOO_LARGE => FormError::PayloadTooLarge,
                    _ => FormError::Malformed(err.body_text()),
                });
            }
        };

        match field.name() {
            Some("text") => {
                draft.text = field
                    .text()
                    .await
                    .map_err(|err| FormError::Malformed(err.body_text()))?;
            }
            Some("group") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| FormError::Malformed(err.body_text()))?;
                draft.group = Some(value);
            }
            Some("image-clear") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| FormError::Malformed(err.body_text()))?
                    .trim()
                    .to_ascii_lowercase();
                clear = matches!(value.as_str(), "on" | "true" | "1" | "yes");
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string();
                let data = field.bytes().await.map_err(|err| match err.status() {
                    StatusCode::PAYLOAD_TOO_LARGE => FormError::PayloadTooLarge,
                    _ => FormError::Malformed(err.body_text()),
                })?;
                if !filename.is_empty() || !data.is_empty() {
                    let filename = if filename.is_empty() {
                        "image".to_string()
                    } else {
                        filename
                    };
                    upload = Some(ImageUpload { filename, data });
                }
            }
            _ => continue,
        }
    }

    draft.clear_image = clear;
    draft.image = match (upload, clear) {
        (Some(upload), _) => ImageChange::Replace(upload),
        (None, true) => ImageChange::Clear,
        (None, false) => ImageChange::Keep,
    };
    Ok(draft)
}
