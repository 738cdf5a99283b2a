/// Multipart form decoding for post submissions
use actix_multipart::{Field, Multipart};
use actix_web::http::header::{self, ContentDisposition};
use futures_util::StreamExt;

use crate::error::{AppError, Result};
use crate::services::{ImageUpload, PostForm};

/// Upload guardrail for a whole post submission
const MAX_FORM_BYTES: usize = 10 * 1024 * 1024;

/// Read `text`, `group`, `image` and `image-clear` from a multipart body.
/// Unknown fields are drained and ignored.
pub async fn read_post_form(mut payload: Multipart) -> Result<PostForm> {
    let mut form = PostForm::default();
    let mut total_bytes = 0usize;

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?;

        let disposition = field
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| ContentDisposition::from_raw(value).ok());
        let name = disposition
            .as_ref()
            .and_then(|cd| cd.get_name())
            .unwrap_or("")
            .to_string();
        let filename = disposition
            .as_ref()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().map(|m| m.essence_str().to_string());

        let bytes = read_field(&mut field, &mut total_bytes).await?;

        match name.as_str() {
            "text" => form.text = into_text(bytes, "text")?,
            "group" => form.group = Some(into_text(bytes, "group")?),
            "image" => {
                // browsers send an empty, unnamed file part when nothing was picked
                let picked = filename.as_deref().is_some_and(|f| !f.is_empty());
                if picked || !bytes.is_empty() {
                    form.image = Some(ImageUpload {
                        filename,
                        content_type,
                        bytes,
                    });
                }
            }
            "image-clear" => {
                let value = into_text(bytes, "image-clear")?;
                form.clear_image = !matches!(value.trim(), "" | "false" | "0" | "off");
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_field(field: &mut Field, total_bytes: &mut usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk =
            chunk.map_err(|e| AppError::BadRequest(format!("Error reading form field: {}", e)))?;
        *total_bytes += chunk.len();
        if *total_bytes > MAX_FORM_BYTES {
            return Err(AppError::BadRequest(
                "Upload exceeds the 10MB limit".to_string(),
            ));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn into_text(bytes: Vec<u8>, field: &str) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|_| AppError::BadRequest(format!("Field '{}' is not valid UTF-8", field)))
}
