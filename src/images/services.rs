use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::PLACEHOLDER_IMAGE;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation::{image::mime_from_name, image::secure_filename, Upload};

/// Stores an already validated upload and returns the path or URL clients
/// fetch it from.
pub async fn store_image(st: &AppState, upload: Upload) -> ApiResult<String> {
    let key = object_key(&upload.filename);
    let content_type = upload
        .content_type
        .as_deref()
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or_else(|| mime_from_name(&upload.filename))
        .to_string();

    st.storage
        .put_object(&key, upload.body, &content_type)
        .await
        .with_context(|| format!("put_object {}", key))
        .map_err(ApiError::Storage)?;

    info!(%key, "image stored");
    Ok(st.storage.public_path(&key))
}

/// Best-effort removal of an image this service stored earlier.
pub async fn discard_image(st: &AppState, public_path: &str) {
    if public_path == PLACEHOLDER_IMAGE {
        return;
    }
    let Some(key) = st.storage.key_for(public_path) else {
        return;
    };
    if let Err(e) = st.storage.delete_object(&key).await {
        warn!(error = %format!("{e:#}"), %key, "could not remove image");
    }
}

/// Passes `result` through, removing the just-stored upload at `stored` when
/// the record that would reference it was not written.
pub async fn release_on_error<T>(
    st: &AppState,
    stored: Option<&str>,
    result: anyhow::Result<T>,
) -> ApiResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            if let Some(path) = stored {
                discard_image(st, path).await;
            }
            Err(ApiError::Database(e))
        }
    }
}

fn object_key(filename: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("images/{}_{}", &id[..8], secure_filename(filename))
}
