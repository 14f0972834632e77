use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use bytes::Bytes;

use crate::error::ApiError;

/// A file sent in a multipart body.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Form fields of a urlencoded or multipart body, plus the `image` file if
/// one was attached. Any other body type yields no fields.
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    pub fields: HashMap<String, String>,
    pub image: Option<Upload>,
}

pub const IMAGE_FIELD: &str = "image";

#[async_trait]
impl<S> FromRequest<S> for FormInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mut mp = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::MalformedBody(e.body_text()))?;
            let mut input = FormInput::default();
            while let Some(field) = mp
                .next_field()
                .await
                .map_err(|e| ApiError::MalformedBody(e.body_text()))?
            {
                let name = field.name().unwrap_or_default().to_string();
                match field.file_name().map(str::to_string) {
                    Some(filename) => {
                        let content_type = field.content_type().map(str::to_string);
                        let body = field
                            .bytes()
                            .await
                            .map_err(|e| ApiError::MalformedBody(e.body_text()))?;
                        // no filename means no file was picked
                        if name == IMAGE_FIELD && !filename.is_empty() {
                            input.image = Some(Upload {
                                filename,
                                content_type,
                                body,
                            });
                        }
                    }
                    None => {
                        let text = field
                            .text()
                            .await
                            .map_err(|e| ApiError::MalformedBody(e.body_text()))?;
                        input.fields.insert(name, text);
                    }
                }
            }
            Ok(input)
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::MalformedBody(e.body_text()))?;
            Ok(FormInput {
                fields,
                image: None,
            })
        } else {
            Ok(FormInput::default())
        }
    }
}
