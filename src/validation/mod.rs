//! Request validation: form extraction, declarative schemas and image checks.

pub mod form;
pub mod image;
pub mod path;
pub mod schema;

pub use form::{FormInput, Upload};
pub use path::IdPath;
pub use schema::{Field, Schema, Validated};

use crate::error::ApiError;

/// Validates `input` against `schema` and its image against the extension
/// allow-list, reporting every failure in one error list.
pub fn validate_form(schema: &Schema, input: &FormInput) -> Result<Validated, ApiError> {
    let result = schema.validate(&input.fields);
    let image_error = image::check_image(input.image.as_ref());
    match (result, image_error) {
        (Ok(validated), None) => Ok(validated),
        (Ok(_), Some(e)) => Err(ApiError::Validation(vec![e])),
        (Err(mut errors), image_error) => {
            errors.extend(image_error);
            Err(ApiError::Validation(errors))
        }
    }
}
