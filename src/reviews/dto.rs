use serde::Serialize;

use crate::db::Review;
use crate::links::{Embedded, LinkBuilder, Links};
use crate::validation::{Field, Schema};

pub const CREATE_REVIEW: Schema = Schema(&[Field::int("rating").required(), Field::str("text")]);

#[derive(Debug, Serialize)]
pub struct ReviewModel {
    pub rating: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "_links")]
    pub links: Links,
    #[serde(rename = "_embedded", skip_serializing_if = "Option::is_none")]
    pub embedded: Option<Embedded>,
}

impl ReviewModel {
    pub fn new(links: LinkBuilder<'_>, review: Review) -> Self {
        Self {
            rating: review.rating,
            links: Links::from([
                ("self", links.api(&["reviews", &review.id.to_string()])),
                ("owner", links.api(&["users", &review.owner_id.to_string()])),
                ("product", links.api(&["products", &review.product_name])),
            ]),
            embedded: review
                .image_url
                .as_deref()
                .filter(|url| !url.is_empty())
                .map(|url| links.embedded_image(url)),
            text: review.text.filter(|t| !t.is_empty()),
        }
    }
}
