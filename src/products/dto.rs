use serde::Serialize;

use crate::db::Product;
use crate::links::{Embedded, LinkBuilder, Links};
use crate::validation::{Field, Schema};

pub const CREATE_PRODUCT: Schema = Schema(&[
    Field::str("name").length(0, 100).required(),
    Field::float("price").required(),
    Field::str("description"),
]);

/// Same fields as creation, all optional; blank fields keep their value.
pub const UPDATE_PRODUCT: Schema = Schema(&[
    Field::str("name").length(0, 100),
    Field::float("price"),
    Field::str("description"),
]);

#[derive(Debug, Serialize)]
pub struct ProductModel {
    pub name: String,
    pub price: f64,
    pub sales: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "_links")]
    pub links: Links,
    #[serde(rename = "_embedded")]
    pub embedded: Embedded,
}

impl ProductModel {
    pub fn new(links: LinkBuilder<'_>, product: Product) -> Self {
        let name = product.name.as_str();
        Self {
            links: Links::from([
                ("self", links.api(&["products", name])),
                ("reviews", links.api(&["products", name, "reviews"])),
                ("orders", links.api(&["products", name, "orders"])),
            ]),
            embedded: links.embedded_image(&product.image_url),
            description: product.description.filter(|d| !d.is_empty()),
            name: product.name,
            price: product.price,
            sales: product.sales,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub status: &'static str,
}

pub const DELETED: DeletedResponse = DeletedResponse {
    status: "Successfuly",
};
