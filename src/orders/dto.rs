use serde::Serialize;
use time::{macros::format_description, UtcOffset};

use crate::db::Order;
use crate::links::{LinkBuilder, Links};
use crate::validation::{Field, Schema};

/// `address` falls back to the ordering user's stored address.
pub const CREATE_ORDER: Schema = Schema(&[
    Field::str("address").length(0, 100),
    Field::str("wishes"),
]);

#[derive(Debug, Serialize)]
pub struct OrderModel {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wishes: Option<String>,
    pub created_at_utc: String,
    pub status: String,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl OrderModel {
    pub fn new(links: LinkBuilder<'_>, order: Order) -> Self {
        let created = order.created_at.to_offset(UtcOffset::UTC);
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        Self {
            created_at_utc: created
                .format(format)
                .unwrap_or_else(|_| created.to_string()),
            links: Links::from([
                ("self", links.api(&["orders", &order.id.to_string()])),
                ("product", links.api(&["products", &order.product_name])),
                ("owner", links.api(&["users", &order.owner_id.to_string()])),
            ]),
            address: order.address,
            wishes: order.wishes.filter(|w| !w.is_empty()),
            status: order.status,
        }
    }
}
