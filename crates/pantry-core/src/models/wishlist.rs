use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product snapshot stored with a wishlist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistProduct {
    #[serde(rename = "productTitle", default)]
    pub title: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_price: Option<Decimal>,
    /// Percentage off, as shown on the product card.
    #[serde(rename = "Discount", default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
}

impl WishlistProduct {
    pub fn new(title: impl Into<String>, image: impl Into<String>, price: Decimal) -> Self {
        Self {
            title: title.into(),
            image: image.into(),
            price,
            rating: None,
            old_price: None,
            discount: None,
        }
    }
}
