use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::item::CollectionItem;

/// Product snapshot and quantity stored with a cart entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(rename = "productTitle", default)]
    pub title: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl CartLine {
    pub fn new(title: impl Into<String>, image: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            title: title.into(),
            image: image.into(),
            price,
            quantity,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Sum of price × quantity over a set of cart entries.
pub fn cart_total<'a>(items: impl IntoIterator<Item = &'a CollectionItem<CartLine>>) -> Decimal {
    items.into_iter().map(|i| i.fields.line_total()).sum()
}

/// Total number of units over a set of cart entries.
pub fn cart_item_count<'a>(items: impl IntoIterator<Item = &'a CollectionItem<CartLine>>) -> u32 {
    items.into_iter().map(|i| i.fields.quantity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::ItemPayload;

    #[test]
    fn test_cart_total_and_count() {
        let items = vec![
            CollectionItem::provisional(ItemPayload::new(
                "p1",
                CartLine::new("Peri Peri Makhana", "", Decimal::new(14950, 2), 2),
            )),
            CollectionItem::provisional(ItemPayload::new(
                "p2",
                CartLine::new("Roasted Chana", "", Decimal::new(9900, 2), 1),
            )),
        ];
        assert_eq!(cart_total(&items), Decimal::new(39800, 2));
        assert_eq!(cart_item_count(&items), 3);
    }

    #[test]
    fn test_missing_quantity_defaults_to_one() {
        let line: CartLine =
            serde_json::from_str(r#"{"productTitle":"Makhana","image":"m.png","price":120}"#).unwrap();
        assert_eq!(line.quantity, 1);
        assert_eq!(line.price, Decimal::from(120));
    }
}
