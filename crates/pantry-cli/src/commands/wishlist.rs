use clap::Subcommand;
use comfy_table::{Cell, Color, Table};
use console::style;
use rust_decimal::Decimal;

use pantry_core::models::item::{ItemPayload, ProductKey};
use pantry_core::models::wishlist::WishlistProduct;
use pantry_store::WishlistStore;

use super::signed_in;

#[derive(Subcommand)]
pub enum WishlistAction {
    /// List wishlisted products
    List,
    /// Add a product, or remove it if it is already wishlisted
    Toggle {
        /// Product id
        product: String,
        /// Product title
        #[arg(long)]
        title: String,
        /// Unit price
        #[arg(long)]
        price: Decimal,
        /// Image URL
        #[arg(long, default_value = "")]
        image: String,
    },
    /// Remove a product
    Remove {
        /// Product id
        product: String,
    },
    /// Remove every product
    Clear,
}

pub async fn run(action: WishlistAction) -> anyhow::Result<()> {
    let storefront = signed_in().await?;
    let wishlist = storefront.wishlist();

    match action {
        WishlistAction::List => {}
        WishlistAction::Toggle {
            product,
            title,
            price,
            image,
        } => {
            let key = ProductKey::new(product);
            let was_in = wishlist.is_in_wishlist(&key);
            let payload = ItemPayload::new(key.clone(), WishlistProduct::new(title, image, price));
            wishlist.toggle(payload)?.await?;
            if was_in {
                println!("{} Removed {key} from wishlist", style("✓").green());
            } else {
                println!("{} Added {key} to wishlist", style("✓").green());
            }
        }
        WishlistAction::Remove { product } => {
            let key = ProductKey::new(product);
            if !wishlist.is_in_wishlist(&key) {
                anyhow::bail!("{key} is not in the wishlist");
            }
            wishlist.remove(&key)?.await?;
            println!("{} Removed {key} from wishlist", style("✓").green());
        }
        WishlistAction::Clear => {
            wishlist.clear()?.await?;
            println!("{} Wishlist cleared", style("✓").green());
        }
    }

    print_wishlist(wishlist);
    Ok(())
}

fn print_wishlist(wishlist: &WishlistStore) {
    let items = wishlist.items();
    if items.is_empty() {
        println!("Wishlist is empty.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["PRODUCT", "TITLE", "PRICE", "WAS", "RATING", "ADDED"]);

    for item in &items {
        let product = &item.fields;
        let was = product
            .old_price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let rating = product
            .rating
            .map(|r| format!("{r:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let added = item
            .added_at
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(&item.key),
            Cell::new(&product.title),
            Cell::new(product.price.to_string()).fg(Color::Green),
            Cell::new(was),
            Cell::new(rating),
            Cell::new(added),
        ]);
    }

    println!("{table}");
    println!("{} items", items.len());
}
