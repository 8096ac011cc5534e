use clap::Subcommand;
use comfy_table::{Cell, Color, Table};
use console::style;
use rust_decimal::Decimal;

use pantry_core::models::cart::CartLine;
use pantry_core::models::item::{ItemPayload, ProductKey};
use pantry_store::CartStore;

use super::signed_in;

#[derive(Subcommand)]
pub enum CartAction {
    /// List cart lines with the total
    List,
    /// Add a product; quantities add up if it is already in the cart
    Add {
        /// Product id
        product: String,
        /// Product title
        #[arg(long)]
        title: String,
        /// Unit price
        #[arg(long)]
        price: Decimal,
        /// Number of units
        #[arg(long, default_value_t = 1)]
        quantity: u32,
        /// Image URL
        #[arg(long, default_value = "")]
        image: String,
    },
    /// Remove a line
    Remove {
        /// Product id
        product: String,
    },
    /// Set a line's quantity (0 removes it)
    Qty {
        /// Product id
        product: String,
        /// New quantity
        quantity: u32,
    },
    /// Empty the cart
    Clear,
}

pub async fn run(action: CartAction) -> anyhow::Result<()> {
    let storefront = signed_in().await?;
    let cart = storefront.cart();

    match action {
        CartAction::List => {}
        CartAction::Add {
            product,
            title,
            price,
            quantity,
            image,
        } => {
            let key = ProductKey::new(product);
            let line = CartLine::new(title, image, price, quantity);
            cart.add_item(ItemPayload::new(key.clone(), line))?.await?;
            println!("{} Added {quantity} × {key} to cart", style("✓").green());
        }
        CartAction::Remove { product } => {
            let key = ProductKey::new(product);
            if !cart.contains(&key) {
                anyhow::bail!("{key} is not in the cart");
            }
            cart.remove_item(&key)?.await?;
            println!("{} Removed {key} from cart", style("✓").green());
        }
        CartAction::Qty { product, quantity } => {
            let key = ProductKey::new(product);
            cart.update_quantity(&key, quantity)?.await?;
            println!("{} {key} quantity set to {quantity}", style("✓").green());
        }
        CartAction::Clear => {
            cart.clear()?.await?;
            println!("{} Cart cleared", style("✓").green());
        }
    }

    print_cart(cart);
    Ok(())
}

fn print_cart(cart: &CartStore) {
    let items = cart.items();
    if items.is_empty() {
        println!("Cart is empty.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["PRODUCT", "TITLE", "PRICE", "QTY", "SUBTOTAL"]);

    for item in &items {
        let line = &item.fields;
        table.add_row(vec![
            Cell::new(&item.key),
            Cell::new(&line.title),
            Cell::new(line.price.to_string()),
            Cell::new(line.quantity.to_string()),
            Cell::new(line.line_total().to_string()).fg(Color::Green),
        ]);
    }

    println!("{table}");
    println!(
        "Total: {} ({} items)",
        style(cart.total()).bold(),
        cart.item_count()
    );
}
