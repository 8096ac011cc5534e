use std::sync::Arc;

use rust_decimal::Decimal;

use pantry_api::MemoryGateway;
use pantry_auth::{CredentialStore, MemoryStore, Session};
use pantry_core::config::PantryConfig;
use pantry_core::models::cart::CartLine;
use pantry_core::models::identity::{Identity, Role};
use pantry_core::models::item::{ItemPayload, ProductKey};
use pantry_core::models::wishlist::WishlistProduct;
use pantry_store::{StorePolicy, Storefront};

#[test]
fn test_config_defaults() {
    let config = PantryConfig::default();
    assert_eq!(config.api_url.as_str(), "http://localhost:5000/api");
    assert_eq!(config.request_timeout_secs, 15);
    assert!(config.rollback_on_failure);
    assert!(config.serialize_per_key);
    assert_eq!(StorePolicy::from(&config), StorePolicy::default());
}

#[test]
fn test_config_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = PantryConfig::default();
    config.rollback_on_failure = false;
    config.save_to(&path).unwrap();

    let loaded = PantryConfig::load_from(&path).unwrap();
    assert!(!loaded.rollback_on_failure);
    assert!(!StorePolicy::from(&loaded).rollback_on_failure);
    assert_eq!(loaded.api_url, config.api_url);
}

#[test]
fn test_role_parse() {
    assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
    assert_eq!("user".parse::<Role>().unwrap(), Role::User);
    assert!("root".parse::<Role>().is_err());
}

#[test]
fn test_memory_credential_store() {
    let store = MemoryStore::new();
    store.store("pantry:session", "tok").unwrap();
    assert_eq!(store.get("pantry:session").unwrap(), Some("tok".to_string()));
    store.delete("pantry:session").unwrap();
    assert_eq!(store.get("pantry:session").unwrap(), None);
}

#[tokio::test]
async fn test_full_pipeline_in_memory() {
    let credentials = Arc::new(MemoryStore::new());
    let session = Arc::new(Session::new(credentials.clone(), "pantry:session"));
    let wishlist_backend = Arc::new(MemoryGateway::<WishlistProduct>::new());
    let cart_backend = Arc::new(MemoryGateway::<CartLine>::new());
    let storefront = Storefront::new(
        session.clone(),
        wishlist_backend.clone(),
        cart_backend.clone(),
        StorePolicy::default(),
    );

    // 1. Log in; both collections load
    session
        .begin("tok", Identity::new("u1", "Asha", "asha@example.com"))
        .unwrap();
    storefront.wait_until_loaded().await;
    assert!(storefront.wishlist().is_empty());
    assert!(storefront.cart().is_empty());

    // 2. Wishlist a snack
    let chips = ProductKey::from("chips");
    let payload = ItemPayload::new(
        chips.clone(),
        WishlistProduct::new("Masala Chips", "chips.png", Decimal::new(4999, 2)),
    );
    storefront.wishlist().toggle(payload).unwrap().await.unwrap();
    assert!(storefront.wishlist().is_in_wishlist(&chips));
    assert!(storefront.wishlist().items()[0].is_confirmed());
    assert_eq!(wishlist_backend.snapshot().len(), 1);

    // 3. Fill the cart
    let line = |qty| {
        ItemPayload::new(
            chips.clone(),
            CartLine::new("Masala Chips", "chips.png", Decimal::new(4999, 2), qty),
        )
    };
    storefront.cart().add_item(line(2)).unwrap().await.unwrap();
    storefront.cart().add_item(line(1)).unwrap().await.unwrap();
    assert_eq!(storefront.cart().item_count(), 3);
    assert_eq!(storefront.cart().total(), Decimal::new(14997, 2));
    assert_eq!(cart_backend.snapshot()[0].fields.quantity, 3);

    // 4. A new process resumes the same server-side state
    let resumed = Arc::new(Session::new(credentials.clone(), "pantry:session"));
    let again = Storefront::new(
        resumed.clone(),
        wishlist_backend.clone(),
        cart_backend.clone(),
        StorePolicy::default(),
    );
    assert_eq!(resumed.bearer_token().unwrap(), Some("tok".to_string()));
    resumed.resume(Identity::new("u1", "Asha", "asha@example.com"));
    again.wait_until_loaded().await;
    assert_eq!(again.cart().item_count(), 3);
    assert!(again.wishlist().is_in_wishlist(&chips));

    // 5. Log out; local views empty, server state untouched
    session.end().unwrap();
    assert!(storefront.wishlist().is_empty());
    assert!(storefront.cart().is_empty());
    assert_eq!(credentials.get("pantry:session").unwrap(), None);
    assert_eq!(wishlist_backend.snapshot().len(), 1);
}
