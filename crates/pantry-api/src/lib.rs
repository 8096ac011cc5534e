pub mod auth;
pub mod client;
pub mod collection;
pub mod memory;

use async_trait::async_trait;

use pantry_core::error::PantryError;
use pantry_core::models::cart::CartLine;
use pantry_core::models::item::{CollectionItem, ItemPayload, ProductKey};

pub use auth::AuthApi;
pub use client::ApiClient;
pub use collection::{HttpCollectionGateway, RemoteResource};
pub use memory::MemoryGateway;

/// The four primitive operations the backend offers on a user-scoped
/// collection. Each call is one request/response round trip.
#[async_trait]
pub trait CollectionGateway<F>: Send + Sync {
    /// Every entry the server holds for the signed-in user.
    async fn fetch_all(&self) -> Result<Vec<CollectionItem<F>>, PantryError>;

    /// Store a new entry; returns the canonical record with its entry id.
    async fn add(&self, payload: &ItemPayload<F>) -> Result<CollectionItem<F>, PantryError>;

    /// Delete the entry for `key`.
    async fn remove(&self, key: &ProductKey) -> Result<(), PantryError>;

    /// Delete every entry.
    async fn clear(&self) -> Result<(), PantryError>;
}

/// Cart collections additionally support changing a line's quantity.
#[async_trait]
pub trait CartGateway: CollectionGateway<CartLine> {
    async fn set_quantity(
        &self,
        key: &ProductKey,
        quantity: u32,
    ) -> Result<CollectionItem<CartLine>, PantryError>;
}
