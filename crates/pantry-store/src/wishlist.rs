use std::sync::Arc;

use tokio::sync::watch;

use pantry_api::CollectionGateway;
use pantry_auth::IdentitySignal;
use pantry_core::error::PantryError;
use pantry_core::models::item::{CollectionItem, ItemPayload, ProductKey};
use pantry_core::models::wishlist::WishlistProduct;

use crate::collection::{CollectionStore, PendingMutation, StorePolicy, StoreState};

pub type WishlistGateway = dyn CollectionGateway<WishlistProduct>;
pub type WishlistItem = CollectionItem<WishlistProduct>;

/// The signed-in user's wishlist.
#[derive(Clone)]
pub struct WishlistStore {
    store: CollectionStore<WishlistProduct, WishlistGateway>,
}

impl WishlistStore {
    pub fn new(gateway: Arc<WishlistGateway>, identity: IdentitySignal, policy: StorePolicy) -> Self {
        Self {
            store: CollectionStore::new("wishlist", gateway, identity, policy),
        }
    }

    pub fn items(&self) -> Vec<WishlistItem> {
        self.store.items()
    }

    pub fn is_in_wishlist(&self, key: &ProductKey) -> bool {
        self.store.contains(key)
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState<WishlistProduct>> {
        self.store.subscribe()
    }

    pub async fn wait_until_loaded(&self) {
        self.store.wait_until_loaded().await
    }

    /// Heart button: add the product if absent, remove it if present.
    pub fn toggle(
        &self,
        payload: ItemPayload<WishlistProduct>,
    ) -> Result<PendingMutation, PantryError> {
        self.store.toggle(payload)
    }

    pub fn remove(&self, key: &ProductKey) -> Result<PendingMutation, PantryError> {
        self.store.remove(key)
    }

    pub fn clear(&self) -> Result<PendingMutation, PantryError> {
        self.store.clear()
    }

    pub fn dispose(&self) {
        self.store.dispose()
    }

    /// The underlying generic store.
    pub fn store(&self) -> &CollectionStore<WishlistProduct, WishlistGateway> {
        &self.store
    }
}
