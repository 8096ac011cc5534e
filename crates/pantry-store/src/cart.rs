use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::watch;

use pantry_api::CartGateway;
use pantry_auth::IdentitySignal;
use pantry_core::error::PantryError;
use pantry_core::models::cart::{cart_item_count, cart_total, CartLine};
use pantry_core::models::item::{CollectionItem, ItemPayload, ProductKey};

use crate::collection::{CollectionStore, PendingMutation, StorePolicy, StoreState};

pub type CartItem = CollectionItem<CartLine>;

/// The signed-in user's cart.
#[derive(Clone)]
pub struct CartStore {
    store: CollectionStore<CartLine, dyn CartGateway>,
}

impl CartStore {
    pub fn new(gateway: Arc<dyn CartGateway>, identity: IdentitySignal, policy: StorePolicy) -> Self {
        Self {
            store: CollectionStore::new("cart", gateway, identity, policy),
        }
    }

    pub fn items(&self) -> Vec<CartItem> {
        self.store.items()
    }

    pub fn contains(&self, key: &ProductKey) -> bool {
        self.store.contains(key)
    }

    pub fn get(&self, key: &ProductKey) -> Option<CartItem> {
        self.store.get(key)
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState<CartLine>> {
        self.store.subscribe()
    }

    pub async fn wait_until_loaded(&self) {
        self.store.wait_until_loaded().await
    }

    /// Sum of price × quantity over the visible cart.
    pub fn total(&self) -> Decimal {
        self.store.read(|s| cart_total(s.items()))
    }

    /// Number of units in the visible cart.
    pub fn item_count(&self) -> u32 {
        self.store.read(|s| cart_item_count(s.items()))
    }

    /// Put a product in the cart. If it is already there, the quantities add up.
    pub fn add_item(&self, payload: ItemPayload<CartLine>) -> Result<PendingMutation, PantryError> {
        let quantity = payload.fields.quantity;
        if quantity == 0 {
            return Err(PantryError::InvalidQuantity { quantity });
        }
        match self.store.get(&payload.key) {
            Some(existing) => {
                let total = existing.fields.quantity.saturating_add(quantity);
                self.update_quantity(&payload.key, total)
            }
            None => self.store.add(payload),
        }
    }

    pub fn remove_item(&self, key: &ProductKey) -> Result<PendingMutation, PantryError> {
        self.store.remove(key)
    }

    /// Set a line's quantity; zero removes the line.
    pub fn update_quantity(
        &self,
        key: &ProductKey,
        quantity: u32,
    ) -> Result<PendingMutation, PantryError> {
        if quantity == 0 {
            return self.store.remove(key);
        }
        self.store.patch(
            key,
            |line| line.quantity = quantity,
            move |gateway, key| async move { gateway.set_quantity(&key, quantity).await.map(Some) },
        )
    }

    pub fn clear(&self) -> Result<PendingMutation, PantryError> {
        self.store.clear()
    }

    pub fn dispose(&self) {
        self.store.dispose()
    }

    /// The underlying generic store.
    pub fn store(&self) -> &CollectionStore<CartLine, dyn CartGateway> {
        &self.store
    }
}
