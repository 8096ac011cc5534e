#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Semaphore;

use pantry_api::{CartGateway, CollectionGateway, MemoryGateway};
use pantry_core::error::PantryError;
use pantry_core::models::cart::CartLine;
use pantry_core::models::identity::Identity;
use pantry_core::models::item::{CollectionItem, EntryId, ItemPayload, ProductKey};
use pantry_core::models::wishlist::WishlistProduct;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchAll,
    Add(String),
    Remove(String),
    Clear,
    SetQuantity(String, u32),
}

/// Gateway whose replies are held back until the test releases them.
///
/// The wrapped backend is updated when a call arrives; only the reply waits.
/// Replies are released in arrival order; `clear` replies have a gate of
/// their own so they can be held while other calls complete.
pub struct GatedGateway<F> {
    backend: MemoryGateway<F>,
    calls: Mutex<Vec<Call>>,
    gate: Semaphore,
    clear_gate: Semaphore,
    completed: AtomicUsize,
}

impl<F: Clone + Send + Sync + 'static> GatedGateway<F> {
    pub fn closed() -> Arc<Self> {
        Arc::new(Self {
            backend: MemoryGateway::new(),
            calls: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
            clear_gate: Semaphore::new(0),
            completed: AtomicUsize::new(0),
        })
    }

    pub fn release(&self, replies: usize) {
        self.gate.add_permits(replies);
    }

    pub fn release_clear(&self) {
        self.clear_gate.add_permits(1);
    }

    pub fn backend(&self) -> &MemoryGateway<F> {
        &self.backend
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    async fn reply<T>(&self, call: Call, result: Result<T, PantryError>) -> Result<T, PantryError> {
        let gate = match call {
            Call::Clear => &self.clear_gate,
            _ => &self.gate,
        };
        self.calls.lock().unwrap().push(call);
        gate.acquire().await.unwrap().forget();
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl<F: Clone + Send + Sync + 'static> CollectionGateway<F> for GatedGateway<F> {
    async fn fetch_all(&self) -> Result<Vec<CollectionItem<F>>, PantryError> {
        let result = self.backend.fetch_all().await;
        self.reply(Call::FetchAll, result).await
    }

    async fn add(&self, payload: &ItemPayload<F>) -> Result<CollectionItem<F>, PantryError> {
        let result = self.backend.add(payload).await;
        self.reply(Call::Add(payload.key.0.clone()), result).await
    }

    async fn remove(&self, key: &ProductKey) -> Result<(), PantryError> {
        let result = self.backend.remove(key).await;
        self.reply(Call::Remove(key.0.clone()), result).await
    }

    async fn clear(&self) -> Result<(), PantryError> {
        let result = self.backend.clear().await;
        self.reply(Call::Clear, result).await
    }
}

#[async_trait]
impl CartGateway for GatedGateway<CartLine> {
    async fn set_quantity(
        &self,
        key: &ProductKey,
        quantity: u32,
    ) -> Result<CollectionItem<CartLine>, PantryError> {
        let result = self.backend.set_quantity(key, quantity).await;
        self.reply(Call::SetQuantity(key.0.clone(), quantity), result)
            .await
    }
}

pub fn user(id: &str) -> Identity {
    Identity::new(id, format!("User {id}"), format!("{id}@example.com"))
}

pub fn key(id: &str) -> ProductKey {
    ProductKey::from(id)
}

pub fn snack(id: &str) -> ItemPayload<WishlistProduct> {
    ItemPayload::new(
        id,
        WishlistProduct::new(format!("Snack {id}"), format!("{id}.png"), Decimal::new(14900, 2)),
    )
}

pub fn stored_snack(id: &str, entry: &str) -> CollectionItem<WishlistProduct> {
    CollectionItem::confirmed(key(id), EntryId::from(entry), snack(id).fields)
}

pub fn line(id: &str, price: i64, quantity: u32) -> ItemPayload<CartLine> {
    ItemPayload::new(
        id,
        CartLine::new(format!("Snack {id}"), format!("{id}.png"), Decimal::from(price), quantity),
    )
}

pub fn keys<F>(items: &[CollectionItem<F>]) -> Vec<String> {
    items.iter().map(|i| i.key.0.clone()).collect()
}

/// Poll `cond` until it holds, failing the test after about a second.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// Let spawned tasks run for a moment.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
