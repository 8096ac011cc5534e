use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use pantry_core::error::PantryError;
use pantry_core::models::cart::CartLine;
use pantry_core::models::item::{CollectionItem, EntryId, ItemPayload, ProductKey};

use crate::{CartGateway, CollectionGateway};

/// In-memory collection backend for testing.
///
/// Behaves like the real service: entries are unique per product, newest
/// first, and each add is assigned the next `e<n>` entry id.
pub struct MemoryGateway<F> {
    entries: Mutex<Vec<CollectionItem<F>>>,
    next_id: AtomicU64,
    failing: AtomicBool,
}

impl<F: Clone> MemoryGateway<F> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with a 503 until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Replace the server-side contents.
    pub fn seed(&self, items: Vec<CollectionItem<F>>) {
        if let Ok(mut entries) = self.entries.lock() {
            *entries = items;
        }
    }

    /// Server-side contents.
    pub fn snapshot(&self) -> Vec<CollectionItem<F>> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn check(&self) -> Result<std::sync::MutexGuard<'_, Vec<CollectionItem<F>>>, PantryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PantryError::ApiError {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        self.entries
            .lock()
            .map_err(|_| PantryError::Other("memory gateway poisoned".into()))
    }
}

impl<F: Clone> Default for MemoryGateway<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<F: Clone + Send + Sync + 'static> CollectionGateway<F> for MemoryGateway<F> {
    async fn fetch_all(&self) -> Result<Vec<CollectionItem<F>>, PantryError> {
        Ok(self.check()?.clone())
    }

    async fn add(&self, payload: &ItemPayload<F>) -> Result<CollectionItem<F>, PantryError> {
        let mut entries = self.check()?;
        if let Some(existing) = entries.iter().find(|e| e.key == payload.key) {
            return Ok(existing.clone());
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut item = CollectionItem::confirmed(
            payload.key.clone(),
            EntryId(format!("e{id}")),
            payload.fields.clone(),
        );
        item.added_at = Some(Utc::now());
        entries.insert(0, item.clone());
        Ok(item)
    }

    async fn remove(&self, key: &ProductKey) -> Result<(), PantryError> {
        self.check()?.retain(|e| &e.key != key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), PantryError> {
        self.check()?.clear();
        Ok(())
    }
}

#[async_trait]
impl CartGateway for MemoryGateway<CartLine> {
    async fn set_quantity(
        &self,
        key: &ProductKey,
        quantity: u32,
    ) -> Result<CollectionItem<CartLine>, PantryError> {
        let mut entries = self.check()?;
        let entry = entries
            .iter_mut()
            .find(|e| &e.key == key)
            .ok_or_else(|| PantryError::ApiError {
                status: 404,
                message: format!("cart item {key} not found"),
            })?;
        entry.fields.quantity = quantity;
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(quantity: u32) -> CartLine {
        CartLine::new("Makhana", "m.png", Decimal::from(120), quantity)
    }

    #[tokio::test]
    async fn test_add_assigns_entry_ids_newest_first() {
        let gw = MemoryGateway::<CartLine>::new();
        let a = gw.add(&ItemPayload::new("p1", line(1))).await.unwrap();
        let b = gw.add(&ItemPayload::new("p2", line(1))).await.unwrap();
        assert_eq!(a.entry_id, Some(EntryId::from("e1")));
        assert_eq!(b.entry_id, Some(EntryId::from("e2")));

        let keys: Vec<_> = gw.fetch_all().await.unwrap().into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec![ProductKey::from("p2"), ProductKey::from("p1")]);
    }

    #[tokio::test]
    async fn test_add_is_idempotent_per_product() {
        let gw = MemoryGateway::<CartLine>::new();
        gw.add(&ItemPayload::new("p1", line(1))).await.unwrap();
        gw.add(&ItemPayload::new("p1", line(1))).await.unwrap();
        assert_eq!(gw.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_switch() {
        let gw = MemoryGateway::<CartLine>::new();
        gw.set_failing(true);
        let err = gw.fetch_all().await.unwrap_err();
        assert!(matches!(err, PantryError::ApiError { status: 503, .. }));
        gw.set_failing(false);
        assert!(gw.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_quantity_unknown_key() {
        let gw = MemoryGateway::<CartLine>::new();
        let err = gw.set_quantity(&ProductKey::from("nope"), 2).await.unwrap_err();
        assert!(matches!(err, PantryError::ApiError { status: 404, .. }));
    }
}
