use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a catalog product. Collections are keyed by this,
/// never by the server-assigned entry id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductKey(pub String);

impl ProductKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProductKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Server-assigned identifier of a stored collection row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Intent to add a product to a collection, carrying the display snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPayload<F> {
    pub key: ProductKey,
    pub fields: F,
}

impl<F> ItemPayload<F> {
    pub fn new(key: impl Into<ProductKey>, fields: F) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }
}

/// One entry of a user-scoped collection.
///
/// `entry_id` is `None` while the entry is provisional, i.e. applied locally
/// but not yet acknowledged by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem<F> {
    pub key: ProductKey,
    pub entry_id: Option<EntryId>,
    pub fields: F,
    pub added_at: Option<DateTime<Utc>>,
}

impl<F> CollectionItem<F> {
    /// Build an unacknowledged entry from an add intent.
    pub fn provisional(payload: ItemPayload<F>) -> Self {
        Self {
            key: payload.key,
            entry_id: None,
            fields: payload.fields,
            added_at: None,
        }
    }

    /// Build a server-acknowledged entry.
    pub fn confirmed(key: ProductKey, entry_id: EntryId, fields: F) -> Self {
        Self {
            key,
            entry_id: Some(entry_id),
            fields,
            added_at: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.entry_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_has_no_entry_id() {
        let item = CollectionItem::provisional(ItemPayload::new("p1", ()));
        assert_eq!(item.key, ProductKey::from("p1"));
        assert!(!item.is_confirmed());
    }

    #[test]
    fn test_product_key_is_transparent_on_the_wire() {
        let json = serde_json::to_string(&ProductKey::from("64f0c2")).unwrap();
        assert_eq!(json, "\"64f0c2\"");
    }
}
