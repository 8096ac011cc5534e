use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use pantry_core::error::PantryError;
use pantry_core::models::cart::CartLine;
use pantry_core::models::item::{CollectionItem, EntryId, ItemPayload, ProductKey};
use pantry_core::models::wishlist::WishlistProduct;

use crate::client::ApiClient;
use crate::{CartGateway, CollectionGateway};

/// Where a collection lives on the backend and how its responses are wrapped.
pub trait RemoteResource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Resource path, e.g. `/wishlist`.
    const PATH: &'static str;
    /// Field holding the entry list in the `GET` response.
    const LIST_FIELD: &'static str;
    /// Field holding the stored entry in `POST` / `PATCH` responses.
    const ITEM_FIELD: &'static str;
}

impl RemoteResource for WishlistProduct {
    const PATH: &'static str = "/wishlist";
    const LIST_FIELD: &'static str = "wishlist";
    const ITEM_FIELD: &'static str = "wishlistItem";
}

impl RemoteResource for CartLine {
    const PATH: &'static str = "/cart";
    const LIST_FIELD: &'static str = "cart";
    const ITEM_FIELD: &'static str = "cartItem";
}

#[derive(Deserialize)]
struct WireEntry<F> {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "productId")]
    product_id: String,
    #[serde(rename = "createdAt", default)]
    created_at: Option<String>,
    #[serde(flatten)]
    fields: F,
}

impl<F> From<WireEntry<F>> for CollectionItem<F> {
    fn from(w: WireEntry<F>) -> Self {
        let mut item = CollectionItem::confirmed(ProductKey(w.product_id), EntryId(w.id), w.fields);
        item.added_at = w
            .created_at
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        item
    }
}

#[derive(Serialize)]
struct WirePayload<'a, F> {
    #[serde(rename = "productId")]
    product_id: &'a str,
    #[serde(flatten)]
    fields: &'a F,
}

fn parse_error(e: serde_json::Error) -> PantryError {
    PantryError::ApiError {
        status: 0,
        message: format!("JSON parse error: {e}"),
    }
}

/// Decode a list response. A missing or null list field is an empty list.
pub(crate) fn decode_list<F: RemoteResource>(
    mut body: serde_json::Value,
) -> Result<Vec<CollectionItem<F>>, PantryError> {
    let list = match body.get_mut(F::LIST_FIELD).map(serde_json::Value::take) {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(list) => list,
    };
    let entries: Vec<WireEntry<F>> = serde_json::from_value(list).map_err(parse_error)?;
    Ok(entries.into_iter().map(CollectionItem::from).collect())
}

/// Decode a single-entry response.
pub(crate) fn decode_item<F: RemoteResource>(
    mut body: serde_json::Value,
) -> Result<CollectionItem<F>, PantryError> {
    let entry = body
        .get_mut(F::ITEM_FIELD)
        .map(serde_json::Value::take)
        .ok_or_else(|| PantryError::ApiError {
            status: 0,
            message: format!("response is missing `{}`", F::ITEM_FIELD),
        })?;
    let entry: WireEntry<F> = serde_json::from_value(entry).map_err(parse_error)?;
    Ok(entry.into())
}

/// Collection gateway speaking the storefront's REST conventions.
pub struct HttpCollectionGateway<F> {
    api: ApiClient,
    _resource: PhantomData<fn() -> F>,
}

impl<F: RemoteResource> HttpCollectionGateway<F> {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            _resource: PhantomData,
        }
    }

    fn entry_path(key: &ProductKey) -> String {
        format!("{}/{}", F::PATH, key)
    }
}

#[async_trait]
impl<F: RemoteResource> CollectionGateway<F> for HttpCollectionGateway<F> {
    async fn fetch_all(&self) -> Result<Vec<CollectionItem<F>>, PantryError> {
        let request = self.api.authed(Method::GET, F::PATH)?;
        let body: serde_json::Value = ApiClient::send_json(request).await?;
        let items = decode_list::<F>(body)?;
        tracing::debug!(resource = F::PATH, count = items.len(), "fetched collection");
        Ok(items)
    }

    async fn add(&self, payload: &ItemPayload<F>) -> Result<CollectionItem<F>, PantryError> {
        let body = WirePayload {
            product_id: payload.key.as_str(),
            fields: &payload.fields,
        };
        let request = self.api.authed(Method::POST, F::PATH)?.json(&body);
        let resp: serde_json::Value = ApiClient::send_json(request).await?;
        decode_item::<F>(resp)
    }

    async fn remove(&self, key: &ProductKey) -> Result<(), PantryError> {
        let request = self.api.authed(Method::DELETE, &Self::entry_path(key))?;
        ApiClient::send(request).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), PantryError> {
        let request = self.api.authed(Method::DELETE, F::PATH)?;
        ApiClient::send(request).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct QuantityBody {
    quantity: u32,
}

#[async_trait]
impl CartGateway for HttpCollectionGateway<CartLine> {
    async fn set_quantity(
        &self,
        key: &ProductKey,
        quantity: u32,
    ) -> Result<CollectionItem<CartLine>, PantryError> {
        let request = self
            .api
            .authed(Method::PATCH, &Self::entry_path(key))?
            .json(&QuantityBody { quantity });
        let resp: serde_json::Value = ApiClient::send_json(request).await?;
        decode_item::<CartLine>(resp)
    }
}
