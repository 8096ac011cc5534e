use std::sync::Arc;

use pantry_api::{ApiClient, AuthApi, CartGateway, HttpCollectionGateway};
use pantry_auth::{CredentialStore, Session};
use pantry_core::config::PantryConfig;
use pantry_core::error::PantryError;
use pantry_core::models::cart::CartLine;
use pantry_core::models::wishlist::WishlistProduct;

use crate::cart::CartStore;
use crate::collection::StorePolicy;
use crate::wishlist::{WishlistGateway, WishlistStore};

/// Everything that lives for one application session: the login session and
/// the user-scoped collections bound to it.
///
/// Build one at start-up and hand it to whatever needs the collections.
pub struct Storefront {
    session: Arc<Session>,
    wishlist: WishlistStore,
    cart: CartStore,
}

impl Storefront {
    pub fn new(
        session: Arc<Session>,
        wishlist_gateway: Arc<WishlistGateway>,
        cart_gateway: Arc<dyn CartGateway>,
        policy: StorePolicy,
    ) -> Self {
        let identity = session.identity().clone();
        Self {
            wishlist: WishlistStore::new(wishlist_gateway, identity.clone(), policy),
            cart: CartStore::new(cart_gateway, identity, policy),
            session,
        }
    }

    /// Wire the stores to the HTTP API described by `config`.
    ///
    /// Returns the auth endpoints alongside, sharing the same session.
    pub fn connect(
        config: &PantryConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<(Self, AuthApi), PantryError> {
        let session = Arc::new(Session::new(credentials, config.credential_key.clone()));
        let api = ApiClient::new(config, Arc::clone(&session))?;

        let wishlist_gateway: Arc<WishlistGateway> =
            Arc::new(HttpCollectionGateway::<WishlistProduct>::new(api.clone()));
        let cart_gateway: Arc<dyn CartGateway> =
            Arc::new(HttpCollectionGateway::<CartLine>::new(api.clone()));

        let storefront = Self::new(
            session,
            wishlist_gateway,
            cart_gateway,
            StorePolicy::from(config),
        );
        Ok((storefront, AuthApi::new(api)))
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn wishlist(&self) -> &WishlistStore {
        &self.wishlist
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    /// Wait for both collections to finish their initial fetch.
    pub async fn wait_until_loaded(&self) {
        tokio::join!(self.wishlist.wait_until_loaded(), self.cart.wait_until_loaded());
    }

    /// Detach both stores from the session and ignore late replies.
    pub fn dispose(&self) {
        self.wishlist.dispose();
        self.cart.dispose();
    }
}
