pub mod cart;
pub mod collection;
mod key_queue;
pub mod storefront;
pub mod wishlist;

pub use cart::CartStore;
pub use collection::{CollectionStore, PendingMutation, StorePolicy, StoreState};
pub use storefront::Storefront;
pub use wishlist::WishlistStore;
