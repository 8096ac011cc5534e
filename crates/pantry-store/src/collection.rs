//! Optimistic, user-scoped mirror of a server-held collection.
//!
//! A [`CollectionStore`] keeps the current user's entries in memory and is the
//! only writer of that list. Mutations are applied locally before the
//! gateway round trip starts and reconciled (or undone) when it finishes.
//! Identity transitions reset the list: logout empties it on the spot,
//! login starts a fresh fetch.
//!
//! Every mutation is tagged with the store's epoch and an intent number at
//! issue time. A response only reconciles or rolls back local state while it
//! belongs to the current epoch and to the latest intent for its key. A
//! superseded reply that succeeded is kept aside so that a later failure for
//! the same key rolls back to what the server actually holds.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use pantry_api::CollectionGateway;
use pantry_auth::identity::{IdentityObserver, IdentitySignal};
use pantry_core::config::PantryConfig;
use pantry_core::error::PantryError;
use pantry_core::models::identity::Identity;
use pantry_core::models::item::{CollectionItem, EntryId, ItemPayload, ProductKey};

use crate::key_queue::KeyQueue;

/// How a store reacts to failures and concurrent intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// Undo the optimistic change when the gateway call fails.
    pub rollback_on_failure: bool,
    /// Run gateway calls for the same key one at a time, in issue order.
    pub serialize_per_key: bool,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            rollback_on_failure: true,
            serialize_per_key: true,
        }
    }
}

impl From<&PantryConfig> for StorePolicy {
    fn from(config: &PantryConfig) -> Self {
        Self {
            rollback_on_failure: config.rollback_on_failure,
            serialize_per_key: config.serialize_per_key,
        }
    }
}

/// Snapshot of a store, as seen by readers.
#[derive(Debug, Clone)]
pub struct StoreState<F> {
    items: Vec<CollectionItem<F>>,
    index: HashMap<ProductKey, Entry>,
    is_loading: bool,
    epoch: u64,
    /// Last intent number handed out; never reused.
    next_seq: u64,
    /// Latest unsettled intent per key.
    pending: HashMap<ProductKey, u64>,
    /// Server outcome of superseded intents, for keys that still have a
    /// later intent in flight.
    confirmed: HashMap<ProductKey, (u64, CollectionItem<F>)>,
    /// Intents up to this number were issued before a completed clear.
    cleared_through: u64,
}

/// Index record of a visible entry.
#[derive(Debug, Clone)]
struct Entry {
    entry_id: Option<EntryId>,
    /// Intent that put the entry in the list; 0 for fetched entries.
    seq: u64,
}

impl<F> Default for StoreState<F> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            is_loading: false,
            epoch: 0,
            next_seq: 0,
            pending: HashMap::new(),
            confirmed: HashMap::new(),
            cleared_through: 0,
        }
    }
}

impl<F> StoreState<F> {
    /// Entries in display order, newest first.
    pub fn items(&self) -> &[CollectionItem<F>] {
        &self.items
    }

    pub fn contains(&self, key: &ProductKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &ProductKey) -> Option<&CollectionItem<F>> {
        if !self.contains(key) {
            return None;
        }
        self.items.iter().find(|i| &i.key == key)
    }

    /// Server entry id for `key`; `Some(None)` while the entry is provisional.
    pub fn entry_id(&self, key: &ProductKey) -> Option<Option<&EntryId>> {
        self.index.get(key).map(|e| e.entry_id.as_ref())
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keys with a mutation still awaiting its gateway reply.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn position(&self, key: &ProductKey) -> Option<usize> {
        if !self.contains(key) {
            return None;
        }
        self.items.iter().position(|i| &i.key == key)
    }

    fn insert_at(&mut self, position: usize, item: CollectionItem<F>, seq: u64) {
        let entry = Entry {
            entry_id: item.entry_id.clone(),
            seq,
        };
        self.index.insert(item.key.clone(), entry);
        let position = position.min(self.items.len());
        self.items.insert(position, item);
    }

    fn take(&mut self, key: &ProductKey) -> Option<Taken<F>> {
        let position = self.position(key)?;
        let seq = self.index.remove(key).map_or(0, |e| e.seq);
        Some(Taken {
            position,
            item: self.items.remove(position),
            seq,
        })
    }

    fn replace(&mut self, item: CollectionItem<F>) -> bool {
        match self.position(&item.key) {
            Some(position) => {
                if let Some(entry) = self.index.get_mut(&item.key) {
                    entry.entry_id = item.entry_id.clone();
                }
                self.items[position] = item;
                true
            }
            None => false,
        }
    }

    fn reset(&mut self, items: Vec<CollectionItem<F>>) {
        self.items.clear();
        self.index.clear();
        for item in items {
            if self.index.contains_key(&item.key) {
                tracing::warn!(key = %item.key, "duplicate entry from server dropped");
                continue;
            }
            let entry = Entry {
                entry_id: item.entry_id.clone(),
                seq: 0,
            };
            self.index.insert(item.key.clone(), entry);
            self.items.push(item);
        }
    }

    /// Start a new session view: empty, with every outstanding tag invalidated.
    fn new_epoch(&mut self, loading: bool) -> u64 {
        self.epoch += 1;
        self.items.clear();
        self.index.clear();
        self.pending.clear();
        self.confirmed.clear();
        self.is_loading = loading;
        self.epoch
    }

    fn issue(&mut self, key: &ProductKey) -> Ticket {
        self.next_seq += 1;
        self.pending.insert(key.clone(), self.next_seq);
        Ticket {
            epoch: self.epoch,
            seq: self.next_seq,
        }
    }

    fn is_current(&self, key: &ProductKey, ticket: Ticket) -> bool {
        self.epoch == ticket.epoch && self.pending.get(key) == Some(&ticket.seq)
    }

    /// Apply a successful reply. Returns whether the visible list changed.
    ///
    /// The latest intent for a key reconciles the entry. An earlier one only
    /// records what the server now holds, in case the latest intent fails.
    fn confirm(
        &mut self,
        key: &ProductKey,
        ticket: Ticket,
        outcome: Option<CollectionItem<F>>,
        removal: bool,
    ) -> bool {
        if self.epoch != ticket.epoch {
            return false;
        }
        if self.is_current(key, ticket) {
            self.pending.remove(key);
            self.confirmed.remove(key);
            return match outcome {
                Some(mut item) => {
                    item.key = key.clone();
                    self.replace(item)
                }
                None => false,
            };
        }

        if !self.pending.contains_key(key) || ticket.seq <= self.cleared_through {
            return false;
        }
        let newer = self
            .confirmed
            .get(key)
            .map_or(true, |(seq, _)| *seq < ticket.seq);
        if newer {
            match outcome {
                Some(mut item) => {
                    item.key = key.clone();
                    self.confirmed.insert(key.clone(), (ticket.seq, item));
                }
                None if removal => {
                    self.confirmed.remove(key);
                }
                None => {}
            }
        }
        false
    }

    /// Handle a failed reply. Returns whether the visible list changed.
    fn fail(&mut self, key: &ProductKey, ticket: Ticket, undo: Undo<F>, rollback: bool) -> bool {
        if !self.is_current(key, ticket) {
            return false;
        }
        self.pending.remove(key);
        let server = self.confirmed.remove(key).map(|(_, item)| item);
        rollback && self.undo(key, ticket, undo, server)
    }

    /// Revert a failed mutation. `server` is the outcome of an earlier intent
    /// for the same key that succeeded after this one was issued; it wins
    /// over the issue-time snapshot.
    fn undo(
        &mut self,
        key: &ProductKey,
        ticket: Ticket,
        undo: Undo<F>,
        server: Option<CollectionItem<F>>,
    ) -> bool {
        if let Some(server) = server {
            if self.contains(key) {
                return self.replace(server);
            }
            let (position, seq) = match &undo {
                Undo::Remove(Some(taken)) => (taken.position, taken.seq),
                _ => (0, ticket.seq),
            };
            self.insert_at(position, server, seq);
            return true;
        }
        match undo {
            Undo::Insert => self.take(key).is_some(),
            Undo::Remove(Some(taken)) if !self.contains(key) => {
                self.insert_at(taken.position, taken.item, taken.seq);
                true
            }
            Undo::Remove(_) => false,
            Undo::Patch(previous) => match self.position(key) {
                Some(position) => {
                    self.items[position].fields = previous;
                    true
                }
                None => false,
            },
        }
    }

    /// Apply a completed clear issued when `mark` was the last intent.
    ///
    /// Entries and tags from before the clear go; anything issued after it
    /// stays.
    fn cleared(&mut self, epoch: u64, mark: u64) -> bool {
        if self.epoch != epoch {
            return false;
        }
        self.cleared_through = self.cleared_through.max(mark);
        self.pending.retain(|_, seq| *seq > mark);
        self.confirmed.retain(|_, (seq, _)| *seq > mark);

        let before = self.items.len();
        let index = &mut self.index;
        self.items.retain(|item| match index.get(&item.key) {
            Some(entry) if entry.seq > mark => true,
            _ => {
                index.remove(&item.key);
                false
            }
        });
        before != self.items.len()
    }
}

/// Issue-time tags of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    epoch: u64,
    seq: u64,
}

/// An entry lifted out of the list, with where it was.
struct Taken<F> {
    position: usize,
    item: CollectionItem<F>,
    seq: u64,
}

/// What to restore if a mutation's gateway call fails.
enum Undo<F> {
    Insert,
    Remove(Option<Taken<F>>),
    Patch(F),
}

type GatewayCall<F> =
    Pin<Box<dyn Future<Output = Result<Option<CollectionItem<F>>, PantryError>> + Send>>;

/// The network half of a mutation.
///
/// The local change has already been applied when this is returned. Awaiting
/// it yields the gateway outcome; dropping it does not cancel the call.
pub struct PendingMutation {
    inner: PendingInner,
}

enum PendingInner {
    Spawned(JoinHandle<Result<(), PantryError>>),
    Ready(Option<Result<(), PantryError>>),
}

impl PendingMutation {
    fn spawned(handle: JoinHandle<Result<(), PantryError>>) -> Self {
        Self {
            inner: PendingInner::Spawned(handle),
        }
    }

    /// A mutation that needed no gateway call.
    pub fn ready() -> Self {
        Self {
            inner: PendingInner::Ready(Some(Ok(()))),
        }
    }
}

impl Future for PendingMutation {
    type Output = Result<(), PantryError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            PendingInner::Spawned(handle) => Pin::new(handle).poll(cx).map(|joined| {
                joined.unwrap_or_else(|e| Err(PantryError::Other(format!("mutation task failed: {e}"))))
            }),
            PendingInner::Ready(result) => Poll::Ready(result.take().unwrap_or(Ok(()))),
        }
    }
}

struct Inner<F, G: ?Sized> {
    name: &'static str,
    gateway: Arc<G>,
    identity: IdentitySignal,
    policy: StorePolicy,
    state: watch::Sender<StoreState<F>>,
    queue: KeyQueue,
    disposed: AtomicBool,
}

impl<F, G> Inner<F, G>
where
    F: Clone + Send + Sync + 'static,
    G: CollectionGateway<F> + ?Sized + 'static,
{
    fn modify<R>(&self, f: impl FnOnce(&mut StoreState<F>) -> R) -> R {
        let mut out = None;
        self.state.send_modify(|state| out = Some(f(state)));
        match out {
            Some(r) => r,
            None => unreachable!("send_modify runs its closure exactly once"),
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn signed_out(&self) {
        self.modify(|s| s.new_epoch(false));
        self.queue.reset();
        tracing::debug!(collection = self.name, "cleared on sign-out");
    }

    fn signed_in(self: Arc<Self>, user: &Identity) {
        let epoch = self.modify(|s| s.new_epoch(true));
        self.queue.reset();

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::error!(collection = self.name, "no async runtime, cannot load");
                self.state.send_if_modified(|s| {
                    let current = s.epoch == epoch;
                    if current {
                        s.is_loading = false;
                    }
                    current
                });
                return;
            }
        };
        tracing::info!(collection = self.name, user = %user.id, "loading");
        handle.spawn(async move { self.load(epoch).await });
    }

    async fn load(&self, epoch: u64) {
        let result = self.gateway.fetch_all().await;
        if self.is_disposed() {
            return;
        }
        let name = self.name;
        self.state.send_if_modified(|s| {
            if s.epoch != epoch {
                tracing::debug!(collection = name, "discarding fetch from a previous session");
                return false;
            }
            match result {
                Ok(items) => {
                    s.reset(items);
                    tracing::info!(collection = name, count = s.items.len(), "loaded");
                }
                Err(e) => {
                    s.reset(Vec::new());
                    tracing::warn!(collection = name, "failed to fetch: {e}");
                }
            }
            s.is_loading = false;
            true
        });
    }

    async fn settle(
        &self,
        key: ProductKey,
        ticket: Ticket,
        undo: Undo<F>,
        call: GatewayCall<F>,
    ) -> Result<(), PantryError> {
        let removal = matches!(undo, Undo::Remove(_));
        let result = call.await;
        if self.is_disposed() {
            return result.map(|_| ());
        }
        match result {
            Ok(outcome) => {
                self.state
                    .send_if_modified(|s| s.confirm(&key, ticket, outcome, removal));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(collection = self.name, key = %key, "gateway call failed: {e}");
                let rollback = self.policy.rollback_on_failure;
                let restored = self
                    .state
                    .send_if_modified(|s| s.fail(&key, ticket, undo, rollback));
                if restored {
                    tracing::debug!(collection = self.name, key = %key, "rolled back");
                }
                Err(e)
            }
        }
    }
}

impl<F, G> IdentityObserver for Inner<F, G>
where
    F: Clone + Send + Sync + 'static,
    G: CollectionGateway<F> + ?Sized + 'static,
{
    fn identity_changed(self: Arc<Self>, current: Option<&Identity>) {
        if self.is_disposed() {
            return;
        }
        match current {
            Some(user) => self.signed_in(user),
            None => self.signed_out(),
        }
    }
}

/// Authenticated, optimistically-updated collection.
///
/// `F` is the per-entry display snapshot, `G` the gateway (usually a trait
/// object). Clones share the same state.
pub struct CollectionStore<F, G: ?Sized> {
    inner: Arc<Inner<F, G>>,
}

impl<F, G: ?Sized> Clone for CollectionStore<F, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F, G> CollectionStore<F, G>
where
    F: Clone + Send + Sync + 'static,
    G: CollectionGateway<F> + ?Sized + 'static,
{
    /// Create a store bound to `identity`.
    ///
    /// If a user is already signed in, the initial fetch starts right away.
    pub fn new(
        name: &'static str,
        gateway: Arc<G>,
        identity: IdentitySignal,
        policy: StorePolicy,
    ) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        let inner = Arc::new(Inner {
            name,
            gateway,
            identity: identity.clone(),
            policy,
            state,
            queue: KeyQueue::new(),
            disposed: AtomicBool::new(false),
        });

        let observer: Arc<dyn IdentityObserver> = inner.clone();
        identity.observe(Arc::downgrade(&observer));
        if let Some(user) = identity.current() {
            Arc::clone(&inner).signed_in(&user);
        }

        Self { inner }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn policy(&self) -> StorePolicy {
        self.inner.policy
    }

    // ── Reads ──

    pub fn items(&self) -> Vec<CollectionItem<F>> {
        self.inner.state.borrow().items.clone()
    }

    pub fn contains(&self, key: &ProductKey) -> bool {
        self.inner.state.borrow().contains(key)
    }

    pub fn get(&self, key: &ProductKey) -> Option<CollectionItem<F>> {
        self.inner.state.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.state.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    /// Borrow the current state without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState<F>) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// Receiver that is notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<StoreState<F>> {
        self.inner.state.subscribe()
    }

    /// Resolve once no identity-triggered fetch is in progress.
    pub async fn wait_until_loaded(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|s| !s.is_loading).await;
    }

    // ── Mutations ──

    fn ensure_authenticated(&self) -> Result<Handle, PantryError> {
        if !self.inner.identity.is_authenticated() {
            return Err(PantryError::NotAuthenticated);
        }
        Handle::try_current().map_err(|e| PantryError::Other(format!("no async runtime: {e}")))
    }

    /// Add `payload` if its key is absent, remove it otherwise.
    pub fn toggle(&self, payload: ItemPayload<F>) -> Result<PendingMutation, PantryError> {
        let runtime = self.ensure_authenticated()?;
        let key = payload.key.clone();

        let (ticket, removed) = self.inner.modify(|s| {
            let ticket = s.issue(&key);
            match s.take(&key) {
                Some(removed) => (ticket, Some(removed)),
                None => {
                    s.insert_at(0, CollectionItem::provisional(payload.clone()), ticket.seq);
                    (ticket, None)
                }
            }
        });

        let gateway = Arc::clone(&self.inner.gateway);
        let pending = match removed {
            Some(removed) => {
                tracing::debug!(collection = self.name(), key = %key, "optimistic remove");
                let call_key = key.clone();
                let call: GatewayCall<F> =
                    Box::pin(async move { gateway.remove(&call_key).await.map(|()| None) });
                self.dispatch(&runtime, key, ticket, Undo::Remove(Some(removed)), call)
            }
            None => {
                tracing::debug!(collection = self.name(), key = %key, "optimistic add");
                let call: GatewayCall<F> =
                    Box::pin(async move { gateway.add(&payload).await.map(Some) });
                self.dispatch(&runtime, key, ticket, Undo::Insert, call)
            }
        };
        Ok(pending)
    }

    /// Add `payload` unless its key is already present.
    pub fn add(&self, payload: ItemPayload<F>) -> Result<PendingMutation, PantryError> {
        let runtime = self.ensure_authenticated()?;
        let key = payload.key.clone();

        let ticket = self.inner.modify(|s| {
            if s.contains(&key) {
                return None;
            }
            let ticket = s.issue(&key);
            s.insert_at(0, CollectionItem::provisional(payload.clone()), ticket.seq);
            Some(ticket)
        });
        let Some(ticket) = ticket else {
            return Ok(PendingMutation::ready());
        };

        tracing::debug!(collection = self.name(), key = %key, "optimistic add");
        let gateway = Arc::clone(&self.inner.gateway);
        let call: GatewayCall<F> = Box::pin(async move { gateway.add(&payload).await.map(Some) });
        Ok(self.dispatch(&runtime, key, ticket, Undo::Insert, call))
    }

    /// Remove `key` locally, then on the server.
    pub fn remove(&self, key: &ProductKey) -> Result<PendingMutation, PantryError> {
        let runtime = self.ensure_authenticated()?;

        let (ticket, removed) = self.inner.modify(|s| (s.issue(key), s.take(key)));

        tracing::debug!(collection = self.name(), key = %key, "optimistic remove");
        let gateway = Arc::clone(&self.inner.gateway);
        let call_key = key.clone();
        let call: GatewayCall<F> =
            Box::pin(async move { gateway.remove(&call_key).await.map(|()| None) });
        Ok(self.dispatch(&runtime, key.clone(), ticket, Undo::Remove(removed), call))
    }

    /// Edit the fields of an existing entry locally, then run `call`.
    ///
    /// `call` receives the gateway and key and performs the matching server
    /// update; the entry it returns, if any, replaces the local one.
    pub fn patch<C, Fut>(
        &self,
        key: &ProductKey,
        edit: impl FnOnce(&mut F),
        call: C,
    ) -> Result<PendingMutation, PantryError>
    where
        C: FnOnce(Arc<G>, ProductKey) -> Fut,
        Fut: Future<Output = Result<Option<CollectionItem<F>>, PantryError>> + Send + 'static,
    {
        let runtime = self.ensure_authenticated()?;

        let patched = self.inner.modify(|s| {
            let position = s.position(key)?;
            let ticket = s.issue(key);
            let entry = &mut s.items[position];
            let previous = entry.fields.clone();
            edit(&mut entry.fields);
            Some((ticket, previous))
        });
        let Some((ticket, previous)) = patched else {
            return Err(PantryError::ItemNotFound {
                key: key.to_string(),
            });
        };

        tracing::debug!(collection = self.name(), key = %key, "optimistic update");
        let call: GatewayCall<F> = Box::pin(call(Arc::clone(&self.inner.gateway), key.clone()));
        Ok(self.dispatch(&runtime, key.clone(), ticket, Undo::Patch(previous), call))
    }

    /// Empty the collection on the server, then locally.
    ///
    /// Without a signed-in user this resolves immediately and does nothing.
    pub fn clear(&self) -> Result<PendingMutation, PantryError> {
        let runtime = match self.ensure_authenticated() {
            Ok(runtime) => runtime,
            Err(PantryError::NotAuthenticated) => return Ok(PendingMutation::ready()),
            Err(e) => return Err(e),
        };

        let (epoch, mark) = {
            let state = self.inner.state.borrow();
            (state.epoch, state.next_seq)
        };
        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move {
            let result = inner.gateway.clear().await;
            if inner.is_disposed() {
                return result;
            }
            match &result {
                Ok(()) => {
                    inner.state.send_if_modified(|s| s.cleared(epoch, mark));
                    tracing::debug!(collection = inner.name, "cleared");
                }
                Err(e) => tracing::warn!(collection = inner.name, "clear failed: {e}"),
            }
            result
        });
        Ok(PendingMutation::spawned(handle))
    }

    /// Stop reacting to identity changes and gateway replies.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
    }

    fn dispatch(
        &self,
        runtime: &Handle,
        key: ProductKey,
        ticket: Ticket,
        undo: Undo<F>,
        call: GatewayCall<F>,
    ) -> PendingMutation {
        let turn = self
            .inner
            .policy
            .serialize_per_key
            .then(|| self.inner.queue.enqueue(&key));
        let inner = Arc::clone(&self.inner);
        PendingMutation::spawned(runtime.spawn(async move {
            let _slot = match turn {
                Some(turn) => Some(turn.wait().await),
                None => None,
            };
            inner.settle(key, ticket, undo, call).await
        }))
    }
}
