use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use pantry_core::models::item::ProductKey;

const PRUNE_THRESHOLD: usize = 64;

/// Per-key FIFO of in-flight operations.
///
/// Each [`KeyQueue::enqueue`] call takes a place in line immediately; the
/// returned [`Turn`] resolves once every earlier turn for the same key has
/// finished. Keys are independent of each other.
pub(crate) struct KeyQueue {
    tails: Mutex<HashMap<ProductKey, oneshot::Receiver<()>>>,
}

/// A place in line for one key.
pub(crate) struct Turn {
    prev: Option<oneshot::Receiver<()>>,
    done: oneshot::Sender<()>,
}

/// Held while an operation runs; dropping it lets the next turn proceed.
pub(crate) struct Slot {
    _done: oneshot::Sender<()>,
}

impl KeyQueue {
    pub(crate) fn new() -> Self {
        Self {
            tails: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn enqueue(&self, key: &ProductKey) -> Turn {
        let (done, rx) = oneshot::channel();
        let prev = match self.tails.lock() {
            Ok(mut tails) => {
                if tails.len() >= PRUNE_THRESHOLD {
                    // Senders dropped means those operations are finished.
                    tails.retain(|_, rx| {
                        matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty))
                    });
                }
                tails.insert(key.clone(), rx)
            }
            Err(_) => None,
        };
        Turn { prev, done }
    }

    /// Forget all queued keys. Turns already handed out keep their order.
    pub(crate) fn reset(&self) {
        if let Ok(mut tails) = self.tails.lock() {
            tails.clear();
        }
    }
}

impl Turn {
    pub(crate) async fn wait(self) -> Slot {
        if let Some(prev) = self.prev {
            // Err means the previous holder was dropped, which also releases us.
            let _ = prev.await;
        }
        Slot { _done: self.done }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_waits_for_previous_slot() {
        let queue = KeyQueue::new();
        let key = ProductKey::from("p1");
        let first = queue.enqueue(&key);
        let second = queue.enqueue(&key);

        let slot = first.wait().await;
        let waiter = tokio::spawn(second.wait());
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(slot);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let queue = KeyQueue::new();
        let first = queue.enqueue(&ProductKey::from("p1"));
        let other = queue.enqueue(&ProductKey::from("p2"));

        let _slot = first.wait().await;
        let _other_slot = other.wait().await;
    }

    #[tokio::test]
    async fn test_prune_drops_finished_keys() {
        let queue = KeyQueue::new();
        for i in 0..PRUNE_THRESHOLD {
            let turn = queue.enqueue(&ProductKey::new(format!("p{i}")));
            drop(turn.wait().await);
        }
        let _turn = queue.enqueue(&ProductKey::from("fresh"));
        assert_eq!(queue.tails.lock().unwrap().len(), 1);
    }
}
