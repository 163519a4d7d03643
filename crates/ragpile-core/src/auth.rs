//! Login completion plumbing.
//!
//! Two pieces connect an external login flow back to the code waiting on it:
//!
//! - [`CallbackRegistry`]: handlers for widget-style logins (Telegram). A
//!   handler stays registered while its [`Registration`] guard is alive.
//! - [`oauth_channel`]: a one-shot channel for redirect-style logins
//!   (Google). The flow posts exactly one message; the waiting side receives it.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::oneshot;
use url::Url;

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Handlers<T> {
    next_id: u64,
    live: BTreeMap<u64, Handler<T>>,
}

/// Registry of payload handlers. Clones share the same set of handlers.
pub struct CallbackRegistry<T> {
    inner: Arc<Mutex<Handlers<T>>>,
}

impl<T> Clone for CallbackRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CallbackRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Handlers {
                next_id: 0,
                live: BTreeMap::new(),
            })),
        }
    }

    /// Register `handler` until the returned guard is dropped.
    #[must_use = "dropping the registration removes the handler"]
    pub fn register(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Registration<T>
    where
        T: 'static,
    {
        let mut handlers = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = handlers.next_id;
        handlers.next_id += 1;
        handlers.live.insert(id, Arc::new(handler));
        Registration {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Call every live handler with `payload`. Returns how many ran.
    ///
    /// Handlers run outside the lock, so one may register or drop guards.
    pub fn emit(&self, payload: &T) -> usize {
        let handlers: Vec<Handler<T>> = {
            let handlers = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            handlers.live.values().cloned().collect()
        };
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .live
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps one handler registered. Deregisters on drop.
pub struct Registration<T> {
    id: u64,
    registry: Weak<Mutex<Handlers<T>>>,
}

impl<T> Drop for Registration<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .live
                .remove(&self.id);
        }
    }
}

/// Create a one-shot channel for a single login result.
pub fn oauth_channel<T>() -> (OAuthSender<T>, OAuthListener<T>) {
    let (tx, rx) = oneshot::channel();
    (OAuthSender { tx }, OAuthListener { rx })
}

pub struct OAuthSender<T> {
    tx: oneshot::Sender<T>,
}

impl<T> OAuthSender<T> {
    /// Deliver the result. Fails with [`Error::ChannelClosed`] when the
    /// listener has already been dropped.
    pub fn post(self, message: T) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::ChannelClosed)
    }
}

pub struct OAuthListener<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> OAuthListener<T> {
    /// Wait for the posted result.
    pub async fn recv(self) -> Result<T> {
        self.rx.await.map_err(|_| Error::ChannelClosed)
    }
}

/// Pull the authorization code out of a pasted value.
///
/// Accepts either the bare code or the full redirect URL carrying `?code=`.
pub fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
            .filter(|code| !code.is_empty()),
        Err(_) => Some(input.to_string()),
    }
}
