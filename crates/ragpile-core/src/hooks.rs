//! Request state hooks.
//!
//! A hook wraps an asynchronous producer and owns a small observable state:
//! [`UseApi`] tracks `{data, loading}` for one-shot calls, [`UseStreamingApi`]
//! accumulates streamed text deltas. State changes are published through a
//! [`tokio::sync::watch`] channel so a view can re-render on every change.
//!
//! Invocations are not serialized. Starting a second call while one is in
//! flight is allowed; the last call to resolve wins `data`.

use futures_util::stream::{Stream, StreamExt};
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::watch;

/// State of a one-shot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestState<T> {
    pub data: Option<T>,
    pub loading: bool,
}

/// State of a streaming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    pub text: String,
    pub loading: bool,
}

trait Loading {
    fn set_loading(&mut self, loading: bool);
}

impl<T> Loading for RequestState<T> {
    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }
}

impl Loading for StreamState {
    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }
}

/// Holds `loading = true` for as long as it lives.
///
/// Released on drop, so success, failure, panic and cancellation of the
/// invocation future all clear the flag.
struct LoadingGuard<S: Loading> {
    state: Arc<watch::Sender<S>>,
}

impl<S: Loading> LoadingGuard<S> {
    fn begin(state: &Arc<watch::Sender<S>>) -> Self {
        state.send_modify(|s| s.set_loading(true));
        Self {
            state: Arc::clone(state),
        }
    }
}

impl<S: Loading> Drop for LoadingGuard<S> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.set_loading(false));
    }
}

/// One-shot request hook.
///
/// ```
/// use ragpile_core::hooks::UseApi;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let hook = UseApi::new(|| async { Ok::<_, std::io::Error>(42) });
/// let pending = hook.call();
/// assert!(hook.loading());
/// assert_eq!(pending.await.unwrap(), 42);
/// assert_eq!(hook.data(), Some(42));
/// assert!(!hook.loading());
/// # }
/// ```
pub struct UseApi<F, T> {
    f: F,
    state: Arc<watch::Sender<RequestState<T>>>,
}

impl<F, T> UseApi<F, T> {
    pub fn new(f: F) -> Self {
        Self::with_loading(f, false)
    }

    /// Create a hook whose `loading` starts out set, for views that fetch on mount.
    pub fn with_loading(f: F, start_loading: bool) -> Self {
        let (state, _) = watch::channel(RequestState {
            data: None,
            loading: start_loading,
        });
        Self {
            f,
            state: Arc::new(state),
        }
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Replace `data` locally without calling the producer.
    pub fn set_data(&self, data: Option<T>) {
        self.state.send_modify(|s| s.data = data);
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.state.subscribe()
    }
}

impl<F, T: Clone> UseApi<F, T> {
    pub fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }

    pub fn snapshot(&self) -> RequestState<T> {
        self.state.borrow().clone()
    }

    /// Invoke the producer.
    ///
    /// `loading` is set before this returns, i.e. before the returned future
    /// is first polled.
    pub fn call<Fut, E>(&self) -> impl Future<Output = Result<T, E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = LoadingGuard::begin(&self.state);
        let pending = (self.f)();
        settle(guard, pending)
    }

    /// Invoke a producer that takes arguments, forwarding `args` to it.
    pub fn call_with<A, Fut, E>(&self, args: A) -> impl Future<Output = Result<T, E>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = LoadingGuard::begin(&self.state);
        let pending = (self.f)(args);
        settle(guard, pending)
    }
}

async fn settle<T, E, Fut>(guard: LoadingGuard<RequestState<T>>, pending: Fut) -> Result<T, E>
where
    T: Clone,
    Fut: Future<Output = Result<T, E>>,
{
    let result = pending.await;
    if let Ok(data) = &result {
        guard.state.send_modify(|s| s.data = Some(data.clone()));
    }
    drop(guard);
    result
}

/// Streaming request hook: appends every delta of the produced stream to `text`.
pub struct UseStreamingApi<F> {
    f: F,
    state: Arc<watch::Sender<StreamState>>,
}

impl<F> UseStreamingApi<F> {
    pub fn new(f: F) -> Self {
        let (state, _) = watch::channel(StreamState::default());
        Self {
            f,
            state: Arc::new(state),
        }
    }

    /// Text accumulated so far by the current (or last) invocation.
    pub fn text(&self) -> String {
        self.state.borrow().text.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn snapshot(&self) -> StreamState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    /// Start a stream for `input` and drain it into the accumulated text.
    ///
    /// The text is cleared and `loading` set before this returns. On a
    /// mid-stream failure the partial text is kept and the error returned.
    pub fn call<S, E>(&self, input: impl Into<String>) -> impl Future<Output = Result<(), E>>
    where
        F: Fn(String) -> S,
        S: Stream<Item = Result<String, E>>,
    {
        self.state.send_modify(|s| s.text.clear());
        let guard = LoadingGuard::begin(&self.state);
        let deltas = (self.f)(input.into());
        async move {
            let mut deltas = pin!(deltas);
            while let Some(delta) = deltas.next().await {
                let delta = delta?;
                guard.state.send_modify(|s| s.text.push_str(&delta));
            }
            drop(guard);
            Ok::<(), E>(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_loading_brackets_successful_call() {
        let hook = UseApi::new(|| async { Ok::<_, String>("threads".to_string()) });
        assert!(!hook.loading());
        assert_eq!(hook.data(), None);

        let pending = hook.call();
        assert!(hook.loading());
        assert_eq!(hook.data(), None);

        assert_eq!(pending.await.unwrap(), "threads");
        assert_eq!(
            hook.snapshot(),
            RequestState {
                data: Some("threads".to_string()),
                loading: false,
            }
        );
    }

    #[tokio::test]
    async fn test_failure_releases_loading_and_keeps_data() {
        let hook: UseApi<_, u32> = UseApi::new(|fail: bool| async move {
            if fail { Err("boom") } else { Ok(7) }
        });
        hook.call_with(false).await.unwrap();
        assert_eq!(hook.data(), Some(7));

        let err = hook.call_with(true).await.unwrap_err();
        assert_eq!(err, "boom");
        assert!(!hook.loading());
        assert_eq!(hook.data(), Some(7));
    }

    #[tokio::test]
    async fn test_loading_transitions_once_per_call() {
        let hook: UseApi<_, u32> = UseApi::new(|| async { Err::<u32, _>("nope") });
        let mut rx = hook.subscribe();

        let pending = hook.call();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().loading);

        let _ = pending.await;
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().loading);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_dropped_call_releases_loading() {
        let hook: UseApi<_, u32> = UseApi::new(|| std::future::pending::<Result<u32, ()>>());
        let pending = hook.call();
        assert!(hook.loading());
        drop(pending);
        assert!(!hook.loading());
    }

    #[tokio::test]
    async fn test_start_loading_and_set_data() {
        let hook = UseApi::with_loading(|| async { Ok::<_, ()>(vec![1, 2]) }, true);
        assert!(hook.loading());
        hook.call().await.unwrap();
        assert!(!hook.loading());

        hook.set_data(Some(vec![3]));
        assert_eq!(hook.data(), Some(vec![3]));
    }

    #[tokio::test]
    async fn test_latest_resolution_wins() {
        let hook: UseApi<_, u32> = UseApi::new(|rx: oneshot::Receiver<u32>| async move {
            rx.await.map_err(|_| "dropped")
        });
        let (tx_first, rx_first) = oneshot::channel();
        let (tx_second, rx_second) = oneshot::channel();

        let first = hook.call_with(rx_first);
        let second = hook.call_with(rx_second);

        tx_second.send(2).unwrap();
        assert_eq!(second.await.unwrap(), 2);
        assert_eq!(hook.data(), Some(2));

        tx_first.send(1).unwrap();
        assert_eq!(first.await.unwrap(), 1);
        assert_eq!(hook.data(), Some(1));
    }

    #[tokio::test]
    async fn test_streaming_accumulates_in_order() {
        let hook = UseStreamingApi::new(|prompt: String| {
            let deltas: Vec<Result<String, ()>> =
                vec![Ok(prompt), Ok(", ".into()), Ok(String::new()), Ok("world".into())];
            stream::iter(deltas)
        });
        let pending = hook.call("hello");
        assert!(hook.loading());
        pending.await.unwrap();
        assert_eq!(
            hook.snapshot(),
            StreamState {
                text: "hello, world".into(),
                loading: false,
            }
        );
    }

    #[tokio::test]
    async fn test_streaming_failure_keeps_partial_text() {
        let hook = UseStreamingApi::new(|_: String| {
            stream::iter(vec![Ok("partial".to_string()), Err("cut"), Ok("lost".to_string())])
        });
        let err = hook.call("q").await.unwrap_err();
        assert_eq!(err, "cut");
        assert_eq!(hook.text(), "partial");
        assert!(!hook.loading());
    }

    #[tokio::test]
    async fn test_streaming_resets_text_per_invocation() {
        let hook = UseStreamingApi::new(|prompt: String| {
            stream::iter(vec![Ok::<_, ()>(prompt)])
        });
        hook.call("first").await.unwrap();
        assert_eq!(hook.text(), "first");

        let pending = hook.call("second");
        assert_eq!(hook.text(), "");
        pending.await.unwrap();
        assert_eq!(hook.text(), "second");
    }
}
