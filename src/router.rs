//! Fan-out of unsolicited events to method-name subscribers.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::{trace, warn};

pub(crate) struct EventRouter {
    inner: Mutex<RouterInner>,
}

struct RouterInner {
    topics: HashMap<String, Vec<Subscriber>>,
    next_token: u64,
    closed: bool,
}

struct Subscriber {
    token: u64,
    tx: mpsc::UnboundedSender<Value>,
}

impl EventRouter {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RouterInner {
                topics: HashMap::new(),
                next_token: 0,
                closed: false,
            }),
        }
    }

    pub(crate) fn subscribe(self: Arc<Self>, method: &str) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = match self.inner.lock() {
            Ok(mut inner) if !inner.closed => {
                let token = inner.next_token;
                inner.next_token += 1;
                inner
                    .topics
                    .entry(method.to_owned())
                    .or_default()
                    .push(Subscriber { token, tx });
                Some(token)
            }
            // Closed or poisoned: tx drops here, so the stream ends at once.
            _ => None,
        };
        let registration = token.map(|token| Registration {
            router: self,
            method: method.to_owned(),
            token,
        });
        EventStream { rx, registration }
    }

    pub(crate) fn publish(&self, method: &str, params: Value) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let Some(subscribers) = inner.topics.get_mut(method) else {
            trace!(method, "event has no subscribers, dropping");
            return;
        };
        // Dead receivers are pruned, never an error for the rest.
        subscribers.retain(|subscriber| subscriber.tx.send(params.clone()).is_ok());
        if subscribers.is_empty() {
            inner.topics.remove(method);
        }
    }

    fn unsubscribe(&self, method: &str, token: u64) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if let Some(subscribers) = inner.topics.get_mut(method) {
            subscribers.retain(|subscriber| subscriber.token != token);
            if subscribers.is_empty() {
                inner.topics.remove(method);
            }
        }
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
            inner.topics.clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.topics.get(method).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

struct Registration {
    router: Arc<EventRouter>,
    method: String,
    token: u64,
}

/// A live subscription yielding the raw `params` of every matching event.
/// Dropping the stream removes the subscription from the router.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Value>,
    registration: Option<Registration>,
}

impl Stream for EventStream {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration
                .router
                .unsubscribe(&registration.method, registration.token);
        }
    }
}

/// Typed view over an [`EventStream`]: each payload is deserialized into `T`.
/// Payloads that do not decode are logged and skipped, never surfaced as
/// errors or stream termination.
pub struct TypedEvents<T> {
    inner: EventStream,
    method: String,
    _marker: PhantomData<T>,
}

impl<T> TypedEvents<T> {
    pub(crate) fn new(inner: EventStream, method: &str) -> Self {
        Self {
            inner,
            method: method.to_owned(),
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned + Unpin> Stream for TypedEvents<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(params)) => match serde_json::from_value::<T>(params) {
                    Ok(event) => return Poll::Ready(Some(event)),
                    Err(error) => {
                        // Shape mismatch on one event, keep polling for the next.
                        warn!(method = %self.method, %error, "skipping undecodable event payload");
                        continue;
                    }
                },
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
