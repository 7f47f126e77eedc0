use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use runcast_core::relay::Subscription;

/// Stream of SSE frames backed by a relay subscription.
///
/// Ends when the relay closes the subscription. Dropping it (client
/// disconnect) detaches the subscriber.
pub struct EventStream {
    subscription: Subscription,
}

impl EventStream {
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }
}

impl Stream for EventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .subscription
            .poll_recv(cx)
            .map(|event| event.map(|event| Ok(Event::default().data(event.to_json()))))
    }
}

/// Wrap a subscription into an SSE response, with optional keep-alive
/// comments.
///
/// Keep-alive changes the body stream type, so both variants are erased
/// into a plain [`Response`].
pub fn into_sse(subscription: Subscription, keep_alive: Option<Duration>) -> Response {
    let sse = Sse::new(EventStream::new(subscription));
    match keep_alive {
        Some(interval) => sse
            .keep_alive(KeepAlive::new().interval(interval))
            .into_response(),
        None => sse.into_response(),
    }
}
