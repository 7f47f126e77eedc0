//! Server-Sent Events plumbing.
//!
//! Turns relay [`Subscription`]s into SSE response bodies. Each relay event
//! becomes one `data: <json>` frame.

mod stream;

pub use stream::{into_sse, EventStream};
