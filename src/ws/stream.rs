//! `Stream` adapter over dispatched events.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use pin_project_lite::pin_project;
use tokio::sync::mpsc;

use crate::ws::DispatchedEvent;

pin_project! {
    /// Every event the client emits, in emit order, tagged with its channel name.
    ///
    /// Fed with `try_send`: a consumer that falls behind by more than the
    /// stream capacity misses events. Ends when the client is dropped.
    ///
    /// ```ignore
    /// let mut events = client.events();
    /// while let Some(DispatchedEvent { name, event }) = events.next().await {
    ///     println!("{}: {:?}", name, event);
    /// }
    /// ```
    pub struct EventStream {
        #[pin]
        rx: mpsc::Receiver<DispatchedEvent>,
    }
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::Receiver<DispatchedEvent>) -> Self {
        Self { rx }
    }
}

impl Stream for EventStream {
    type Item = DispatchedEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        this.rx.poll_recv(cx)
    }
}
