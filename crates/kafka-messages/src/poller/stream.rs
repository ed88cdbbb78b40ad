use crate::model::StreamEvent;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Events of one poll session, in emission order.
///
/// Dropping the stream cancels the session.
pub struct MessageStream {
    events: ReceiverStream<StreamEvent>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl MessageStream {
    pub(crate) fn new(events: ReceiverStream<StreamEvent>, cancel: CancellationToken) -> Self {
        let _guard = cancel.clone().drop_guard();
        Self {
            events,
            cancel,
            _guard,
        }
    }

    /// Stops the session. Events already buffered can still be read, followed
    /// by a cancellation error.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for MessageStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}
