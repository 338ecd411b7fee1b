use std::pin::Pin;
use std::task::{self, Poll};

use tokio_util::sync::CancellationToken;

use crate::error::AdapterError;
use crate::message::ChatMessage;

/// Options for a single [`ModelAdapter::send_message`] call.
#[derive(Clone, Debug, Default)]
pub struct SendOptions {
    /// Whether the backend should stream its reply incrementally.
    ///
    /// When disabled, the reply stream yields the complete text as a
    /// single fragment.
    pub stream: bool,
    /// The one-shot signal that abandons this call when triggered.
    ///
    /// Once the token has fired it is permanently inert; callers must
    /// create a fresh token for any later call.
    pub cancel: CancellationToken,
}

impl SendOptions {
    /// Creates options for a streaming call.
    #[inline]
    pub fn streaming(cancel: CancellationToken) -> Self {
        Self {
            stream: true,
            cancel,
        }
    }

    /// Creates options for a buffered (non-streaming) call.
    #[inline]
    pub fn buffered(cancel: CancellationToken) -> Self {
        Self {
            stream: false,
            cancel,
        }
    }
}

/// A lazy, finite sequence of text fragments from one model reply.
pub trait ReplyStream: Sized + Send + 'static {
    /// The error type that may be returned by the stream.
    type Error: AdapterError;

    /// Attempts to pull out the next text fragment from the reply.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct stream state:
    ///
    /// - `Poll::Pending` means that the next fragment is not ready
    ///   yet. Implementations will ensure that the current task is
    ///   notified when it may be.
    /// - `Poll::Ready(Ok(Some(fragment)))` delivers a fragment, and
    ///   the stream may produce further fragments on subsequent calls.
    /// - `Poll::Ready(Ok(None))` means the stream has ended. This is
    ///   also returned, without an error, when the transport signals
    ///   end-of-stream or the cancellation token has fired; fragments
    ///   already yielded are not retracted.
    /// - `Poll::Ready(Err(error))` means the stream has failed.
    ///
    /// Calling this method after completion should always return
    /// `None`.
    fn poll_next_fragment(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>>;
}

/// A type that represents one configured chat backend.
///
/// Once the adapter is created, it should behave like a stateless
/// object. It can still have internal state, but callers should not
/// rely on it, and the adapter should be prepared for being dropped
/// anytime. The adapter contract does not guarantee reentrancy: one
/// in-flight request per adapter at a time.
pub trait ModelAdapter: Send + Sync {
    /// The error type that may be returned by the adapter.
    type Error: AdapterError;

    /// The reply stream type for this adapter.
    type Stream: ReplyStream<Error = Self::Error>;

    /// A short identifier for the underlying model, for status lines.
    fn name(&self) -> &str;

    /// Sends a chat message history to the backend.
    ///
    /// Fails with an error of kind [`ErrorKind::Request`] when the
    /// backend responds with a non-success status.
    ///
    /// [`ErrorKind::Request`]: crate::ErrorKind::Request
    fn send_message(
        &self,
        messages: &[ChatMessage],
        options: &SendOptions,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_options() {
        let cancel = CancellationToken::new();
        let options = SendOptions::streaming(cancel.clone());
        assert!(options.stream);
        let options = SendOptions::buffered(cancel.clone());
        assert!(!options.stream);

        // Clones observe the same token.
        cancel.cancel();
        assert!(options.cancel.is_cancelled());
    }
}
