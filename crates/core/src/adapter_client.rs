use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use crosstalk_model::{
    AdapterError, ChatMessage, ErrorKind, ModelAdapter, ReplyStream,
    SendOptions,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

type SendMessageResult = Result<TurnOutcome, Box<dyn AdapterError>>;
type BoxedSendMessageFuture =
    Pin<Box<dyn Future<Output = SendMessageResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(Vec<ChatMessage>, SendOptions, Box<dyn Fn(&str) + Send + 'static>)
        -> BoxedSendMessageFuture + Send + Sync
>;

/// The result of driving one model reply to its end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply completed; carries the accumulated raw text.
    Completed(String),
    /// The cancellation token fired before the reply completed.
    ///
    /// Whatever fragments were already forwarded are discarded by the
    /// caller; a cancelled turn commits nothing.
    Cancelled,
}

/// A wrapper around a model adapter that drives its reply streams and
/// provides a type-erased interface for the other modules.
#[derive(Clone)]
pub struct AdapterClient {
    name: Arc<str>,
    handler_fn: HandlerFn,
}

impl AdapterClient {
    /// Wraps the given adapter.
    pub fn new<A: ModelAdapter + 'static>(adapter: A) -> Self {
        let name = Arc::from(adapter.name());
        // We have to erase the type `A`, since `AdapterClient` doesn't
        // have a generic parameter and we don't want it either.
        let handler_fn: HandlerFn =
            Arc::new(move |messages, options, on_fragment| {
                let fut = adapter.send_message(&messages, &options);
                let cancel = options.cancel.clone();
                Box::pin(
                    async move {
                        trace!("sending {} messages", messages.len());
                        let stream_or_err = tokio::select! {
                            () = cancel.cancelled() => {
                                return Ok(TurnOutcome::Cancelled);
                            }
                            stream_or_err = fut => stream_or_err,
                        };
                        drive_reply::<A>(stream_or_err, cancel, on_fragment)
                            .await
                    }
                    .instrument(trace_span!("adapter client req")),
                )
            });
        Self { name, handler_fn }
    }

    /// The name of the wrapped adapter.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends a message history and drives the reply to its end,
    /// forwarding each fragment to `on_fragment` as it arrives.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Triggering the token in `options`
    /// resolves the call with [`TurnOutcome::Cancelled`] instead of an
    /// error, and no further fragments are forwarded.
    #[inline]
    pub async fn send_message(
        &self,
        messages: Vec<ChatMessage>,
        options: SendOptions,
        on_fragment: impl Fn(&str) + Send + 'static,
    ) -> SendMessageResult {
        (self.handler_fn)(messages, options, Box::new(on_fragment)).await
    }
}

async fn drive_reply<A: ModelAdapter + 'static>(
    stream_or_err: Result<A::Stream, A::Error>,
    cancel: CancellationToken,
    on_fragment: Box<dyn Fn(&str) + Send + 'static>,
) -> SendMessageResult {
    let stream = match stream_or_err {
        Ok(stream) => stream,
        Err(err) => {
            if err.kind() == ErrorKind::Cancelled {
                return Ok(TurnOutcome::Cancelled);
            }
            error!("request failed: {err}");
            return Err(Box::new(err));
        }
    };

    trace!("start receiving fragments");

    let mut text = String::new();
    let mut pinned_stream = pin!(stream);
    loop {
        let fragment_or_err = tokio::select! {
            () = cancel.cancelled() => return Ok(TurnOutcome::Cancelled),
            fragment_or_err =
                poll_fn(|cx| pinned_stream.as_mut().poll_next_fragment(cx)) =>
            {
                fragment_or_err
            }
        };
        let fragment = match fragment_or_err {
            Ok(fragment) => fragment,
            Err(err) => {
                if err.kind() == ErrorKind::Cancelled {
                    return Ok(TurnOutcome::Cancelled);
                }
                error!("reply stream failed: {err}");
                return Err(Box::new(err));
            }
        };
        let Some(fragment) = fragment else {
            break;
        };
        text.push_str(&fragment);
        on_fragment(&fragment);
    }

    // The token may have fired between the last fragment and the end
    // of the stream; an end reached that way is still a cancellation.
    if cancel.is_cancelled() {
        return Ok(TurnOutcome::Cancelled);
    }

    trace!("finished a reply");

    Ok(TurnOutcome::Completed(text))
}
