use std::pin::Pin;
use std::task::{Context, Poll, ready};

use crosstalk_model::{ErrorKind, ReplyStream};
use pin_project_lite::pin_project;
use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::io::Sse;
use crate::proto::ChatCompletionChunk;

struct PartialState {
    sse: Sse,
    cancel: CancellationToken,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextFragment = Result<(Option<String>, PartialState), Error>;

pin_project! {
    /// The reply from an HTTP chat backend.
    ///
    /// Streaming replies pull fragments out of an SSE body; buffered
    /// replies hold the complete text and yield it as one fragment.
    #[project = ReplyProj]
    pub enum Reply {
        Streaming { next_fragment_fut: Option<PinnedFuture<NextFragment>> },
        Buffered { text: Option<String> },
    }
}

impl Reply {
    #[inline]
    pub(crate) fn from_sse(sse: Sse, cancel: CancellationToken) -> Self {
        let partial_state = PartialState { sse, cancel };
        let next_fragment_fut = async move { next_fragment(partial_state).await };
        Reply::Streaming {
            next_fragment_fut: Some(Box::pin(next_fragment_fut)),
        }
    }

    #[inline]
    pub(crate) fn from_text(text: String) -> Self {
        Reply::Buffered {
            text: (!text.is_empty()).then_some(text),
        }
    }
}

impl ReplyStream for Reply {
    type Error = Error;

    fn poll_next_fragment(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        let next_fragment_fut = match self.project() {
            ReplyProj::Buffered { text } => {
                return Poll::Ready(Ok(text.take()));
            }
            ReplyProj::Streaming { next_fragment_fut } => next_fragment_fut,
        };
        let Some(fut) = next_fragment_fut else {
            // The stream has been exhausted.
            return Poll::Ready(Ok(None));
        };
        let (fragment, partial_state) = match ready!(fut.as_mut().poll(cx)) {
            Ok((Some(fragment), partial_state)) => (fragment, partial_state),
            Ok((None, _)) => {
                *next_fragment_fut = None;
                return Poll::Ready(Ok(None));
            }
            Err(err) => {
                *next_fragment_fut = None;
                return Poll::Ready(Err(err));
            }
        };

        // The body may still have more data to pull, create a new
        // future for the next fragment.
        let fut = async move { next_fragment(partial_state).await };
        *next_fragment_fut = Some(Box::pin(fut));

        Poll::Ready(Ok(Some(fragment)))
    }
}

async fn next_fragment(mut partial_state: PartialState) -> NextFragment {
    loop {
        if partial_state.cancel.is_cancelled() {
            // Already-yielded fragments stand; just stop producing.
            return Ok((None, partial_state));
        }

        let data = match partial_state.sse.next_data().await {
            Ok(Some(data)) => data,
            Ok(None) => return Ok((None, partial_state)),
            Err(err) => {
                let kind = if partial_state.cancel.is_cancelled() {
                    ErrorKind::Cancelled
                } else {
                    ErrorKind::Other
                };
                return Err(Error::new(format!("stream failed: {err:?}"), kind));
            }
        };
        trace!("got sse data: {data}");

        // Malformed frames are skipped, not fatal.
        let chunk = match serde_json::from_str::<ChatCompletionChunk>(&data) {
            Ok(chunk) => chunk,
            Err(err) => {
                trace!("skipping malformed stream frame: {err}");
                continue;
            }
        };

        let content = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content);
        match content {
            Some(content) if !content.is_empty() => {
                return Ok((Some(content), partial_state));
            }
            _ => continue,
        }
    }
}
