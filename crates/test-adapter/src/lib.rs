//! A local fake adapter for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use crosstalk_model::{
    AdapterError, ChatMessage, ErrorKind, ModelAdapter, ReplyStream,
    SendOptions,
};
use tokio::time::{Sleep, sleep};
use tokio_util::sync::CancellationToken;

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl AdapterError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Debug)]
pub struct ScriptedReplyStream {
    fragments: VecDeque<String>,
    cancel: CancellationToken,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ReplyStream for ScriptedReplyStream {
    type Error = crate::Error;

    fn poll_next_fragment(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        let this = self.get_mut();

        if this.cancel.is_cancelled() {
            return Poll::Ready(Ok(None));
        }
        if this.fragments.is_empty() {
            return Poll::Ready(Ok(None));
        }

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.fragments.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_fragment(cx)
    }
}

/// A local fake adapter for testing purpose.
///
/// Before sending requests, you need to set up the reply script.
/// Requests consume the scripted replies in order; once the script is
/// exhausted, further requests fail.
///
/// Fragments are paced with a short delay so in-flight requests can
/// observe cancellation mid-stream.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy
/// memory copies involved. You should only use it for testing.
#[derive(Clone)]
pub struct ScriptedAdapter {
    name: String,
    replies: Arc<Mutex<VecDeque<PresetReply>>>,
    delay: Duration,
}

impl ScriptedAdapter {
    /// Creates an adapter with an empty reply script.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            delay: Duration::from_millis(1),
        }
    }

    /// Appends a reply to the script.
    #[inline]
    pub fn add_reply(&self, reply: PresetReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Sets the delay between streamed fragments.
    #[inline]
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Returns the number of scripted replies not yet consumed.
    #[inline]
    pub fn remaining_replies(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

impl ModelAdapter for ScriptedAdapter {
    type Error = crate::Error;
    type Stream = ScriptedReplyStream;

    fn name(&self) -> &str {
        &self.name
    }

    fn send_message(
        &self,
        _messages: &[ChatMessage],
        options: &SendOptions,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static
    {
        let reply = self.replies.lock().unwrap().pop_front();
        let result = match reply {
            None => Err(Error {
                message: format!("{}: reply script exhausted", self.name),
                kind: ErrorKind::Other,
            }),
            Some(PresetReply {
                failure: Some(message),
                ..
            }) => Err(Error {
                message,
                kind: ErrorKind::Request,
            }),
            Some(reply) => Ok(ScriptedReplyStream {
                fragments: reply.fragments.into(),
                cancel: options.cancel.clone(),
                delay: self.delay,
                sleep: None,
            }),
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use super::*;

    async fn collect(stream: ScriptedReplyStream) -> String {
        let mut stream = pin!(stream);
        let mut text = String::new();
        loop {
            let fragment = poll_fn(|cx| stream.as_mut().poll_next_fragment(cx))
                .await
                .unwrap();
            let Some(fragment) = fragment else {
                break;
            };
            text.push_str(&fragment);
        }
        text
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let adapter = ScriptedAdapter::new("fake");
        adapter.add_reply(PresetReply::with_fragments(["Hello, ", "world!"]));
        adapter.add_reply(PresetReply::with_fragments(["Bye."]));

        let options = SendOptions::streaming(CancellationToken::new());
        let stream = adapter.send_message(&[], &options).await.unwrap();
        assert_eq!(collect(stream).await, "Hello, world!");

        let stream = adapter.send_message(&[], &options).await.unwrap();
        assert_eq!(collect(stream).await, "Bye.");
        assert_eq!(adapter.remaining_replies(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_script_fails() {
        let adapter = ScriptedAdapter::new("fake");
        let options = SendOptions::streaming(CancellationToken::new());
        let err = adapter.send_message(&[], &options).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_failing_reply() {
        let adapter = ScriptedAdapter::new("fake");
        adapter.add_reply(PresetReply::failing("backend exploded"));
        let options = SendOptions::streaming(CancellationToken::new());
        let err = adapter.send_message(&[], &options).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Request);
        assert!(err.to_string().contains("backend exploded"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_stream() {
        let adapter = ScriptedAdapter::new("fake");
        adapter.add_reply(PresetReply::with_fragments(["one", "two", "three"]));

        let cancel = CancellationToken::new();
        let options = SendOptions::streaming(cancel.clone());
        let stream = adapter.send_message(&[], &options).await.unwrap();

        let mut stream = pin!(stream);
        let first = poll_fn(|cx| stream.as_mut().poll_next_fragment(cx))
            .await
            .unwrap();
        assert_eq!(first.as_deref(), Some("one"));

        cancel.cancel();
        let next = poll_fn(|cx| stream.as_mut().poll_next_fragment(cx))
            .await
            .unwrap();
        assert_eq!(next, None);
    }
}
