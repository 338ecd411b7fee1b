use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use crosstalk_model::{
    AdapterError, ChatMessage, ChatRole, ErrorKind, ModelAdapter,
    ReplyStream, SendOptions,
};
use tokio::time::{Sleep, sleep};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct FakeAdapterError(ErrorKind);

impl Display for FakeAdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeAdapterError {}

impl AdapterError for FakeAdapterError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[derive(Debug)]
struct FakeReplyStream {
    fake_items: VecDeque<String>,
    cancel: CancellationToken,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl FakeReplyStream {
    fn new(input: &str, cancel: CancellationToken) -> Self {
        let fake_items = format!("You said {input}")
            .split(" ")
            .map(ToString::to_string)
            .collect();
        Self {
            fake_items,
            cancel,
            sleep: None,
        }
    }
}

impl ReplyStream for FakeReplyStream {
    type Error = FakeAdapterError;

    fn poll_next_fragment(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            return Poll::Ready(Ok(None));
        }
        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if let Some(mut this_item) = this.fake_items.pop_front() {
                let need_space = !this.fake_items.is_empty();
                if need_space {
                    this_item.push(' ');
                }
                return Poll::Ready(Ok(Some(this_item)));
            }

            return Poll::Ready(Ok(None));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_fragment(cx)
    }
}

struct FakeChatAdapter;

impl ModelAdapter for FakeChatAdapter {
    type Error = FakeAdapterError;
    type Stream = FakeReplyStream;

    fn name(&self) -> &str {
        "fake"
    }

    fn send_message(
        &self,
        messages: &[ChatMessage],
        options: &SendOptions,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static
    {
        let result = 'blk: {
            let Some(last_user) = messages
                .iter()
                .rev()
                .find(|msg| msg.role == ChatRole::User)
            else {
                break 'blk Err(FakeAdapterError(ErrorKind::Other));
            };

            Ok(FakeReplyStream::new(
                &last_user.content,
                options.cancel.clone(),
            ))
        };
        ready(result)
    }
}

#[tokio::test]
async fn test_completion() {
    let adapter = FakeChatAdapter;
    let messages = vec![
        ChatMessage::system("Echo things."),
        ChatMessage::user("Good morning"),
    ];
    let options = SendOptions::streaming(CancellationToken::new());
    let mut reply = adapter.send_message(&messages, &options).await.unwrap();

    let mut reply_text = String::new();
    loop {
        let fragment_fut =
            poll_fn(|cx| Pin::new(&mut reply).poll_next_fragment(cx));
        match fragment_fut.await {
            Ok(Some(fragment)) => reply_text.push_str(&fragment),
            Ok(None) => break,
            Err(err) => unreachable!("unexpected error: {err:?}"),
        }
    }

    assert_eq!(reply_text, "You said Good morning");
}

#[tokio::test]
async fn test_error() {
    let adapter = FakeChatAdapter;
    let options = SendOptions::streaming(CancellationToken::new());
    let result = adapter.send_message(&[], &options).await;
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
}

#[tokio::test]
async fn test_cancellation_ends_stream() {
    let adapter = FakeChatAdapter;
    let messages = vec![ChatMessage::user("Good morning")];
    let cancel = CancellationToken::new();
    let options = SendOptions::streaming(cancel.clone());
    let mut reply = adapter.send_message(&messages, &options).await.unwrap();

    let first = poll_fn(|cx| Pin::new(&mut reply).poll_next_fragment(cx))
        .await
        .unwrap();
    assert_eq!(first.as_deref(), Some("You "));

    cancel.cancel();
    let next = poll_fn(|cx| Pin::new(&mut reply).poll_next_fragment(cx))
        .await
        .unwrap();
    assert_eq!(next, None);
}
