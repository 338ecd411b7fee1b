//! A model adapter for OpenAI-compatible chat backends.
//!
//! One shared streaming-request routine serves every provider variant;
//! variants differ only in URL construction ([`Route`]), auth header
//! shape ([`Auth`]) and request body framing.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use crosstalk_model::{
    AdapterError, ChatMessage, ErrorKind, ModelAdapter, SendOptions,
};
use mime::Mime;
use reqwest::{Client, header};

pub use config::{AdapterConfig, Auth, Route};
use io::{Chunks, Sse};
pub use response::Reply;

/// Error type for [`HttpChatAdapter`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
    status: Option<u16>,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            status: None,
        }
    }

    fn config(message: impl Into<String>) -> Self {
        Self::new(message, ErrorKind::Config)
    }

    fn request(name: &str, status: u16, body: String) -> Self {
        let suffix = if body.is_empty() {
            String::new()
        } else {
            format!("\n\n{body}")
        };
        Self {
            message: format!("{name} request failed: {status}{suffix}"),
            kind: ErrorKind::Request,
            status: Some(status),
        }
    }

    /// Returns the error message, including the response body for
    /// request errors.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl AdapterError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    fn status(&self) -> Option<u16> {
        self.status
    }
}

/// A chat adapter speaking the OpenAI-compatible wire protocol.
#[derive(Clone, Debug)]
pub struct HttpChatAdapter {
    client: Client,
    config: Arc<AdapterConfig>,
}

impl HttpChatAdapter {
    /// Creates a new `HttpChatAdapter` with the given configuration.
    #[inline]
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ModelAdapter for HttpChatAdapter {
    type Error = Error;
    type Stream = Reply;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn send_message(
        &self,
        messages: &[ChatMessage],
        options: &SendOptions,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static
    {
        let stream = options.stream;
        let cancel = options.cancel.clone();
        let name = self.config.name.clone();

        // URL and auth problems surface before any network call.
        let resp_fut = self.config.route.request_url().map(|url| {
            let body = proto::ChatCompletionRequest {
                model: self.config.route.body_model(),
                messages,
                stream,
            };
            let mut builder = self
                .client
                .post(url)
                .header(header::CONTENT_TYPE, "application/json")
                .json(&body);
            if stream {
                builder = builder.header(header::ACCEPT, "text/event-stream");
            }
            builder = match &self.config.auth {
                Auth::Bearer(api_key) => builder
                    .header(header::AUTHORIZATION, format!("Bearer {api_key}")),
                Auth::Header { name, value } => {
                    builder.header(name.clone(), value.clone())
                }
                Auth::None => builder,
            };
            builder.send()
        });

        async move {
            let resp = match resp_fut?.await {
                Ok(resp) => resp,
                Err(err) => {
                    let kind = if cancel.is_cancelled() {
                        ErrorKind::Cancelled
                    } else {
                        ErrorKind::Other
                    };
                    return Err(Error::new(
                        format!("{name} request failed: {err}"),
                        kind,
                    ));
                }
            };

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::request(&name, status.as_u16(), body));
            }

            if !stream {
                let completion: proto::ChatCompletion =
                    resp.json().await.map_err(|err| {
                        Error::new(
                            format!("{name} returned a malformed body: {err}"),
                            ErrorKind::Other,
                        )
                    })?;
                let text = completion
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .unwrap_or_default();
                return Ok(Reply::from_text(text));
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(true);
            if !is_event_stream {
                return Err(Error::new(
                    format!("unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            let chunks = Chunks::from_response(resp);
            let sse = Sse::new(chunks);
            Ok(Reply::from_sse(sse, cancel))
        }
    }
}

/// Checks whether a backend answers at all at `base_url`.
///
/// A bounded discovery probe for local backends; conversation turns
/// never go through here and are only bounded by cancellation.
pub async fn probe_reachable(base_url: &str, timeout: Duration) -> bool {
    let url = format!("{}/models", base_url.trim_end_matches('/'));
    let request = Client::new().get(url).timeout(timeout).send();
    matches!(request.await, Ok(_))
}
