use std::fmt::{self, Debug};

use reqwest::Url;

use crate::Error;

/// How requests to the backend are authenticated.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Auth {
    /// `Authorization: Bearer <key>`.
    Bearer(String),
    /// A custom header, e.g. Azure's `api-key`.
    Header {
        /// The header name.
        name: String,
        /// The header value.
        value: String,
    },
    /// No authentication, for local backends.
    None,
}

impl Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Auth::Header { name, .. } => f
                .debug_struct("Header")
                .field("name", name)
                .field("value", &"<redacted>")
                .finish(),
            Auth::None => f.write_str("None"),
        }
    }
}

/// How the chat-completions URL and request body are framed.
///
/// Variants differ only in URL construction and whether the model id
/// travels in the body; fragment extraction is shared.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// `{base_url}/chat/completions`, model id in the request body.
    OpenAiCompatible {
        /// Base URL, e.g. `https://api.openai.com/v1`.
        base_url: String,
        /// The model id to request.
        model: String,
    },
    /// `{endpoint}/openai/deployments/{deployment}/chat/completions`
    /// with an `api-version` query parameter; the deployment implies
    /// the model, so the body carries none.
    AzureDeployment {
        /// The resource endpoint, e.g. `https://{res}.openai.azure.com`.
        endpoint: String,
        /// The deployment name.
        deployment: String,
        /// The API version query value.
        api_version: String,
    },
}

impl Route {
    /// The model id sent in the request body, if this route uses one.
    #[inline]
    pub(crate) fn body_model(&self) -> Option<&str> {
        match self {
            Route::OpenAiCompatible { model, .. } => Some(model),
            Route::AzureDeployment { .. } => None,
        }
    }

    /// Builds the request URL for this route.
    pub(crate) fn request_url(&self) -> Result<Url, Error> {
        let url = match self {
            Route::OpenAiCompatible { base_url, .. } => {
                let base = base_url.trim_end_matches('/');
                Url::parse(&format!("{base}/chat/completions"))
                    .map_err(|err| Error::config(format!("invalid base URL {base:?}: {err}")))?
            }
            Route::AzureDeployment {
                endpoint,
                deployment,
                api_version,
            } => {
                let base = endpoint.trim_end_matches('/');
                let mut url = Url::parse(base).map_err(|err| {
                    Error::config(format!("invalid endpoint {base:?}: {err}"))
                })?;
                url.path_segments_mut()
                    .map_err(|()| {
                        Error::config(format!("endpoint {base:?} cannot be a base"))
                    })?
                    .extend(["openai", "deployments", deployment, "chat", "completions"]);
                url.query_pairs_mut()
                    .append_pair("api-version", api_version);
                url
            }
        };
        Ok(url)
    }
}

/// Configuration for one HTTP chat adapter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AdapterConfig {
    pub(crate) name: String,
    pub(crate) route: Route,
    pub(crate) auth: Auth,
}

impl AdapterConfig {
    /// Creates a configuration from explicit parts.
    #[inline]
    pub fn new<S: Into<String>>(name: S, route: Route, auth: Auth) -> Self {
        Self {
            name: name.into(),
            route,
            auth,
        }
    }

    /// Preset for the OpenAI API.
    pub fn openai<K: Into<String>, M: Into<String>>(api_key: K, model: M) -> Self {
        Self::new(
            "openai",
            Route::OpenAiCompatible {
                base_url: "https://api.openai.com/v1".to_owned(),
                model: model.into(),
            },
            Auth::Bearer(api_key.into()),
        )
    }

    /// Preset for the DeepSeek API.
    pub fn deepseek<K: Into<String>, M: Into<String>>(api_key: K, model: M) -> Self {
        Self::new(
            "deepseek",
            Route::OpenAiCompatible {
                base_url: "https://api.deepseek.com/v1".to_owned(),
                model: model.into(),
            },
            Auth::Bearer(api_key.into()),
        )
    }

    /// Preset for a local LM Studio server.
    pub fn lmstudio<M: Into<String>>(model: M) -> Self {
        Self::new(
            "lmstudio",
            Route::OpenAiCompatible {
                base_url: "http://localhost:1234/v1".to_owned(),
                model: model.into(),
            },
            Auth::None,
        )
    }

    /// Preset for a local Ollama server.
    pub fn ollama<M: Into<String>>(model: M) -> Self {
        Self::new(
            "ollama",
            Route::OpenAiCompatible {
                base_url: "http://localhost:11434/v1".to_owned(),
                model: model.into(),
            },
            Auth::None,
        )
    }

    /// Preset for an Azure OpenAI deployment.
    pub fn azure<E, D, K, V>(endpoint: E, deployment: D, api_key: K, api_version: V) -> Self
    where
        E: Into<String>,
        D: Into<String>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            "azure",
            Route::AzureDeployment {
                endpoint: endpoint.into(),
                deployment: deployment.into(),
                api_version: api_version.into(),
            },
            Auth::Header {
                name: "api-key".to_owned(),
                value: api_key.into(),
            },
        )
    }

    /// The base URL of an OpenAI-compatible route, if this
    /// configuration has one.
    pub fn base_url(&self) -> Option<&str> {
        match &self.route {
            Route::OpenAiCompatible { base_url, .. } => Some(base_url),
            Route::AzureDeployment { .. } => None,
        }
    }

    /// Overrides the base URL of an OpenAI-compatible route.
    ///
    /// No-op for deployment-routed configurations.
    pub fn with_base_url<S: Into<String>>(mut self, url: S) -> Self {
        if let Route::OpenAiCompatible { base_url, .. } = &mut self.route {
            *base_url = url.into();
        }
        self
    }
}
