//! Environment-driven configuration for the two backends.

use std::env;
use std::str::FromStr;

use crosstalk_core::{EngineConfig, StopCondition, SystemPrompts};
use crosstalk_openai_adapter::{AdapterConfig, HttpChatAdapter};
use thiserror::Error;

const DEFAULT_MAX_TURNS: u32 = 8;
const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

/// Errors from assembling a configuration out of the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider name that is not recognized.
    #[error("unsupported provider: {0:?}")]
    UnsupportedProvider(String),
    /// A required environment variable is missing.
    #[error("{0} environment variable is not set")]
    MissingVar(&'static str),
    /// An environment variable holds a value that cannot be used.
    #[error("invalid value for {var}: {value:?}")]
    InvalidVar {
        /// The variable name.
        var: &'static str,
        /// The offending value.
        value: String,
    },
}

/// A chat backend the CLI knows how to configure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    /// The OpenAI API.
    OpenAi,
    /// The DeepSeek API.
    DeepSeek,
    /// A local LM Studio server.
    LmStudio,
    /// A local Ollama server.
    Ollama,
    /// An Azure OpenAI deployment.
    Azure,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "chatgpt" => Ok(Provider::OpenAi),
            "deepseek" => Ok(Provider::DeepSeek),
            "lmstudio" => Ok(Provider::LmStudio),
            "ollama" => Ok(Provider::Ollama),
            "azure" => Ok(Provider::Azure),
            _ => Err(ConfigError::UnsupportedProvider(s.to_owned())),
        }
    }
}

// The environment variable names for one side of the conversation.
struct SideVars {
    provider: &'static str,
    model: &'static str,
    base_url: &'static str,
    prompt: &'static str,
}

const SIDE_A: SideVars = SideVars {
    provider: "CROSSTALK_A_PROVIDER",
    model: "CROSSTALK_A_MODEL",
    base_url: "CROSSTALK_A_BASE_URL",
    prompt: "CROSSTALK_A_PROMPT",
};

const SIDE_B: SideVars = SideVars {
    provider: "CROSSTALK_B_PROVIDER",
    model: "CROSSTALK_B_MODEL",
    base_url: "CROSSTALK_B_BASE_URL",
    prompt: "CROSSTALK_B_PROMPT",
};

/// A fully assembled CLI configuration.
pub struct CliConfig {
    /// The adapter for model A.
    pub model_a: HttpChatAdapter,
    /// The adapter for model B.
    pub model_b: HttpChatAdapter,
    /// The turn engine configuration.
    pub engine: EngineConfig,
    /// The system prompts for the two models.
    pub prompts: SystemPrompts,
    /// Base URLs of configured local backends, worth a reachability
    /// probe before the conversation starts.
    pub local_probe_urls: Vec<String>,
}

/// Reads the whole configuration out of the environment.
///
/// Credentials are checked here, before anything touches the network,
/// so a missing API key fails fast with a pointed message.
pub fn from_env() -> Result<CliConfig, ConfigError> {
    let (model_a, probe_a) =
        adapter_from_env(&SIDE_A, Provider::OpenAi, "gpt-4.1")?;
    let (model_b, probe_b) =
        adapter_from_env(&SIDE_B, Provider::LmStudio, "local-model")?;
    let local_probe_urls = [probe_a, probe_b].into_iter().flatten().collect();
    Ok(CliConfig {
        model_a,
        model_b,
        engine: engine_from_env()?,
        prompts: prompts_from_env(),
        local_probe_urls,
    })
}

fn adapter_from_env(
    side: &SideVars,
    default_provider: Provider,
    default_model: &str,
) -> Result<(HttpChatAdapter, Option<String>), ConfigError> {
    let provider = match env::var(side.provider) {
        Ok(value) => value.parse()?,
        Err(_) => default_provider,
    };
    let model = env::var(side.model)
        .unwrap_or_else(|_| default_model.to_owned());

    let mut config = match provider {
        Provider::OpenAi => {
            AdapterConfig::openai(require("OPENAI_API_KEY")?, model)
        }
        Provider::DeepSeek => {
            AdapterConfig::deepseek(require("DEEPSEEK_API_KEY")?, model)
        }
        Provider::LmStudio => AdapterConfig::lmstudio(model),
        Provider::Ollama => AdapterConfig::ollama(model),
        Provider::Azure => {
            let endpoint = require("AZURE_OPENAI_ENDPOINT")?;
            let api_key = require("AZURE_OPENAI_API_KEY")?;
            let api_version = env::var("CROSSTALK_AZURE_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_AZURE_API_VERSION.to_owned());
            // The model setting names the deployment here.
            AdapterConfig::azure(endpoint, model, api_key, api_version)
        }
    };
    if let Ok(base_url) = env::var(side.base_url) {
        config = config.with_base_url(base_url);
    }
    let probe_url = matches!(provider, Provider::LmStudio | Provider::Ollama)
        .then(|| config.base_url().map(str::to_owned))
        .flatten();
    Ok((HttpChatAdapter::new(config), probe_url))
}

fn engine_from_env() -> Result<EngineConfig, ConfigError> {
    let max_turns = match env::var("CROSSTALK_MAX_TURNS") {
        Ok(value) => match value.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(ConfigError::InvalidVar {
                    var: "CROSSTALK_MAX_TURNS",
                    value,
                });
            }
        },
        Err(_) => DEFAULT_MAX_TURNS,
    };
    let stop_condition = match env::var("CROSSTALK_STOP_CONDITION") {
        Ok(value) => parse_stop_condition(&value).ok_or(
            ConfigError::InvalidVar {
                var: "CROSSTALK_STOP_CONDITION",
                value,
            },
        )?,
        Err(_) => StopCondition::MaxTurns,
    };
    Ok(EngineConfig {
        max_turns,
        stop_condition,
    })
}

fn parse_stop_condition(value: &str) -> Option<StopCondition> {
    match value.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
        "maxturns" => Some(StopCondition::MaxTurns),
        "checklistempty" => Some(StopCondition::ChecklistEmpty),
        _ => None,
    }
}

fn prompts_from_env() -> SystemPrompts {
    let shared = env::var("CROSSTALK_SYSTEM_PROMPT").unwrap_or_else(|_| {
        include_str!("./system_prompt.md").trim_end().to_owned()
    });
    let a = env::var(SIDE_A.prompt).unwrap_or_else(|_| shared.clone());
    let b = env::var(SIDE_B.prompt).unwrap_or_else(|_| shared);
    SystemPrompts::new(a, b)
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::MissingVar(var))
}
