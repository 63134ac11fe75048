use crate::core::StreamError;
use crate::providers::ProcessorOptions;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

include!(concat!(env!("OUT_DIR"), "/config_embedded.rs"));

/// File looked up in the working directory by [`Config::load`]
pub const CONFIG_FILE: &str = "config.toml";
/// Prefix of environment variables overriding the config file
pub const ENV_PREFIX: &str = "LLM_STREAM";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub provider: Provider,
    #[serde(default)]
    pub processor: ProcessorOptions,
}

/// Wire protocols with a chunk processor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
pub enum Provider {
    /// Anthropic Messages API
    #[serde(rename = "claude")]
    #[value(name = "claude")]
    Claude,
    /// OpenAI Chat Completions API
    #[serde(rename = "openai")]
    #[value(name = "openai")]
    OpenAI,
    /// OpenAI Responses API
    #[serde(rename = "openai-responses")]
    #[value(name = "openai-responses")]
    OpenAIResponses,
    /// Google GenAI (Gemini) API
    #[serde(rename = "google")]
    #[value(name = "google")]
    Google,
    /// Local MLX generation, a flat token stream
    #[serde(rename = "mlx")]
    #[value(name = "mlx")]
    Mlx,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Claude => "claude",
            Self::OpenAI => "openai",
            Self::OpenAIResponses => "openai-responses",
            Self::Google => "google",
            Self::Mlx => "mlx",
        };
        f.write_str(name)
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("Invalid default config")
    }
}

impl Config {
    /// Loads the embedded defaults, then `config.toml` from the working
    /// directory if present, then `LLM_STREAM_*` environment overrides.
    pub fn load() -> Result<Self, StreamError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, StreamError> {
        Self::build(path, None)
    }

    fn build(
        path: &Path,
        environment: Option<config::Map<String, String>>,
    ) -> Result<Self, StreamError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                DEFAULT_CONFIG,
                config::FileFormat::Toml,
            ))
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .source(environment),
            )
            .build()?;

        settings
            .try_deserialize()
            .map_err(|e| StreamError::ConfigError(format!("Failed to parse config: {e}")))
    }

    pub fn update_provider(&mut self, new_provider: Provider) {
        self.provider = new_provider;
    }

    /// Renders the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, StreamError> {
        toml::to_string_pretty(self)
            .map_err(|e| StreamError::ConfigError(format!("Failed to render config: {e}")))
    }
}
