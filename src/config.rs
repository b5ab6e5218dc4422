//! Configuration-related types.
//!
//! The configuration can be represented in and deserialized from JSON,
//! here is an example:
//!
//! ```json
//! {
//!   "botToken": "8888888888:XXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX",
//!   "bytezAPIKey": "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
//!   "externalHostname": "my-bot.example.com",
//!   "port": 10000,
//!   "imageModel": "stabilityai/stable-diffusion-xl-base-1.0",
//!   "i18n": {
//!     "imagePromptRequest": "What should I draw?"
//!   }
//! }
//! ```
//!
//! Every field can also be provided (or overridden) with an environment
//! variable, see [`Config::apply_env`]. See [`Config`] for more detailed
//! descriptions.

use std::env;
use std::fs;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Error};
use paste::paste;
use serde::Deserialize;

/// A thread-safe reference-counting object that represents
/// a [`Config`] instance.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    config: Arc<Config>,
}

impl SharedConfig {
    /// Constructs a new `SharedConfig`.
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Deref for SharedConfig {
    type Target = Config;

    fn deref(&self) -> &Self::Target {
        self.config.as_ref()
    }
}

/// Top-level config type for the bot.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The token of your Telegram bot.
    /// JSON key: `botToken`, env: `TELEGRAM_BOT_TOKEN`
    #[serde(default, rename = "botToken")]
    pub telegram_bot_token: String,

    /// The API key of your Bytez account.
    /// JSON key: `bytezAPIKey`, env: `BYTEZ_API_KEY`
    #[serde(default, rename = "bytezAPIKey")]
    pub bytez_api_key: String,

    /// Base URL of the model endpoints, the model id is appended to it.
    /// JSON key: `bytezAPIBase`, env: `BYTEZ_API_BASE`
    #[serde(default = "default_bytez_api_base", rename = "bytezAPIBase")]
    pub bytez_api_base: String,

    /// The model used for chatting.
    /// JSON key: `chatModel`, env: `BYTEZ_CHAT_MODEL`
    #[serde(default = "default_chat_model", rename = "chatModel")]
    pub chat_model: String,

    /// The model used by `/imagine`.
    /// JSON key: `imageModel`, env: `BYTEZ_IMAGE_MODEL`
    #[serde(default = "default_image_model", rename = "imageModel")]
    pub image_model: String,

    /// Whether the image generation feature is enabled. When set to `false`
    /// the bot only chats. This is default to `true`.
    /// JSON key: `enableImageGeneration`, env: `ENABLE_IMAGE_GENERATION`
    #[serde(
        default = "default_enable_image_generation",
        rename = "enableImageGeneration"
    )]
    pub enable_image_generation: bool,

    /// A timeout in seconds for a single model call, [`None`] to wait
    /// until the server responds.
    /// JSON key: `modelTimeout`, env: `MODEL_TIMEOUT`
    #[serde(default, rename = "modelTimeout")]
    pub model_timeout: Option<u64>,

    /// The public hostname the webhook is registered with.
    /// JSON key: `externalHostname`, env: `RENDER_EXTERNAL_HOSTNAME`
    #[serde(default, rename = "externalHostname")]
    pub external_hostname: Option<String>,

    /// The address the webhook server binds to.
    /// JSON key: `listenAddress`
    #[serde(default = "default_listen_address", rename = "listenAddress")]
    pub listen_address: String,

    /// The port the webhook server listens on.
    /// JSON key: `port`, env: `PORT`
    #[serde(default = "default_port")]
    pub port: u16,

    /// Strings for I18N.
    /// JSON key: `i18n`
    #[serde(default)]
    pub i18n: I18nStrings,
}

impl Config {
    /// Loads the config from an optional JSON file, then applies the
    /// environment overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut config: Config = match path {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => serde_json::from_str("{}")?,
        };
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields with the values returned by `lookup`, which is
    /// normally backed by the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram_bot_token = token;
        }
        if let Some(key) = lookup("BYTEZ_API_KEY") {
            self.bytez_api_key = key;
        }
        if let Some(base) = lookup("BYTEZ_API_BASE") {
            self.bytez_api_base = base;
        }
        if let Some(model) = lookup("BYTEZ_CHAT_MODEL") {
            self.chat_model = model;
        }
        if let Some(model) = lookup("BYTEZ_IMAGE_MODEL") {
            self.image_model = model;
        }
        if let Some(flag) = lookup("ENABLE_IMAGE_GENERATION") {
            self.enable_image_generation = match flag.trim() {
                "yes" | "on" | "true" | "1" => true,
                "no" | "off" | "false" | "0" => false,
                other => bail!("Invalid ENABLE_IMAGE_GENERATION value: {}", other),
            };
        }
        if let Some(timeout) = lookup("MODEL_TIMEOUT") {
            self.model_timeout = Some(
                timeout
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid MODEL_TIMEOUT value: {}", timeout))?,
            );
        }
        if let Some(hostname) = lookup("RENDER_EXTERNAL_HOSTNAME") {
            self.external_hostname = Some(hostname);
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", port))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), Error> {
        if self.telegram_bot_token.is_empty() {
            bail!("Telegram bot token is not set (botToken / TELEGRAM_BOT_TOKEN)");
        }
        if self.bytez_api_key.is_empty() {
            bail!("Bytez API key is not set (bytezAPIKey / BYTEZ_API_KEY)");
        }
        Ok(())
    }

    /// Returns `true` if `/imagine` should be served.
    pub fn image_generation_enabled(&self) -> bool {
        self.enable_image_generation && !self.image_model.is_empty()
    }
}

/// Strings for I18N.
#[derive(Debug, Clone, Deserialize)]
pub struct I18nStrings {
    /// The greeting sent for `/start` and `/help`.
    /// JSON key: `welcomePrompt`
    #[serde(default = "default_welcome_prompt", rename = "welcomePrompt")]
    pub welcome_prompt: String,
    /// Appended to the greeting when image generation is enabled.
    /// JSON key: `imageHelpPrompt`
    #[serde(default = "default_image_help_prompt", rename = "imageHelpPrompt")]
    pub image_help_prompt: String,
    /// Asks the user for a prompt after a bare `/imagine`.
    /// JSON key: `imagePromptRequest`
    #[serde(
        default = "default_image_prompt_request",
        rename = "imagePromptRequest"
    )]
    pub image_prompt_request: String,
    /// Acknowledges an image request, `{}` is replaced with the prompt.
    /// JSON key: `imageGeneratingPrompt`
    #[serde(
        default = "default_image_generating_prompt",
        rename = "imageGeneratingPrompt"
    )]
    pub image_generating_prompt: String,
    /// Prefix of a remote image model error.
    /// JSON key: `imageErrorPrompt`
    #[serde(default = "default_image_error_prompt", rename = "imageErrorPrompt")]
    pub image_error_prompt: String,
    /// Sent when the image model returns nothing usable.
    /// JSON key: `imageEmptyPrompt`
    #[serde(default = "default_image_empty_prompt", rename = "imageEmptyPrompt")]
    pub image_empty_prompt: String,
    /// Prefix of a remote chat model error.
    /// JSON key: `chatErrorPrompt`
    #[serde(default = "default_chat_error_prompt", rename = "chatErrorPrompt")]
    pub chat_error_prompt: String,
    /// Sent when the chat model returns no content.
    /// JSON key: `chatEmptyPrompt`
    #[serde(default = "default_chat_empty_prompt", rename = "chatEmptyPrompt")]
    pub chat_empty_prompt: String,
    /// Prefix of a local failure.
    /// JSON key: `criticalErrorPrompt`
    #[serde(
        default = "default_critical_error_prompt",
        rename = "criticalErrorPrompt"
    )]
    pub critical_error_prompt: String,
}

macro_rules! define_defaults {
    ($ty_name:ident { $($name:ident: $ty:ty = $default:expr,)* }) => {
        define_defaults! { $($name: $ty = $default,)* }
        paste! {
            impl Default for $ty_name {
                fn default() -> Self {
                    Self {
                        $($name: [<default_ $name>](),)*
                    }
                }
            }
        }
    };
    ($($name:ident: $ty:ty = $default:expr,)*) => {
        paste! {
            $(
                fn [<default_ $name>]() -> $ty {
                    $default
                }
            )*
        }
    };
}

define_defaults! {
    bytez_api_base: String = "https://api.bytez.com/models/v2".to_owned(),
    chat_model: String = "katanemo/Arch-Router-1.5B".to_owned(),
    image_model: String = "stabilityai/stable-diffusion-xl-base-1.0".to_owned(),
    enable_image_generation: bool = true,
    listen_address: String = "0.0.0.0".to_owned(),
    port: u16 = 10000,
}

define_defaults!(I18nStrings {
    welcome_prompt: String = "Hello! I'm a multi-model bot.\n\n\
        \u{1F916} Chat Mode (Default):\n\
        Just send me a message, and I'll chat with you."
        .to_owned(),
    image_help_prompt: String = "\u{1F3A8} Image Mode (Command):\n\
        Type `/imagine <your prompt>` to generate an image.\n\
        (e.g., `/imagine a photorealistic cat in a wizard hat`)\n\n\
        If you just type `/imagine`, I'll ask you for the prompt."
        .to_owned(),
    image_prompt_request: String = "\u{1F3A8} What would you like me to imagine?".to_owned(),
    image_generating_prompt: String =
        "\u{1F3A8} Generating your image of...\n\n`{}`\n\nThis may take a moment!".to_owned(),
    image_error_prompt: String = "Sorry, I ran into an error generating the image:".to_owned(),
    image_empty_prompt: String =
        "Sorry, something went wrong and I didn't get an image.".to_owned(),
    chat_error_prompt: String = "Sorry, I ran into a chat error:".to_owned(),
    chat_empty_prompt: String = "Sorry, I'm not sure how to respond to that.".to_owned(),
    critical_error_prompt: String = "A critical error occurred:".to_owned(),
});
