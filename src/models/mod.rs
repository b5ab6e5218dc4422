//! Remote inference models.
//!
//! A model call has two ways to fail: the server may report an error in its
//! payload, which is a [`ModelOutcome::Failure`], or the call itself may not
//! complete (network failure, unparsable body), which is an `Err`.

mod bytez;

use anyhow::Error;
use serde::Serialize;
use serde_json::Value;

pub use bytez::{BytezClient, BytezModel};

/// Result of a model call that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutcome<T> {
    Success(T),
    Failure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatOutput {
    pub content: Option<String>,
}

impl ChatOutput {
    pub fn text<S: Into<String>>(content: S) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    /// Reads the `output` of a chat model, which is normally a message
    /// object (`{"role": "assistant", "content": "..."}`), some models
    /// answer with a plain string or a list of messages instead.
    pub fn from_output(output: &Value) -> Self {
        let content = match output {
            Value::String(text) => Some(text.clone()),
            Value::Object(message) => message
                .get("content")
                .and_then(Value::as_str)
                .map(str::to_owned),
            Value::Array(messages) => {
                return messages
                    .last()
                    .map(Self::from_output)
                    .unwrap_or_default()
            }
            _ => None,
        };
        Self { content }
    }

    /// The reply text, if the model produced any.
    pub fn reply_text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// What an image model handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutput {
    Single(String),
    List(Vec<String>),
    Empty,
}

impl ImageOutput {
    /// Non-string list entries keep their position as empty references, so
    /// the first element stays the first element.
    pub fn from_output(output: &Value) -> Self {
        match output {
            Value::String(image) => Self::Single(image.clone()),
            Value::Array(images) => Self::List(
                images
                    .iter()
                    .map(|image| image.as_str().unwrap_or_default().to_owned())
                    .collect(),
            ),
            _ => Self::Empty,
        }
    }

    /// The image to send: the single reference, or the first one of a list.
    pub fn primary(&self) -> Option<&str> {
        let image = match self {
            Self::Single(image) => Some(image.as_str()),
            Self::List(images) => images.first().map(String::as_str),
            Self::Empty => None,
        };
        image.filter(|i| !i.is_empty())
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, turns: Vec<ChatTurn>) -> Result<ModelOutcome<ChatOutput>, Error>;
}

#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<ModelOutcome<ImageOutput>, Error>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_chat_output_shapes() {
        let message = json!({ "role": "assistant", "content": "hi there" });
        assert_eq!(ChatOutput::from_output(&message).reply_text(), Some("hi there"));

        assert_eq!(
            ChatOutput::from_output(&json!("plain")).reply_text(),
            Some("plain")
        );

        let history = json!([
            { "role": "user", "content": "q" },
            { "role": "assistant", "content": "a" }
        ]);
        assert_eq!(ChatOutput::from_output(&history).reply_text(), Some("a"));
    }

    #[test]
    fn test_chat_output_without_usable_content() {
        for output in [
            json!(null),
            json!({ "role": "assistant" }),
            json!({ "content": "   " }),
            json!([]),
            json!(3),
        ] {
            assert_eq!(ChatOutput::from_output(&output).reply_text(), None);
        }
    }

    #[test]
    fn test_image_output_primary() {
        assert_eq!(
            ImageOutput::from_output(&json!("https://img/1.png")).primary(),
            Some("https://img/1.png")
        );
        assert_eq!(
            ImageOutput::from_output(&json!(["url1", "url2"])).primary(),
            Some("url1")
        );
        assert_eq!(ImageOutput::from_output(&json!([])).primary(), None);
        assert_eq!(
            ImageOutput::from_output(&json!([null, "url2"])).primary(),
            None
        );
        assert_eq!(ImageOutput::from_output(&json!(null)).primary(), None);
        assert_eq!(ImageOutput::Single(String::new()).primary(), None);
    }

    #[test]
    fn test_user_turn_serialization() {
        let turn = serde_json::to_value(ChatTurn::user("hello")).unwrap();
        assert_eq!(turn, json!({ "role": "user", "content": "hello" }));
    }
}
