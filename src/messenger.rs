//! Outbound side of the messaging platform.

use anyhow::Error;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageId};
use url::Url;

/// The calls the bot makes to the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends `text` as a reply to `reply_to` in `chat_id`.
    async fn reply(&self, chat_id: ChatId, reply_to: MessageId, text: &str) -> Result<(), Error>;

    async fn send_photo(&self, chat_id: ChatId, image: &str, caption: &str) -> Result<(), Error>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<(), Error>;

    /// Replaces any registered webhook with `url`.
    async fn set_webhook(&self, url: Url) -> Result<(), Error>;
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn reply(&self, chat_id: ChatId, reply_to: MessageId, text: &str) -> Result<(), Error> {
        self.bot
            .send_message(chat_id, text)
            .reply_to_message_id(reply_to)
            .await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, image: &str, caption: &str) -> Result<(), Error> {
        let url = Url::parse(image).map_err(|err| anyhow!("Invalid image URL {}: {}", image, err))?;
        self.bot
            .send_photo(chat_id, InputFile::url(url))
            .caption(caption)
            .await?;
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<(), Error> {
        self.bot.send_chat_action(chat_id, action).await?;
        Ok(())
    }

    async fn set_webhook(&self, url: Url) -> Result<(), Error> {
        self.bot.delete_webhook().await?;
        self.bot.set_webhook(url).await?;
        Ok(())
    }
}
