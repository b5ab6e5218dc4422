//! The bridge between chats and the inference models.
//!
//! [`InferenceRelay`] owns everything a handler needs: the models, the
//! outbound [`Messenger`] and the [`ConversationTracker`]. Local failures of a
//! model call never escape from here, they are turned into a message for the
//! user instead.

use std::sync::Arc;

use anyhow::Error;
use teloxide::types::{ChatAction, ChatId, Message, MessageId};

use crate::config::SharedConfig;
use crate::messenger::Messenger;
use crate::models::{ChatModel, ChatTurn, ImageModel, ModelOutcome};
use crate::state::{ConversationTracker, Mode};
use crate::types::HandlerResult;

/// The parts of a text message the relay works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub text: String,
}

impl IncomingMessage {
    pub fn from_message(msg: &Message) -> Option<Self> {
        msg.text().map(|text| Self {
            chat_id: msg.chat.id,
            message_id: msg.id,
            text: text.to_owned(),
        })
    }
}

#[derive(Clone)]
pub struct InferenceRelay {
    chat_model: Arc<dyn ChatModel>,
    image_model: Option<Arc<dyn ImageModel>>,
    messenger: Arc<dyn Messenger>,
    tracker: ConversationTracker,
    config: SharedConfig,
}

impl InferenceRelay {
    pub fn new(
        chat_model: Arc<dyn ChatModel>,
        image_model: Option<Arc<dyn ImageModel>>,
        messenger: Arc<dyn Messenger>,
        tracker: ConversationTracker,
        config: SharedConfig,
    ) -> Self {
        Self {
            chat_model,
            image_model,
            messenger,
            tracker,
            config,
        }
    }

    pub fn tracker(&self) -> &ConversationTracker {
        &self.tracker
    }

    pub fn supports_images(&self) -> bool {
        self.image_model.is_some()
    }

    pub async fn mode(&self, chat_id: ChatId) -> Mode {
        self.tracker.get_mode(chat_id).await
    }

    /// Greets the user and drops whatever the chat was waiting for.
    pub async fn welcome(&self, msg: &IncomingMessage) -> HandlerResult {
        self.tracker.clear(msg.chat_id).await;

        let i18n = &self.config.i18n;
        let text = if self.supports_images() {
            format!("{}\n\n{}", i18n.welcome_prompt, i18n.image_help_prompt)
        } else {
            i18n.welcome_prompt.clone()
        };
        self.reply(msg, &text).await
    }

    /// Handles `/imagine`. Without a prompt the chat starts waiting for one.
    pub async fn imagine(&self, msg: &IncomingMessage, prompt: &str) -> HandlerResult {
        let prompt = prompt.trim();
        if !prompt.is_empty() {
            return self.run_image(msg, prompt).await;
        }

        self.tracker.set_awaiting(msg.chat_id).await;
        if let Err(err) = self
            .reply(msg, &self.config.i18n.image_prompt_request)
            .await
        {
            self.tracker.clear(msg.chat_id).await;
            return Err(err);
        }
        Ok(())
    }

    /// Relays `msg` to the chat model and replies with its answer.
    pub async fn run_chat(&self, msg: &IncomingMessage) -> HandlerResult {
        self.send_action(msg, ChatAction::Typing).await;

        let turns = vec![ChatTurn::user(msg.text.as_str())];
        let i18n = &self.config.i18n;
        let reply_text = match self.chat_model.complete(turns).await {
            Ok(ModelOutcome::Failure(err)) => {
                warn!("Chat model reported an error: {}", err);
                format!("{}\n`{}`", i18n.chat_error_prompt, err)
            }
            Ok(ModelOutcome::Success(output)) => match output.reply_text() {
                Some(content) => content.to_owned(),
                None => i18n.chat_empty_prompt.clone(),
            },
            Err(err) => {
                error!("Failed to request the chat model: {}", err);
                self.tracker.clear(msg.chat_id).await;
                self.critical_error_text(&err)
            }
        };

        if let Err(err) = self.reply(msg, &reply_text).await {
            error!("Failed to send the chat reply: {}", err);
            self.tracker.clear(msg.chat_id).await;
            let text = self.critical_error_text(&err);
            return self.reply(msg, &text).await;
        }
        Ok(())
    }

    /// Generates an image for `prompt` and sends it to the chat. The chat is
    /// idle afterwards, whatever the outcome.
    pub async fn run_image(&self, msg: &IncomingMessage, prompt: &str) -> HandlerResult {
        if let Err(err) = self.generate_image(msg, prompt).await {
            error!("Failed to generate image: {}", err);
            let text = self.critical_error_text(&err);
            if let Err(err) = self.reply(msg, &text).await {
                error!("Failed to report the image error: {}", err);
            }
        }

        self.tracker.clear(msg.chat_id).await;
        Ok(())
    }

    async fn generate_image(&self, msg: &IncomingMessage, prompt: &str) -> Result<(), Error> {
        let i18n = &self.config.i18n;
        let ack = i18n.image_generating_prompt.replacen("{}", prompt, 1);
        self.reply(msg, &ack).await?;
        self.send_action(msg, ChatAction::UploadPhoto).await;

        let image_model = self
            .image_model
            .as_ref()
            .ok_or_else(|| anyhow!("Image generation is disabled"))?;

        match image_model.generate(prompt).await? {
            ModelOutcome::Failure(err) => {
                warn!("Image model reported an error: {}", err);
                let text = format!("{}\n`{}`", i18n.image_error_prompt, err);
                self.reply(msg, &text).await
            }
            ModelOutcome::Success(output) => match output.primary() {
                Some(image) => {
                    self.messenger
                        .send_photo(msg.chat_id, image, prompt)
                        .await
                }
                None => self.reply(msg, &i18n.image_empty_prompt).await,
            },
        }
    }

    fn critical_error_text(&self, err: &Error) -> String {
        format!("{} {}", self.config.i18n.critical_error_prompt, err)
    }

    /// Chat actions are cosmetic, a failed one does not stop the request.
    async fn send_action(&self, msg: &IncomingMessage, action: ChatAction) {
        if let Err(err) = self.messenger.send_chat_action(msg.chat_id, action).await {
            warn!("Failed to send chat action {:?}: {}", action, err);
        }
    }

    async fn reply(&self, msg: &IncomingMessage, text: &str) -> HandlerResult {
        self.messenger
            .reply(msg.chat_id, msg.message_id, text)
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use crate::models::{ChatOutput, ImageOutput};

    fn chat_only(chat_model: StubModel<ChatOutput>) -> Harness {
        Harness::new(chat_model, StubModel::new())
    }

    fn image_only(image_model: StubModel<ImageOutput>) -> Harness {
        Harness::new(StubModel::new(), image_model)
    }

    #[tokio::test]
    async fn test_chat_replies_with_content_verbatim() {
        let h = chat_only(StubModel::new().push(Ok(ModelOutcome::Success(ChatOutput::text("hello")))));
        h.relay.run_chat(&message(1, "hi")).await.unwrap();

        assert_eq!(h.chat_model.calls(), vec!["hi".to_owned()]);
        assert_eq!(h.messenger.replies(), vec!["hello".to_owned()]);
        assert_eq!(
            h.messenger.sent()[0],
            Sent::Action {
                chat_id: ChatId(1),
                action: "Typing".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn test_chat_surfaces_remote_error() {
        let h = chat_only(
            StubModel::new().push(Ok(ModelOutcome::Failure("rate limited".to_owned()))),
        );
        h.relay.run_chat(&message(1, "hi")).await.unwrap();

        let replies = h.messenger.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("rate limited"));
        assert!(replies[0].starts_with("Sorry, I ran into a chat error:"));
    }

    #[tokio::test]
    async fn test_chat_fallback_on_empty_content() {
        let h = chat_only(StubModel::new().push(Ok(ModelOutcome::Success(ChatOutput::default()))));
        h.relay.run_chat(&message(1, "hi")).await.unwrap();

        assert_eq!(
            h.messenger.replies(),
            vec!["Sorry, I'm not sure how to respond to that.".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_chat_local_error_is_reported() {
        let h = chat_only(StubModel::new().push(Err(anyhow!("connection reset"))));
        h.relay.tracker().set_awaiting(ChatId(1)).await;
        h.relay.run_chat(&message(1, "hi")).await.unwrap();

        assert_eq!(
            h.messenger.replies(),
            vec!["A critical error occurred: connection reset".to_owned()]
        );
        assert_eq!(h.relay.mode(ChatId(1)).await, Mode::Idle);
    }

    #[tokio::test]
    async fn test_rejected_chat_reply_is_reported() {
        let h = Harness::with_messenger(
            StubModel::new().push(Ok(ModelOutcome::Success(ChatOutput::text("x".repeat(5000))))),
            StubModel::new(),
            RecordingMessenger::rejecting_long_replies(4096),
        );
        h.relay.tracker().set_awaiting(ChatId(1)).await;
        h.relay.run_chat(&message(1, "write a novel")).await.unwrap();

        assert_eq!(
            h.messenger.replies(),
            vec!["A critical error occurred: message is too long".to_owned()]
        );
        assert_eq!(h.relay.mode(ChatId(1)).await, Mode::Idle);
    }

    #[tokio::test]
    async fn test_failed_chat_actions_do_not_stop_requests() {
        let h = Harness::with_messenger(
            StubModel::new().push(Ok(ModelOutcome::Success(ChatOutput::text("hello")))),
            StubModel::new().push(Ok(ModelOutcome::Success(ImageOutput::Single(
                "https://img/1.png".to_owned(),
            )))),
            RecordingMessenger::failing_actions(),
        );
        h.relay.run_chat(&message(1, "hi")).await.unwrap();
        h.relay.run_image(&message(1, "p"), "p").await.unwrap();

        let sent = h.messenger.sent();
        assert!(sent.contains(&Sent::Reply {
            chat_id: ChatId(1),
            text: "hello".to_owned()
        }));
        assert!(sent.contains(&Sent::Photo {
            chat_id: ChatId(1),
            image: "https://img/1.png".to_owned(),
            caption: "p".to_owned()
        }));
    }

    #[tokio::test]
    async fn test_imagine_without_prompt_awaits() {
        let h = image_only(StubModel::new());
        for text in ["", "   "] {
            h.relay.imagine(&message(5, "/imagine"), text).await.unwrap();
            assert_eq!(h.relay.mode(ChatId(5)).await, Mode::AwaitingImagePrompt);
        }

        assert!(h.image_model.calls().is_empty());
        assert_eq!(
            h.messenger.replies(),
            vec![
                "\u{1F3A8} What would you like me to imagine?".to_owned(),
                "\u{1F3A8} What would you like me to imagine?".to_owned()
            ]
        );
    }

    #[tokio::test]
    async fn test_imagine_with_prompt_runs_directly() {
        let h = image_only(
            StubModel::new().push(Ok(ModelOutcome::Success(ImageOutput::Single(
                "https://img/fox.png".to_owned(),
            )))),
        );
        h.relay
            .imagine(&message(5, "/imagine a red fox in snow"), " a red fox in snow ")
            .await
            .unwrap();

        assert_eq!(h.image_model.calls(), vec!["a red fox in snow".to_owned()]);
        assert_eq!(h.relay.mode(ChatId(5)).await, Mode::Idle);
    }

    #[tokio::test]
    async fn test_image_list_uses_first_with_prompt_caption() {
        let h = image_only(StubModel::new().push(Ok(ModelOutcome::Success(ImageOutput::List(
            vec!["url1".to_owned(), "url2".to_owned()],
        )))));
        h.relay.tracker().set_awaiting(ChatId(9)).await;
        h.relay.run_image(&message(9, "a cat"), "a cat").await.unwrap();

        let sent = h.messenger.sent();
        assert_eq!(
            sent,
            vec![
                Sent::Reply {
                    chat_id: ChatId(9),
                    text: "\u{1F3A8} Generating your image of...\n\n`a cat`\n\nThis may take a moment!"
                        .to_owned()
                },
                Sent::Action {
                    chat_id: ChatId(9),
                    action: "UploadPhoto".to_owned()
                },
                Sent::Photo {
                    chat_id: ChatId(9),
                    image: "url1".to_owned(),
                    caption: "a cat".to_owned()
                },
            ]
        );
        assert_eq!(h.relay.mode(ChatId(9)).await, Mode::Idle);
    }

    #[tokio::test]
    async fn test_image_attempt_always_ends_idle() {
        let outcomes: Vec<Result<ModelOutcome<ImageOutput>, Error>> = vec![
            Ok(ModelOutcome::Success(ImageOutput::Single("u".to_owned()))),
            Ok(ModelOutcome::Failure("nsfw".to_owned())),
            Ok(ModelOutcome::Success(ImageOutput::Empty)),
            Err(anyhow!("timed out")),
        ];
        for outcome in outcomes {
            let h = image_only(StubModel::new().push(outcome));
            h.relay.tracker().set_awaiting(ChatId(3)).await;
            h.relay.run_image(&message(3, "p"), "p").await.unwrap();
            assert_eq!(h.relay.mode(ChatId(3)).await, Mode::Idle);
        }
    }

    #[tokio::test]
    async fn test_image_failure_messages() {
        let h = image_only(
            StubModel::new()
                .push(Ok(ModelOutcome::Failure("nsfw".to_owned())))
                .push(Ok(ModelOutcome::Success(ImageOutput::List(vec![]))))
                .push(Err(anyhow!("timed out"))),
        );
        for _ in 0..3 {
            h.relay.run_image(&message(3, "p"), "p").await.unwrap();
        }

        let replies: Vec<String> = h
            .messenger
            .replies()
            .into_iter()
            .filter(|r| !r.contains("Generating"))
            .collect();
        assert_eq!(
            replies,
            vec![
                "Sorry, I ran into an error generating the image:\n`nsfw`".to_owned(),
                "Sorry, something went wrong and I didn't get an image.".to_owned(),
                "A critical error occurred: timed out".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_photo_upload_is_critical_and_clears() {
        let h = Harness::with_messenger(
            StubModel::new(),
            StubModel::new().push(Ok(ModelOutcome::Success(ImageOutput::Single(
                "https://img/1.png".to_owned(),
            )))),
            RecordingMessenger::failing_photos(),
        );
        h.relay.tracker().set_awaiting(ChatId(4)).await;
        h.relay.run_image(&message(4, "p"), "p").await.unwrap();

        let replies = h.messenger.replies();
        assert_eq!(
            replies.last().map(String::as_str),
            Some("A critical error occurred: photo upload refused")
        );
        assert_eq!(h.relay.mode(ChatId(4)).await, Mode::Idle);
    }

    #[tokio::test]
    async fn test_welcome_resets_and_mentions_images() {
        let h = image_only(StubModel::new());
        h.relay.tracker().set_awaiting(ChatId(2)).await;
        h.relay.welcome(&message(2, "/start")).await.unwrap();

        assert_eq!(h.relay.mode(ChatId(2)).await, Mode::Idle);
        let replies = h.messenger.replies();
        assert!(replies[0].starts_with("Hello! I'm a multi-model bot."));
        assert!(replies[0].contains("/imagine"));
    }

    #[tokio::test]
    async fn test_chat_only_relay() {
        let messenger = Arc::new(RecordingMessenger::default());
        let relay = InferenceRelay::new(
            Arc::new(StubModel::<ChatOutput>::new()),
            None,
            messenger.clone(),
            ConversationTracker::in_memory(),
            test_config(),
        );
        assert!(!relay.supports_images());

        relay.welcome(&message(1, "/help")).await.unwrap();
        assert!(!messenger.replies()[0].contains("/imagine"));

        relay.run_image(&message(1, "p"), "p").await.unwrap();
        assert_eq!(
            messenger.replies().last().map(String::as_str),
            Some("A critical error occurred: Image generation is disabled")
        );
    }
}
