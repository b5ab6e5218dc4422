//! Bootstrapping of the bot.
//!
//! [`run`] wires the configuration, the models and the Telegram client
//! together and serves until the process is interrupted. Any failure before
//! the bot is serving is returned as an error, there is no degraded mode.

use std::sync::Arc;

use anyhow::Error;
use teloxide::{prelude::*, types::MenuButton};
use tokio::net::TcpListener;

use crate::{
    config::SharedConfig,
    dispatcher::{build_dispatcher, build_handler},
    messenger::{Messenger, TelegramMessenger},
    models::{BytezClient, ChatModel, ImageModel},
    module_mgr::ModuleManager,
    modules,
    relay::InferenceRelay,
    state::ConversationTracker,
    types::{BotName, HandlerResult},
    webhook::{self, WebhookState},
};

/// How updates reach the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    /// Telegram pushes updates to the built-in HTTP server.
    Webhook,
    /// The bot pulls updates itself, handy for local development.
    Polling,
}

async fn update_menu(bot: &Bot, module_mgr: &mut ModuleManager) -> HandlerResult {
    bot.set_my_commands(module_mgr.commands()).await?;
    Ok(())
}

async fn init_bot(bot: &Bot, module_mgr: &mut ModuleManager) -> Result<BotName, Error> {
    let me = bot.get_me().await?;
    info!(
        "Bot '{}' (username: @{}) is connecting...",
        me.first_name,
        me.username()
    );

    bot.set_chat_menu_button()
        .menu_button(MenuButton::Commands)
        .await?;
    update_menu(bot, module_mgr).await?;
    Ok(BotName(me.username().to_owned()))
}

fn init_relay(config: &SharedConfig, messenger: Arc<dyn Messenger>) -> Result<InferenceRelay, Error> {
    let client = BytezClient::from_config(config)?;
    let chat_model: Arc<dyn ChatModel> = Arc::new(client.model(config.chat_model.as_str()));
    let image_model: Option<Arc<dyn ImageModel>> = if config.image_generation_enabled() {
        Some(Arc::new(client.model(config.image_model.as_str())))
    } else {
        None
    };
    info!(
        "Using chat model {}, image model {}",
        config.chat_model,
        if image_model.is_some() {
            config.image_model.as_str()
        } else {
            "<disabled>"
        }
    );

    Ok(InferenceRelay::new(
        chat_model,
        image_model,
        messenger,
        ConversationTracker::in_memory(),
        config.clone(),
    ))
}

/// Registers the modules in the order their handlers are tried.
pub(crate) fn register_modules(
    module_mgr: &mut ModuleManager,
    config: SharedConfig,
    relay: InferenceRelay,
) {
    let images_enabled = config.image_generation_enabled();
    module_mgr.register_module(modules::config::Config::new(config));
    module_mgr.register_module(modules::relay::Relay::new(relay));
    module_mgr.register_module(modules::welcome::Welcome);
    if images_enabled {
        module_mgr.register_module(modules::imagine::Imagine);
    }
    module_mgr.register_module(modules::chat::Chat);
}

pub async fn run(config: SharedConfig, mode: ServeMode) -> Result<(), Error> {
    let bot = Bot::new(&config.telegram_bot_token);
    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(bot.clone()));

    debug!("Initializing modules...");
    let relay = init_relay(&config, messenger.clone())?;
    let mut module_mgr = ModuleManager::new();
    register_modules(&mut module_mgr, config.clone(), relay);

    info!("Initializing bot...");
    let bot_name = init_bot(&bot, &mut module_mgr).await?;
    let (handler, dep_map) = build_handler(&mut module_mgr, bot_name);

    match mode {
        ServeMode::Webhook => {
            let addr = format!("{}:{}", config.listen_address, config.port);
            let listener = TcpListener::bind(&addr).await?;
            info!("Bot is started! Listening on {}", listener.local_addr()?);
            let state = WebhookState::new(handler, dep_map, config.clone(), messenger);
            webhook::serve(listener, state).await
        }
        ServeMode::Polling => {
            bot.delete_webhook().await?;
            let mut dispatcher = build_dispatcher(bot, handler, dep_map);
            info!("Bot is started! Polling for updates");
            dispatcher.dispatch().await;
            Ok(())
        }
    }
}
