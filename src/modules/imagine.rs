use teloxide::prelude::*;
use teloxide::types::BotCommand;

use crate::{
    module_mgr::Module,
    relay::{IncomingMessage, InferenceRelay},
    state::Mode,
    types::{HandlerResult, TeloxideHandler},
    utils::{command_filter, CommandArgs},
};

async fn imagine(msg: IncomingMessage, args: CommandArgs, relay: InferenceRelay) -> HandlerResult {
    relay.imagine(&msg, &args.0).await
}

async fn is_awaiting_prompt(msg: IncomingMessage, relay: InferenceRelay) -> bool {
    relay.mode(msg.chat_id).await == Mode::AwaitingImagePrompt
}

async fn receive_prompt(msg: IncomingMessage, relay: InferenceRelay) -> HandlerResult {
    relay.run_image(&msg, &msg.text).await
}

/// Image generation: `/imagine <prompt>`, or `/imagine` followed by the
/// prompt in the next message.
pub(crate) struct Imagine;

impl Module for Imagine {
    fn handler_chain(&self) -> TeloxideHandler {
        dptree::entry()
            .branch(dptree::filter_map(command_filter("imagine")).endpoint(imagine))
            .branch(dptree::filter_async(is_awaiting_prompt).endpoint(receive_prompt))
    }

    fn commands(&self) -> Vec<BotCommand> {
        vec![BotCommand::new("imagine", "Generate an image from a prompt")]
    }
}
