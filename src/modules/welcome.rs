use teloxide::prelude::*;
use teloxide::types::BotCommand;

use crate::{
    module_mgr::Module,
    relay::{IncomingMessage, InferenceRelay},
    types::{HandlerResult, TeloxideHandler},
    utils::command_filter,
};

async fn welcome(msg: IncomingMessage, relay: InferenceRelay) -> HandlerResult {
    relay.welcome(&msg).await
}

pub(crate) struct Welcome;

impl Module for Welcome {
    fn handler_chain(&self) -> TeloxideHandler {
        dptree::entry()
            .branch(dptree::filter_map(command_filter("start")).endpoint(welcome))
            .branch(dptree::filter_map(command_filter("help")).endpoint(welcome))
    }

    fn commands(&self) -> Vec<BotCommand> {
        vec![
            BotCommand::new("start", "Start over"),
            BotCommand::new("help", "Show what I can do"),
        ]
    }
}
