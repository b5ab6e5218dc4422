use teloxide::prelude::*;

use crate::{
    module_mgr::Module,
    relay::{IncomingMessage, InferenceRelay},
    types::{HandlerResult, TeloxideHandler},
};

async fn handle_chat_message(msg: IncomingMessage, relay: InferenceRelay) -> HandlerResult {
    relay.run_chat(&msg).await
}

/// Plain chatting. Registered last, it takes every text message the other
/// modules left alone.
pub(crate) struct Chat;

impl Module for Chat {
    fn handler_chain(&self) -> TeloxideHandler {
        dptree::endpoint(handle_chat_message)
    }
}
