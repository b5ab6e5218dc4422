use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::Error;
use teloxide::dispatching::DefaultKey;
use teloxide::dptree::di::DependencySupplier;
use teloxide::dptree::{from_fn_with_description, HandlerDescription};
use teloxide::prelude::*;

use crate::module_mgr::ModuleManager;
use crate::relay::{IncomingMessage, InferenceRelay};
use crate::types::{BotName, HandlerResult, TeloxideHandler};

async fn message_filter(msg: Message) -> bool {
    let from = msg
        .from()
        .map(|u| {
            let full_name = u.full_name();
            if full_name.is_empty() {
                u.id.to_string()
            } else {
                full_name
            }
        })
        .unwrap_or("<unknown>".to_owned());

    if let Some(text) = msg.text() {
        info!("{} sent a message: {}", from, text);
    } else {
        info!("{} sent a message: {:#?}", from, msg.kind);
    }

    true
}

async fn default_handler(msg: Message) -> HandlerResult {
    warn!("Message ({}) is not handled!", msg.id);
    Ok(())
}

/// Holds the lock of the message's chat while the rest of the chain runs, so
/// the mode of a chat is never read and written by two updates at once.
fn serialize_per_chat() -> TeloxideHandler {
    from_fn_with_description(
        HandlerDescription::user_defined(),
        |container: DependencyMap, cont| async move {
            let message: Arc<Message> = container.get();
            let relay: Arc<InferenceRelay> = container.get();

            let _guard = relay.tracker().lock(message.chat.id).await;
            match cont(container.clone()).await {
                ControlFlow::Continue(_) => ControlFlow::Continue(container),
                ControlFlow::Break(result) => ControlFlow::Break(result),
            }
        },
    )
}

/// Builds the full handler chain and the dependencies it runs with.
///
/// The resulting handler expects an [`Update`] in the container, next to the
/// returned dependencies.
pub(crate) fn build_handler(
    module_mgr: &mut ModuleManager,
    bot_name: BotName,
) -> (TeloxideHandler, DependencyMap) {
    // Load dependencies.
    let mut dep_map = DependencyMap::new();
    dep_map.insert(bot_name);
    module_mgr.with_all_modules(|m| m.register_dependency(&mut dep_map));

    // Build handler chain.
    let mut biz_handler = dptree::entry();
    module_mgr.with_all_modules(|m| {
        biz_handler = biz_handler.clone().branch(m.handler_chain());
    });

    let handler = Update::filter_message()
        .chain(dptree::filter_async(message_filter))
        .chain(serialize_per_chat())
        .branch(
            dptree::filter_map(|msg: Message| IncomingMessage::from_message(&msg))
                .chain(biz_handler),
        )
        .branch(dptree::endpoint(default_handler));

    (handler, dep_map)
}

/// A long-polling dispatcher over the same handler chain.
pub(crate) fn build_dispatcher(
    bot: Bot,
    handler: TeloxideHandler,
    dep_map: DependencyMap,
) -> Dispatcher<Bot, Error, DefaultKey> {
    Dispatcher::builder(bot, handler)
        .dependencies(dep_map)
        .enable_ctrlc_handler()
        .build()
}

/// Runs `update` through `handler`, as the dispatcher would.
pub(crate) async fn dispatch_update(
    handler: &TeloxideHandler,
    dep_map: &DependencyMap,
    update: Update,
) -> Option<HandlerResult> {
    let mut container = dep_map.clone();
    container.insert(update);
    match handler.dispatch(container).await {
        ControlFlow::Break(result) => Some(result),
        ControlFlow::Continue(_) => None,
    }
}
