use anyhow::Error;
use teloxide::dispatching::DpHandlerDescription;
use teloxide::prelude::*;

pub type HandlerResult = Result<(), Error>;
pub type TeloxideHandler =
    Handler<'static, DependencyMap, HandlerResult, DpHandlerDescription>;

/// Username of the running bot, used to match `/command@username` mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotName(pub String);
