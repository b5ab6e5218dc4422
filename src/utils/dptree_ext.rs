use teloxide::prelude::*;

use crate::types::BotName;

/// Everything after the command token, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandArgs(pub String);

/// Matches `text` against `/cmd`, returning the arguments on success.
///
/// When sending commands in a group, a mention suffix may be attached to
/// the command, for example: "/imagine@xxxx_bot a cat". Such commands only
/// match if the mention is this bot.
pub(crate) fn parse_command<'t>(text: &'t str, cmd: &str, bot_name: &str) -> Option<&'t str> {
    let text = text.trim_start();
    let (head, rest) = text
        .split_once(char::is_whitespace)
        .unwrap_or((text, ""));

    let name = head.strip_prefix('/')?;
    let (name, mention) = match name.split_once('@') {
        Some((name, mention)) => (name, Some(mention)),
        None => (name, None),
    };
    if name != cmd {
        return None;
    }
    if let Some(mention) = mention {
        if !mention.eq_ignore_ascii_case(bot_name) {
            return None;
        }
    }

    Some(rest.trim())
}

pub(crate) fn command_filter(cmd: &'static str) -> impl Fn(Message, BotName) -> Option<CommandArgs> {
    move |msg: Message, bot_name: BotName| {
        let text = msg.text()?;
        parse_command(text, cmd, &bot_name.0).map(|args| CommandArgs(args.to_owned()))
    }
}
