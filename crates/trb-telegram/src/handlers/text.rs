use teloxide::types::{Message, User};

use trb_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::types::{Command, IncomingUpdate, TextMessage},
};

use super::commands::parse_command;

pub(super) fn user_id(user: &User) -> UserId {
    UserId(user.id.0 as i64)
}

/// Text messages only; other message kinds are not relayed.
pub(super) fn to_update(msg: &Message, bot_username: Option<&str>) -> Option<IncomingUpdate> {
    let user = msg.from()?;
    let text = msg.text()?;
    let chat_id = ChatId(msg.chat.id.0);

    if text.starts_with('/') {
        let (name, args) = parse_command(text, bot_username)?;
        return Some(IncomingUpdate::Command(Command {
            chat_id,
            user_id: user_id(user),
            username: user.username.clone(),
            name,
            args,
        }));
    }

    let reply_to = msg.reply_to_message().map(|r| MessageRef {
        chat_id: ChatId(r.chat.id.0),
        message_id: MessageId(r.id.0),
    });

    Some(IncomingUpdate::Text(TextMessage {
        chat_id,
        user_id: user_id(user),
        first_name: user.first_name.clone(),
        username: user.username.clone(),
        text: text.to_string(),
        reply_to,
    }))
}
